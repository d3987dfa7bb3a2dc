use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Raw controller event with chrono timestamps, tagged with the configured
// slot the gamepad was assigned on connection
#[derive(Debug, Clone)]
pub enum RawControllerEvent {
    JoystickMove {
        port: u8,
        stick: JoystickType,
        axis: StickAxis,
        value: f32,
        timestamp: DateTime<Local>,
    },
    TriggerMove {
        port: u8,
        trigger: TriggerType,
        value: f32,
        timestamp: DateTime<Local>,
    },
    ButtonEvent {
        port: u8,
        button_type: ButtonType,
        button_state: ButtonState,
        timestamp: DateTime<Local>,
    },
    Connected {
        port: u8,
        timestamp: DateTime<Local>,
    },
    Disconnected {
        port: u8,
        timestamp: DateTime<Local>,
    },
}

impl RawControllerEvent {
    pub fn port(&self) -> u8 {
        match self {
            RawControllerEvent::JoystickMove { port, .. }
            | RawControllerEvent::TriggerMove { port, .. }
            | RawControllerEvent::ButtonEvent { port, .. }
            | RawControllerEvent::Connected { port, .. }
            | RawControllerEvent::Disconnected { port, .. } => *port,
        }
    }
}

// Joystick type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickType {
    Left,
    Right,
}

// Stick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StickAxis {
    X,
    Y,
}

// Trigger type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    Left,
    Right,
}

// Button state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

// Button type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ButtonType {
    A,
    B,
    X,
    Y,
    Start,
    Back,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Guide,
}

impl ButtonType {
    pub fn is_dpad(&self) -> bool {
        matches!(
            self,
            ButtonType::DPadUp | ButtonType::DPadDown | ButtonType::DPadLeft | ButtonType::DPadRight
        )
    }
}

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub joystick_deadzone: f32,
    // Ports handed out in connection order; further gamepads are ignored
    pub slots: Vec<u8>,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
            slots: vec![0, 1],
        }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),

    #[error("Collector thread error: {0}")]
    ThreadError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,

    // Gamepad id -> configured slot
    ports: HashMap<GamepadId, u8>,

    settings: CollectorSettings,

    event_sender: mpsc::Sender<RawControllerEvent>,
}

impl<S: CollectionState> EventCollector<S> {
    fn next_free_port(&self) -> Option<u8> {
        let taken: Vec<u8> = self.ports.values().copied().collect();
        free_slot(&self.settings.slots, &taken)
    }
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, HashMap::new(), settings, event_sender))
    }

    // Assign ports to already connected gamepads and start collecting
    pub fn initialize(mut self) -> Result<EventCollector<Collecting>, CollectorError> {
        info!(
            "Initializing Event Collector with deadzone: {}",
            self.settings.joystick_deadzone
        );

        let connected: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();

        if connected.is_empty() {
            warn!("No gamepad connected, waiting for connections");
        }

        for (id, name) in connected {
            match self.next_free_port() {
                Some(port) => {
                    info!("Gamepad '{}' ({}) assigned to port {}", name, id, port);
                    self.ports.insert(id, port);
                    self.send(RawControllerEvent::Connected {
                        port,
                        timestamp: Local::now(),
                    })?;
                }
                None => warn!("Ignoring gamepad '{}' ({}), all ports in use", name, id),
            }
        }

        info!("Event Collector initialized, transitioning to Collecting state");
        Ok(self.transition())
    }

    fn send(&self, event: RawControllerEvent) -> Result<(), CollectorError> {
        forward(&self.event_sender, event)
    }
}

impl EventCollector<Collecting> {
    // Drain pending gilrs events. Returns how many were forwarded.
    pub fn collect_pending(&mut self) -> Result<usize, CollectorError> {
        let mut forwarded = 0;

        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            let disconnected = matches!(event, EventType::Disconnected);
            let port = match self.port_for(id, &event) {
                Some(port) => port,
                None => {
                    debug!("Skipping event from unassigned gamepad: {:?}", id);
                    continue;
                }
            };

            if let Some(raw_event) = self.convert_gilrs_event(port, event) {
                if let RawControllerEvent::ButtonEvent {
                    button_type,
                    button_state,
                    timestamp,
                    ..
                } = &raw_event
                {
                    debug!(
                        "Port {} button {:?} {:?} at {}",
                        port,
                        button_type,
                        button_state,
                        timestamp.format("%H:%M:%S.%3f")
                    );
                }

                if let Err(e) = forward(&self.event_sender, raw_event) {
                    error!("Failed to send event to processor: {}", e);
                    return Err(e);
                }
                forwarded += 1;
            }

            if disconnected {
                self.ports.remove(&id);
            }
        }

        Ok(forwarded)
    }

    pub fn run_collection_loop(&mut self, cancel: &CancellationToken) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");

        while !cancel.is_cancelled() {
            match self.collect_pending() {
                Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                Ok(_) => {}
                Err(CollectorError::EventSendError(e)) => {
                    info!("Processor gone, stopping collector: {}", e);
                    break;
                }
                Err(e) => warn!("Error collecting events: {}", e),
            }
        }

        info!("Event Collector loop finished");
        Ok(())
    }

    fn port_for(&mut self, id: GamepadId, event: &EventType) -> Option<u8> {
        if let Some(port) = self.ports.get(&id) {
            return Some(*port);
        }
        if let EventType::Connected = event {
            let port = self.next_free_port()?;
            info!("Gamepad {} connected on port {}", id, port);
            self.ports.insert(id, port);
            return Some(port);
        }
        None
    }

    fn convert_gilrs_event(&self, port: u8, event: EventType) -> Option<RawControllerEvent> {
        let timestamp = Local::now();
        let deadzone = self.settings.joystick_deadzone;

        match event {
            EventType::AxisChanged(axis, value, _) => {
                let value = apply_deadzone(value, deadzone);
                // gilrs reports stick Y up as positive; downstream uses Y down positive
                match axis {
                    Axis::LeftStickX => Some(RawControllerEvent::JoystickMove {
                        port,
                        stick: JoystickType::Left,
                        axis: StickAxis::X,
                        value,
                        timestamp,
                    }),
                    Axis::LeftStickY => Some(RawControllerEvent::JoystickMove {
                        port,
                        stick: JoystickType::Left,
                        axis: StickAxis::Y,
                        value: -value,
                        timestamp,
                    }),
                    Axis::RightStickX => Some(RawControllerEvent::JoystickMove {
                        port,
                        stick: JoystickType::Right,
                        axis: StickAxis::X,
                        value,
                        timestamp,
                    }),
                    Axis::RightStickY => Some(RawControllerEvent::JoystickMove {
                        port,
                        stick: JoystickType::Right,
                        axis: StickAxis::Y,
                        value: -value,
                        timestamp,
                    }),
                    Axis::LeftZ => Some(RawControllerEvent::TriggerMove {
                        port,
                        trigger: TriggerType::Left,
                        value,
                        timestamp,
                    }),
                    Axis::RightZ => Some(RawControllerEvent::TriggerMove {
                        port,
                        trigger: TriggerType::Right,
                        value,
                        timestamp,
                    }),
                    _ => {
                        debug!("Ignoring unsupported axis: {:?}", axis);
                        None
                    }
                }
            }
            EventType::ButtonChanged(Button::LeftTrigger2, value, _) => {
                Some(RawControllerEvent::TriggerMove {
                    port,
                    trigger: TriggerType::Left,
                    value: apply_deadzone(value, deadzone),
                    timestamp,
                })
            }
            EventType::ButtonChanged(Button::RightTrigger2, value, _) => {
                Some(RawControllerEvent::TriggerMove {
                    port,
                    trigger: TriggerType::Right,
                    value: apply_deadzone(value, deadzone),
                    timestamp,
                })
            }
            EventType::ButtonPressed(button, _) => {
                map_button(button).map(|button_type| RawControllerEvent::ButtonEvent {
                    port,
                    button_type,
                    button_state: ButtonState::Pressed,
                    timestamp,
                })
            }
            EventType::ButtonReleased(button, _) => {
                map_button(button).map(|button_type| RawControllerEvent::ButtonEvent {
                    port,
                    button_type,
                    button_state: ButtonState::Released,
                    timestamp,
                })
            }
            EventType::Connected => Some(RawControllerEvent::Connected { port, timestamp }),
            EventType::Disconnected => {
                warn!("Controller on port {} disconnected", port);
                Some(RawControllerEvent::Disconnected { port, timestamp })
            }
            _ => None,
        }
    }
}

// Owns the collector thread. gilrs is created on that thread.
pub struct CollectorHandle {
    thread: Option<JoinHandle<()>>,
}

impl CollectorHandle {
    pub fn spawn(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);

        let (init_tx, init_rx) = std::sync::mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("gamepad-collector".to_string())
            .spawn(move || {
                let collecting = EventCollector::create(settings, event_sender)
                    .and_then(|collector| collector.initialize());

                match collecting {
                    Ok(mut collecting) => {
                        let _ = init_tx.send(Ok(()));
                        if let Err(e) = collecting.run_collection_loop(&cancel) {
                            error!("Collector thread terminated with error: {}", e);
                        }
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CollectorError::ThreadError(e.to_string()))?;

        match init_rx.recv() {
            Ok(Ok(())) => {
                info!("Event Collector successfully started");
                Ok(Self {
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(e) => Err(CollectorError::ThreadError(e.to_string())),
        }
    }

    // Waits for the thread after the cancellation token fired
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Collector thread panicked");
            }
        }
    }
}

// First configured slot that no connected gamepad holds
pub(crate) fn free_slot(slots: &[u8], taken: &[u8]) -> Option<u8> {
    slots.iter().copied().find(|slot| !taken.contains(slot))
}

// Waits for queue space so no edge is lost; fails only once the processor is gone
fn forward(
    sender: &mpsc::Sender<RawControllerEvent>,
    event: RawControllerEvent,
) -> Result<(), CollectorError> {
    sender
        .blocking_send(event)
        .map_err(|e| CollectorError::EventSendError(e.to_string()))
}

fn map_button(button: Button) -> Option<ButtonType> {
    match button {
        Button::South => Some(ButtonType::A),
        Button::East => Some(ButtonType::B),
        Button::West => Some(ButtonType::X),
        Button::North => Some(ButtonType::Y),
        Button::Start => Some(ButtonType::Start),
        Button::Select => Some(ButtonType::Back),
        Button::LeftTrigger => Some(ButtonType::LeftBumper),
        Button::RightTrigger => Some(ButtonType::RightBumper),
        Button::LeftThumb => Some(ButtonType::LeftStick),
        Button::RightThumb => Some(ButtonType::RightStick),
        Button::DPadUp => Some(ButtonType::DPadUp),
        Button::DPadDown => Some(ButtonType::DPadDown),
        Button::DPadLeft => Some(ButtonType::DPadLeft),
        Button::DPadRight => Some(ButtonType::DPadRight),
        Button::Mode => Some(ButtonType::Guide),
        _ => None,
    }
}

pub(crate) fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        // Rescale the value to the range outside the deadzone
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadzone_zeroes_small_values_and_rescales_the_rest() {
        assert_eq!(apply_deadzone(0.04, 0.05), 0.0);
        assert_eq!(apply_deadzone(-0.04, 0.05), 0.0);
        assert!((apply_deadzone(1.0, 0.05) - 1.0).abs() < 1e-6);
        assert!((apply_deadzone(-1.0, 0.05) + 1.0).abs() < 1e-6);
        assert!((apply_deadzone(0.525, 0.05) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn face_buttons_follow_xbox_layout() {
        assert_eq!(map_button(Button::South), Some(ButtonType::A));
        assert_eq!(map_button(Button::East), Some(ButtonType::B));
        assert_eq!(map_button(Button::West), Some(ButtonType::X));
        assert_eq!(map_button(Button::North), Some(ButtonType::Y));
        assert_eq!(map_button(Button::C), None);
    }

    #[test]
    fn gamepads_take_the_configured_slots_in_order() {
        let slots = [0, 3];
        let first = free_slot(&slots, &[]);
        assert_eq!(first, Some(0));
        let second = free_slot(&slots, &[0]);
        assert_eq!(second, Some(3));
        assert_eq!(free_slot(&slots, &[0, 3]), None);
    }

    #[test]
    fn reconnecting_gamepad_reuses_the_freed_slot() {
        let slots = [2, 5];
        // Driver pad on 2 unplugged, mech pad still on 5
        assert_eq!(free_slot(&slots, &[5]), Some(2));
        assert_eq!(free_slot(&[255], &[]), Some(255));
    }

    #[test]
    fn full_queue_waits_instead_of_dropping_a_release() {
        let (sender, mut receiver) = mpsc::channel(1);
        let press = RawControllerEvent::ButtonEvent {
            port: 1,
            button_type: ButtonType::B,
            button_state: ButtonState::Pressed,
            timestamp: Local::now(),
        };
        let release = RawControllerEvent::ButtonEvent {
            port: 1,
            button_type: ButtonType::B,
            button_state: ButtonState::Released,
            timestamp: Local::now(),
        };
        forward(&sender, press).unwrap();

        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let mut states = Vec::new();
            while let Some(RawControllerEvent::ButtonEvent { button_state, .. }) =
                receiver.blocking_recv()
            {
                states.push(button_state);
            }
            states
        });

        forward(&sender, release).unwrap();
        drop(sender);
        let states = consumer.join().unwrap();
        assert_eq!(states, vec![ButtonState::Pressed, ButtonState::Released]);
    }

    #[test]
    fn closed_queue_is_a_send_error() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let result = forward(
            &sender,
            RawControllerEvent::Connected {
                port: 0,
                timestamp: Local::now(),
            },
        );
        assert!(matches!(result, Err(CollectorError::EventSendError(_))));
    }
}
