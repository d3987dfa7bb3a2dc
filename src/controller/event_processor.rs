use statum::{machine, state};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::controller::event_collector::{
    ButtonState, ButtonType, JoystickType, RawControllerEvent, StickAxis, TriggerType,
};

/// The eight D-pad angles, clockwise from up.
pub const POV_ANGLES: [u16; 8] = [0, 45, 90, 135, 180, 225, 270, 315];

/// A logical control on one gamepad: a button, or one D-pad angle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlId {
    Button(ButtonType),
    Pov(u16),
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlId::Button(button) => write!(f, "{:?}", button),
            ControlId::Pov(angle) => write!(f, "POV {}", angle),
        }
    }
}

/// A control addressed by the port of the gamepad it lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Control {
    pub port: u8,
    pub id: ControlId,
}

impl Control {
    pub fn button(port: u8, button: ButtonType) -> Self {
        Self {
            port,
            id: ControlId::Button(button),
        }
    }

    pub fn pov(port: u8, angle: u16) -> Self {
        Self {
            port,
            id: ControlId::Pov(angle),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {} {}", self.port, self.id)
    }
}

/// State of one boolean control for the current tick.
///
/// `pressed`/`released` report transitions seen since the previous tick, so a
/// tap shorter than one tick shows up as `pressed && released && !held`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlSample {
    pub held: bool,
    pub pressed: bool,
    pub released: bool,
}

impl ControlSample {
    fn apply(&mut self, state: ButtonState) {
        match state {
            ButtonState::Pressed if !self.held => {
                self.held = true;
                self.pressed = true;
            }
            ButtonState::Released if self.held => {
                self.held = false;
                self.released = true;
            }
            // Repeated press/release from the driver, nothing changed
            _ => {}
        }
    }

    fn clear_edges(&mut self) {
        self.pressed = false;
        self.released = false;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JoystickPosition {
    pub x: f32,
    pub y: f32,
}

/// Everything known about one gamepad at the end of a tick.
#[derive(Clone, Debug, Default)]
pub struct ControllerState {
    pub connected: bool,
    pub buttons: BTreeMap<ButtonType, ControlSample>,
    // Current D-pad angle, `None` when centred
    pub pov: Option<u16>,
    pub pov_samples: BTreeMap<u16, ControlSample>,
    pub left_stick: JoystickPosition,
    pub right_stick: JoystickPosition,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl ControllerState {
    pub fn sample(&self, id: ControlId) -> ControlSample {
        match id {
            ControlId::Button(button) => self.buttons.get(&button).copied(),
            ControlId::Pov(angle) => self.pov_samples.get(&angle).copied(),
        }
        .unwrap_or_default()
    }

    pub fn held(&self, button: ButtonType) -> bool {
        self.sample(ControlId::Button(button)).held
    }

    fn clear_edges(&mut self) {
        self.buttons.values_mut().for_each(ControlSample::clear_edges);
        self.pov_samples
            .values_mut()
            .for_each(ControlSample::clear_edges);
    }

    fn apply_button(&mut self, button: ButtonType, state: ButtonState) {
        self.buttons.entry(button).or_default().apply(state);

        if button.is_dpad() {
            let pov = pov_from_dpad(
                self.held(ButtonType::DPadUp),
                self.held(ButtonType::DPadRight),
                self.held(ButtonType::DPadDown),
                self.held(ButtonType::DPadLeft),
            );
            if pov != self.pov {
                if let Some(old) = self.pov {
                    self.pov_samples
                        .entry(old)
                        .or_default()
                        .apply(ButtonState::Released);
                }
                if let Some(new) = pov {
                    self.pov_samples
                        .entry(new)
                        .or_default()
                        .apply(ButtonState::Pressed);
                }
                self.pov = pov;
            }
        }
    }

    // Everything released, sticks centred, edges reported for held controls
    fn release_all(&mut self) {
        self.buttons
            .values_mut()
            .for_each(|sample| sample.apply(ButtonState::Released));
        self.pov_samples
            .values_mut()
            .for_each(|sample| sample.apply(ButtonState::Released));
        self.pov = None;
        self.left_stick = JoystickPosition::default();
        self.right_stick = JoystickPosition::default();
        self.left_trigger = 0.0;
        self.right_trigger = 0.0;
    }
}

/// Maps held D-pad directions to a POV angle. Opposing directions cancel.
pub fn pov_from_dpad(up: bool, right: bool, down: bool, left: bool) -> Option<u16> {
    let vertical = match (up, down) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    };
    let horizontal = match (right, left) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    };

    match (vertical, horizontal) {
        (1, 0) => Some(0),
        (1, 1) => Some(45),
        (0, 1) => Some(90),
        (-1, 1) => Some(135),
        (-1, 0) => Some(180),
        (-1, -1) => Some(225),
        (0, -1) => Some(270),
        (1, -1) => Some(315),
        _ => None,
    }
}

/// Input state of all gamepads for one tick, keyed by port.
#[derive(Clone, Debug)]
pub struct InputSnapshot {
    pub controllers: BTreeMap<u8, ControllerState>,
    pub timestamp: SystemTime,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self {
            controllers: BTreeMap::new(),
            timestamp: SystemTime::now(),
        }
    }
}

impl InputSnapshot {
    pub fn controller(&self, port: u8) -> Option<&ControllerState> {
        self.controllers.get(&port)
    }

    /// Sample of a control; controls on absent gamepads read as idle.
    pub fn sample(&self, control: &Control) -> ControlSample {
        self.controller(control.port)
            .map(|state| state.sample(control.id))
            .unwrap_or_default()
    }
}

// Event batch for the processing state
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub events: Vec<RawControllerEvent>,
}

#[derive(Clone, Debug)]
pub struct ProcessorSettings {
    // Upper bound of raw events drained per tick
    pub max_events_per_cycle: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            max_events_per_cycle: 1000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to receive events: {0}")]
    EventReceiveError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum ProcessingState {
    Waiting,
    Processing(EventBatch),
    Updating,
}

/// Turns the raw event stream into one [`InputSnapshot`] per tick.
///
/// Driven by the tick loop, one `Waiting -> Processing -> Updating -> Waiting`
/// round per tick, so edge flags always cover exactly one tick.
#[machine]
#[derive(Debug)]
pub struct EventProcessor<S: ProcessingState> {
    event_receiver: mpsc::Receiver<RawControllerEvent>,

    settings: ProcessorSettings,

    // Current per-port state
    state: HashMap<u8, ControllerState>,
}

impl EventProcessor<Waiting> {
    pub fn create(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        settings: Option<ProcessorSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Creating Event Processor with settings: {:?}", settings);

        Self::new(event_receiver, settings, HashMap::new())
    }

    // Drain whatever the collector queued since the last tick
    pub fn collect(mut self) -> Result<EventProcessor<Processing>, ProcessorError> {
        let mut events = Vec::new();

        while events.len() < self.settings.max_events_per_cycle {
            match self.event_receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    error!("Event channel disconnected!");
                    return Err(ProcessorError::EventReceiveError(
                        "Event channel disconnected".to_string(),
                    ));
                }
            }
        }

        if events.len() == self.settings.max_events_per_cycle {
            warn!(
                "Event backlog exceeds {} per tick, remaining events carried over",
                self.settings.max_events_per_cycle
            );
        }
        if !events.is_empty() {
            debug!("Collected batch of {} events", events.len());
        }

        Ok(self.transition_with(EventBatch { events }))
    }
}

impl EventProcessor<Processing> {
    pub fn process_events(mut self) -> EventProcessor<Updating> {
        let events = match self.get_state_data() {
            Some(batch) => batch.events.clone(),
            None => {
                warn!("No event batch found in state data, this should not happen");
                Vec::new()
            }
        };

        // Edges only ever describe the current tick
        self.state.values_mut().for_each(ControllerState::clear_edges);

        for event in events {
            let port = event.port();
            let controller = self.state.entry(port).or_default();

            match event {
                RawControllerEvent::ButtonEvent {
                    button_type,
                    button_state,
                    ..
                } => {
                    controller.connected = true;
                    controller.apply_button(button_type, button_state);
                }
                RawControllerEvent::JoystickMove {
                    stick, axis, value, ..
                } => {
                    controller.connected = true;
                    let position = match stick {
                        JoystickType::Left => &mut controller.left_stick,
                        JoystickType::Right => &mut controller.right_stick,
                    };
                    match axis {
                        StickAxis::X => position.x = value,
                        StickAxis::Y => position.y = value,
                    }
                }
                RawControllerEvent::TriggerMove { trigger, value, .. } => {
                    controller.connected = true;
                    match trigger {
                        TriggerType::Left => controller.left_trigger = value,
                        TriggerType::Right => controller.right_trigger = value,
                    }
                }
                RawControllerEvent::Connected { .. } => {
                    info!("Controller on port {} connected", port);
                    controller.connected = true;
                }
                RawControllerEvent::Disconnected { .. } => {
                    warn!("Controller on port {} lost, releasing its controls", port);
                    controller.release_all();
                    controller.connected = false;
                }
            }
        }

        self.transition()
    }
}

impl EventProcessor<Updating> {
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            controllers: self
                .state
                .iter()
                .map(|(port, state)| (*port, state.clone()))
                .collect(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn finish(self) -> EventProcessor<Waiting> {
        self.transition()
    }
}

/// Runs one processor round and returns the snapshot for this tick.
pub fn run_cycle(
    processor: EventProcessor<Waiting>,
) -> Result<(EventProcessor<Waiting>, InputSnapshot), ProcessorError> {
    let updating = processor.collect()?.process_events();
    let snapshot = updating.snapshot();
    Ok((updating.finish(), snapshot))
}
