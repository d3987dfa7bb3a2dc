//! Controller Handle - unified API for gamepad input
//!
//! Owns the collector thread and the event processor. The tick loop calls
//! [`ControllerHandle::poll`] once per tick to get that tick's
//! [`InputSnapshot`].

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use super::event_collector::{
    ButtonState, ButtonType, CollectorError, CollectorHandle, CollectorSettings, JoystickType,
    RawControllerEvent, TriggerType,
};
pub use super::event_processor::{
    run_cycle, ControllerState, EventProcessor, InputSnapshot, ProcessorError, ProcessorSettings,
    Waiting,
};

/// Configuration settings for the complete controller subsystem
///
/// Split into [`CollectorSettings`] and [`ProcessorSettings`] on spawn.
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Analog stick deadzone as a fraction (0.0-1.0)
    ///
    /// Typical values range from 0.03 (precise) to 0.1 (loose/worn controllers).
    pub joystick_deadzone: f32,

    /// Ports given to gamepads in connection order, e.g. `[driver, mech]`
    pub slots: Vec<u8>,

    /// Capacity of the collector -> processor queue
    pub event_buffer: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
            slots: vec![0, 1],
            event_buffer: 1000,
        }
    }
}

/// Errors that can occur during controller initialization or operation
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Gamepad backend or collector thread problems
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    /// The collector went away while the processor was draining
    #[error("Processor error: {0}")]
    ProcessorError(#[from] ProcessorError),

    /// A previous poll failed and consumed the processor
    #[error("Controller input unavailable")]
    Unavailable,
}

/// Handle for the controller subsystem lifecycle
///
/// # Threading Model
///
/// ```text
/// gilrs thread ─[RawControllerEvent]→ mpsc(event_buffer) ─→ EventProcessor (tick loop)
/// ```
///
/// The processor is not a task of its own: it runs inside `poll`, so each
/// snapshot covers exactly the events of one tick.
pub struct ControllerHandle {
    collector: CollectorHandle,
    processor: Option<EventProcessor<Waiting>>,
    cancel: CancellationToken,
}

impl ControllerHandle {
    /// Spawns the collector thread and prepares the processor.
    ///
    /// # Errors
    ///
    /// * [`ControllerError::CollectorError`] - gamepad backend could not be
    ///   initialised or the thread could not be started
    pub fn spawn(
        settings: Option<ControllerSettings>,
        cancel: CancellationToken,
    ) -> Result<Self, ControllerError> {
        info!(
            "Initializing Controller system with settings: {:?}",
            settings
        );

        let settings = settings.unwrap_or_default();

        let collector_settings = CollectorSettings {
            joystick_deadzone: settings.joystick_deadzone,
            slots: settings.slots.clone(),
        };
        let processor_settings = ProcessorSettings {
            max_events_per_cycle: settings.event_buffer,
        };

        debug!(
            "Split settings: collector={:?}, processor={:?}",
            collector_settings, processor_settings
        );

        let (event_sender, event_receiver) = mpsc::channel(settings.event_buffer);
        debug!(
            "Created event channel with buffer capacity {}",
            settings.event_buffer
        );

        let collector =
            CollectorHandle::spawn(Some(collector_settings), event_sender, cancel.clone())?;
        let processor = EventProcessor::create(event_receiver, Some(processor_settings));

        info!("Controller system initialized successfully");
        Ok(Self {
            collector,
            processor: Some(processor),
            cancel,
        })
    }

    /// Drains pending gamepad events and returns this tick's snapshot.
    pub fn poll(&mut self) -> Result<InputSnapshot, ControllerError> {
        let processor = self.processor.take().ok_or(ControllerError::Unavailable)?;

        match run_cycle(processor) {
            Ok((processor, snapshot)) => {
                self.processor = Some(processor);
                Ok(snapshot)
            }
            Err(e) => {
                error!("Controller input lost: {}", e);
                Err(e.into())
            }
        }
    }

    /// Stops the collector thread and waits for it.
    pub fn shutdown(&mut self) {
        info!("Shutting down controller system");
        self.cancel.cancel();
        // Unblocks a collector waiting on a full queue
        self.processor = None;
        self.collector.join();
    }
}
