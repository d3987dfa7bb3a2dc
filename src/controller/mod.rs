//! Controller subsystem for gamepad input handling
//!
//! Implements a three-part pipeline:
//!
//! 1. [`event_collector`] - Raw gamepad input collection on a dedicated thread
//! 2. [`event_processor`] - Per-tick edge extraction into an [`InputSnapshot`]
//! 3. [`controller_handle`] - Unified API and lifecycle management
//!
//! # Architecture
//!
//! ```text
//! Gamepads ──► Collector ──► Processor ──► InputSnapshot (one per tick)
//!              (Raw Events)  (Edges, POV)
//! ```

pub mod controller_handle;
pub mod event_collector;
pub mod event_processor;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use event_collector::{ButtonState, ButtonType, JoystickType, RawControllerEvent, StickAxis, TriggerType};
pub use event_processor::{
    Control, ControlId, ControlSample, ControllerState, InputSnapshot, JoystickPosition,
    POV_ANGLES,
};
