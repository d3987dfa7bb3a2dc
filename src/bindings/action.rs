//! Start/stop actions on one output target

use std::fmt;
use tracing::debug;

use super::edge::{EdgeSet, FiredEdge};
use super::error::BindingError;
use crate::subsystems::{DeviceError, DeviceId, Subsystems};

/// What an action writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionTarget {
    Device(DeviceId),
    /// The drive base output limit, valid within [0, 1]
    DriveMaxOutput,
}

impl ActionTarget {
    pub fn device(&self) -> Option<DeviceId> {
        match self {
            ActionTarget::Device(id) => Some(*id),
            ActionTarget::DriveMaxOutput => None,
        }
    }

    pub fn drive_motor(&self) -> Option<DeviceId> {
        self.device().filter(DeviceId::is_drive)
    }
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTarget::Device(id) => write!(f, "{}", id),
            ActionTarget::DriveMaxOutput => f.write_str("drive max output"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionMode {
    /// Started and stopped by press/release edges
    Momentary,
    /// Started and stopped on alternating presses
    Toggle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommandAction {
    pub target: ActionTarget,
    pub on_value: f64,
    pub off_value: f64,
    pub mode: ActionMode,
}

impl CommandAction {
    pub fn momentary(target: ActionTarget, on_value: f64, off_value: f64) -> Self {
        Self {
            target,
            on_value,
            off_value,
            mode: ActionMode::Momentary,
        }
    }

    pub fn toggle(target: ActionTarget, on_value: f64, off_value: f64) -> Self {
        Self {
            target,
            on_value,
            off_value,
            mode: ActionMode::Toggle,
        }
    }

    pub fn start(&self, subsystems: &mut Subsystems) -> Result<(), DeviceError> {
        self.apply(subsystems, self.on_value)
    }

    pub fn stop(&self, subsystems: &mut Subsystems) -> Result<(), DeviceError> {
        self.apply(subsystems, self.off_value)
    }

    pub fn run(&self, phase: Phase, subsystems: &mut Subsystems) -> Result<(), DeviceError> {
        match phase {
            Phase::Start => self.start(subsystems),
            Phase::Stop => self.stop(subsystems),
        }
    }

    fn apply(&self, subsystems: &mut Subsystems, value: f64) -> Result<(), DeviceError> {
        debug!("Setting {} to {}", self.target, value);
        match self.target {
            ActionTarget::Device(id) => subsystems.device_mut(id).set_output(value),
            ActionTarget::DriveMaxOutput => subsystems.drive.set_max_output(value),
        }
    }

    /// Toggle actions need exactly the toggled edge, momentary ones any
    /// non-empty mix of press and release.
    pub fn check_edges(&self, edges: &EdgeSet) -> Result<(), BindingError> {
        let compatible = match self.mode {
            ActionMode::Toggle => edges.toggled && !edges.pressed && !edges.released,
            ActionMode::Momentary => !edges.toggled && !edges.is_empty(),
        };
        if compatible {
            Ok(())
        } else {
            Err(BindingError::IncompatibleEdge {
                edges: *edges,
                mode: self.mode,
            })
        }
    }

    /// Which phase a fired edge runs. A release stops the action when the
    /// binding also starts it on press; a release-only binding starts it.
    pub fn phase_for(&self, fired: FiredEdge, edges: &EdgeSet) -> Option<Phase> {
        match (self.mode, fired) {
            (ActionMode::Momentary, FiredEdge::Pressed) => Some(Phase::Start),
            (ActionMode::Momentary, FiredEdge::Released) if edges.pressed => Some(Phase::Stop),
            (ActionMode::Momentary, FiredEdge::Released) => Some(Phase::Start),
            (ActionMode::Toggle, FiredEdge::Toggled { active: true }) => Some(Phase::Start),
            (ActionMode::Toggle, FiredEdge::Toggled { active: false }) => Some(Phase::Stop),
            _ => None,
        }
    }
}
