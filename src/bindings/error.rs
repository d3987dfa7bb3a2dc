use thiserror::Error;

use super::action::ActionMode;
use super::edge::EdgeSet;
use crate::controller::Control;
use crate::subsystems::DeviceError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// The action's device rejected the write
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Unknown control {control}: {reason}")]
    UnknownControl { control: Control, reason: String },

    /// Advisory only; the binding is registered anyway
    #[error("Binding '{label}' overlaps '{existing}' on {control}")]
    DuplicateBinding {
        label: String,
        existing: String,
        control: Control,
    },

    #[error("Edges {edges} cannot drive a {mode:?} action")]
    IncompatibleEdge { edges: EdgeSet, mode: ActionMode },
}
