//! Error types of the device layer

use super::DeviceId;
use thiserror::Error;

/// Failures raised by a device wrapper.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    /// Percent output outside [-1, 1] (or not a number)
    #[error("Invalid output {value} for {device}: must be within [-1, 1]")]
    InvalidOutput { device: DeviceId, value: f64 },

    /// Drive output limit outside [0, 1]
    #[error("Invalid drive output limit {value}: must be within [0, 1]")]
    InvalidLimit { value: f64 },

    /// The actuator driver rejected the command
    #[error("Driver error on {device}: {message}")]
    Driver { device: DeviceId, message: String },
}

/// Error reported by an [`ActuatorDriver`](super::motor::ActuatorDriver).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DriverError(pub String);
