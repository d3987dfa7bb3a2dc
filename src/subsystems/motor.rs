//! Percent-output motor wrapper and the driver seam beneath it

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::error::{DeviceError, DriverError};
use super::DeviceId;

/// Encoder counts a simulated motor advances per update at full output.
const SIM_COUNTS_PER_UPDATE: f64 = 100.0;

/// The hardware side of one actuator.
///
/// Implementations receive the already inverted percent output.
pub trait ActuatorDriver: Send {
    fn set_percent_output(&mut self, output: f64) -> Result<(), DriverError>;

    /// Raw sensor position in driver units
    fn sensor_position(&self) -> f64;

    fn set_sensor_position(&mut self, position: f64) -> Result<(), DriverError>;
}

/// Shared view of what a [`SimulatedDriver`] was commanded.
#[derive(Clone, Debug, Default)]
pub struct OutputLog {
    outputs: Arc<Mutex<Vec<f64>>>,
}

impl OutputLog {
    pub fn outputs(&self) -> Vec<f64> {
        match self.outputs.lock() {
            Ok(outputs) => outputs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.outputs().last().copied()
    }

    fn push(&self, output: f64) {
        match self.outputs.lock() {
            Ok(mut outputs) => outputs.push(output),
            Err(poisoned) => poisoned.into_inner().push(output),
        }
    }
}

/// Driver without hardware: records every command and integrates a position.
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    log: OutputLog,
    position: f64,
}

impl SimulatedDriver {
    pub fn new() -> (Self, OutputLog) {
        let driver = Self::default();
        let log = driver.log.clone();
        (driver, log)
    }
}

impl ActuatorDriver for SimulatedDriver {
    fn set_percent_output(&mut self, output: f64) -> Result<(), DriverError> {
        self.log.push(output);
        self.position += output * SIM_COUNTS_PER_UPDATE;
        Ok(())
    }

    fn sensor_position(&self) -> f64 {
        self.position
    }

    fn set_sensor_position(&mut self, position: f64) -> Result<(), DriverError> {
        self.position = position;
        Ok(())
    }
}

/// One actuator with a validated percent-output setter.
pub struct MotorOutputDevice {
    id: DeviceId,
    port: u8,
    inverted: bool,
    driver: Box<dyn ActuatorDriver>,
    last_output: f64,
}

impl fmt::Debug for MotorOutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorOutputDevice")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("inverted", &self.inverted)
            .field("last_output", &self.last_output)
            .finish()
    }
}

impl MotorOutputDevice {
    pub fn new(id: DeviceId, port: u8, inverted: bool, driver: Box<dyn ActuatorDriver>) -> Self {
        debug!(
            "Creating {} on port {} (inverted: {})",
            id, port, inverted
        );
        Self {
            id,
            port,
            inverted,
            driver,
            last_output: 0.0,
        }
    }

    /// Device backed by a [`SimulatedDriver`], plus the log of its commands.
    pub fn simulated(id: DeviceId, port: u8, inverted: bool) -> (Self, OutputLog) {
        let (driver, log) = SimulatedDriver::new();
        (Self::new(id, port, inverted, Box::new(driver)), log)
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Last successfully committed output, before inversion.
    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    /// Commands `value` as percent output.
    ///
    /// Values outside [-1, 1] are rejected rather than clamped; the last
    /// committed output stays as it was.
    pub fn set_output(&mut self, value: f64) -> Result<(), DeviceError> {
        if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
            warn!("Rejecting output {} for {}", value, self.id);
            return Err(DeviceError::InvalidOutput {
                device: self.id,
                value,
            });
        }

        let commanded = if self.inverted { -value } else { value };
        self.driver
            .set_percent_output(commanded)
            .map_err(|e| DeviceError::Driver {
                device: self.id,
                message: e.to_string(),
            })?;

        self.last_output = value;
        Ok(())
    }

    /// Sensor position with the sign discarded.
    ///
    /// The magnitude is all callers get: direction of travel is lost. Kept as
    /// the intake height has always been read this way.
    pub fn get_position(&self) -> f64 {
        self.driver.sensor_position().abs()
    }

    pub fn reset_position(&mut self) -> Result<(), DeviceError> {
        debug!("Resetting sensor position of {}", self.id);
        self.driver
            .set_sensor_position(0.0)
            .map_err(|e| DeviceError::Driver {
                device: self.id,
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct FailingDriver;

    impl ActuatorDriver for FailingDriver {
        fn set_percent_output(&mut self, _output: f64) -> Result<(), DriverError> {
            Err(DriverError("bus off".to_string()))
        }

        fn sensor_position(&self) -> f64 {
            0.0
        }

        fn set_sensor_position(&mut self, _position: f64) -> Result<(), DriverError> {
            Err(DriverError("bus off".to_string()))
        }
    }

    #[test]
    fn inverted_device_flips_the_commanded_sign() {
        let (mut device, log) = MotorOutputDevice::simulated(DeviceId::Shooter, 5, true);
        device.set_output(0.8).unwrap();
        assert_eq!(log.outputs(), vec![-0.8]);
        assert_eq!(device.last_output(), 0.8);
    }

    #[test]
    fn position_is_reported_without_sign() {
        let (mut device, _log) = MotorOutputDevice::simulated(DeviceId::IntakeHeight, 7, false);
        device.set_output(-0.5).unwrap();
        assert_eq!(device.get_position(), 50.0);

        device.reset_position().unwrap();
        assert_eq!(device.get_position(), 0.0);
    }

    #[test]
    fn driver_failure_keeps_last_output() {
        let mut device = MotorOutputDevice::new(DeviceId::Intake, 6, false, Box::new(FailingDriver));
        let err = device.set_output(0.3).unwrap_err();
        assert!(matches!(err, DeviceError::Driver { device: DeviceId::Intake, .. }));
        assert_eq!(device.last_output(), 0.0);
        assert!(device.reset_position().is_err());
    }

    #[test]
    fn nan_is_rejected() {
        let (mut device, log) = MotorOutputDevice::simulated(DeviceId::Elevator, 8, false);
        assert!(device.set_output(f64::NAN).is_err());
        assert!(log.outputs().is_empty());
    }

    proptest! {
        #[test]
        fn negated_outputs_are_recorded_as_negations(v in -1.0f64..=1.0) {
            let (mut device, log) = MotorOutputDevice::simulated(DeviceId::Intake, 6, false);
            device.set_output(v).unwrap();
            device.set_output(-v).unwrap();

            let outputs = log.outputs();
            prop_assert_eq!(outputs.len(), 2);
            prop_assert_eq!(outputs[0], -outputs[1]);
        }

        #[test]
        fn out_of_range_output_is_rejected_and_state_kept(
            start in -1.0f64..=1.0,
            magnitude in 1.000_001f64..1e6,
            negative in any::<bool>(),
        ) {
            let v = if negative { -magnitude } else { magnitude };
            let (mut device, log) = MotorOutputDevice::simulated(DeviceId::ElevatorWheel, 9, false);
            device.set_output(start).unwrap();

            let err = device.set_output(v).unwrap_err();
            prop_assert_eq!(err, DeviceError::InvalidOutput { device: DeviceId::ElevatorWheel, value: v });
            prop_assert_eq!(device.last_output(), start);
            prop_assert_eq!(log.outputs(), vec![start]);
        }
    }
}
