//! Device layer: one wrapper per actuator, owned by [`Subsystems`]
//!
//! Nothing outside this module talks to an [`ActuatorDriver`] directly.
//! Bindings and autonomous routines address devices by [`DeviceId`] and go
//! through [`Subsystems::device_mut`].

pub mod drive;
pub mod error;
pub mod motor;
pub mod pwm;

pub use drive::DriveSubsystem;
pub use error::{DeviceError, DriverError};
pub use motor::{ActuatorDriver, MotorOutputDevice, OutputLog, SimulatedDriver};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, info};

use crate::config::{DeviceConfig, DevicesConfig, DriverKind};
use pwm::PwmDriver;

/// Every actuator on the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceId {
    FrontLeftDrive,
    RearLeftDrive,
    FrontRightDrive,
    RearRightDrive,
    Shooter,
    Intake,
    IntakeHeight,
    Elevator,
    ElevatorWheel,
}

impl DeviceId {
    pub const ALL: [DeviceId; 9] = [
        DeviceId::FrontLeftDrive,
        DeviceId::RearLeftDrive,
        DeviceId::FrontRightDrive,
        DeviceId::RearRightDrive,
        DeviceId::Shooter,
        DeviceId::Intake,
        DeviceId::IntakeHeight,
        DeviceId::Elevator,
        DeviceId::ElevatorWheel,
    ];

    pub fn is_drive(&self) -> bool {
        DriveSubsystem::MOTORS.contains(self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceId::FrontLeftDrive => "front_left_drive",
            DeviceId::RearLeftDrive => "rear_left_drive",
            DeviceId::FrontRightDrive => "front_right_drive",
            DeviceId::RearRightDrive => "rear_right_drive",
            DeviceId::Shooter => "shooter",
            DeviceId::Intake => "intake",
            DeviceId::IntakeHeight => "intake_height",
            DeviceId::Elevator => "elevator",
            DeviceId::ElevatorWheel => "elevator_wheel",
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The robot context: all devices, built once at startup and passed by
/// `&mut` into every tick.
#[derive(Debug)]
pub struct Subsystems {
    pub drive: DriveSubsystem,
    pub shooter: MotorOutputDevice,
    pub intake: MotorOutputDevice,
    pub intake_height: MotorOutputDevice,
    pub elevator: MotorOutputDevice,
    pub elevator_wheel: MotorOutputDevice,
}

impl Subsystems {
    /// Builds every device with the driver its configuration names.
    pub fn from_config(config: &DevicesConfig) -> Result<Self, DeviceError> {
        let build = |id: DeviceId| -> Result<MotorOutputDevice, DeviceError> {
            let device = config.get(id);
            let driver = open_driver(id, device)?;
            Ok(MotorOutputDevice::new(id, device.port, device.inverted, driver))
        };

        let subsystems = Self {
            drive: DriveSubsystem::new(
                build(DeviceId::FrontLeftDrive)?,
                build(DeviceId::RearLeftDrive)?,
                build(DeviceId::FrontRightDrive)?,
                build(DeviceId::RearRightDrive)?,
            ),
            shooter: build(DeviceId::Shooter)?,
            intake: build(DeviceId::Intake)?,
            intake_height: build(DeviceId::IntakeHeight)?,
            elevator: build(DeviceId::Elevator)?,
            elevator_wheel: build(DeviceId::ElevatorWheel)?,
        };
        info!("Subsystems initialized");
        Ok(subsystems)
    }

    /// All devices simulated regardless of configured driver, with their logs.
    pub fn simulated(config: &DevicesConfig) -> (Self, HashMap<DeviceId, OutputLog>) {
        let mut logs = HashMap::new();
        let mut build = |id: DeviceId| {
            let device = config.get(id);
            let (motor, log) = MotorOutputDevice::simulated(id, device.port, device.inverted);
            logs.insert(id, log);
            motor
        };

        let subsystems = Self {
            drive: DriveSubsystem::new(
                build(DeviceId::FrontLeftDrive),
                build(DeviceId::RearLeftDrive),
                build(DeviceId::FrontRightDrive),
                build(DeviceId::RearRightDrive),
            ),
            shooter: build(DeviceId::Shooter),
            intake: build(DeviceId::Intake),
            intake_height: build(DeviceId::IntakeHeight),
            elevator: build(DeviceId::Elevator),
            elevator_wheel: build(DeviceId::ElevatorWheel),
        };
        (subsystems, logs)
    }

    pub fn device_mut(&mut self, id: DeviceId) -> &mut MotorOutputDevice {
        match id {
            DeviceId::Shooter => &mut self.shooter,
            DeviceId::Intake => &mut self.intake,
            DeviceId::IntakeHeight => &mut self.intake_height,
            DeviceId::Elevator => &mut self.elevator,
            DeviceId::ElevatorWheel => &mut self.elevator_wheel,
            DeviceId::FrontLeftDrive => &mut self.drive.front_left,
            DeviceId::RearLeftDrive => &mut self.drive.rear_left,
            DeviceId::FrontRightDrive => &mut self.drive.front_right,
            DeviceId::RearRightDrive => &mut self.drive.rear_right,
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = &MotorOutputDevice> {
        self.drive.motors().into_iter().chain([
            &self.shooter,
            &self.intake,
            &self.intake_height,
            &self.elevator,
            &self.elevator_wheel,
        ])
    }

    /// Sets every device to zero output. Failures are logged, not returned,
    /// so one broken device cannot keep the others running.
    pub fn neutral_all(&mut self) -> usize {
        let mut failures = 0;
        for id in DeviceId::ALL {
            if let Err(e) = self.device_mut(id).set_output(0.0) {
                error!("Failed to neutralize {}: {}", id, e);
                failures += 1;
            }
        }
        failures
    }
}

fn open_driver(id: DeviceId, config: &DeviceConfig) -> Result<Box<dyn ActuatorDriver>, DeviceError> {
    match config.driver {
        DriverKind::Simulated => {
            let (driver, _log) = SimulatedDriver::new();
            Ok(Box::new(driver))
        }
        DriverKind::Pwm => PwmDriver::open(config.port)
            .map(|driver| Box::new(driver) as Box<dyn ActuatorDriver>)
            .map_err(|e| DeviceError::Driver {
                device: id,
                message: e.to_string(),
            }),
    }
}
