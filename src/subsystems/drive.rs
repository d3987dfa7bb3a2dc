//! Four-motor mecanum drive

use tracing::debug;

use super::error::DeviceError;
use super::motor::MotorOutputDevice;
use super::DeviceId;

/// Inputs below this magnitude are treated as zero.
pub const DEFAULT_DEADBAND: f64 = 0.02;

/// Mecanum drive base.
///
/// `x` is forward, `y` is strafe to the right, `rot` is clockwise rotation.
#[derive(Debug)]
pub struct DriveSubsystem {
    pub(super) front_left: MotorOutputDevice,
    pub(super) rear_left: MotorOutputDevice,
    pub(super) front_right: MotorOutputDevice,
    pub(super) rear_right: MotorOutputDevice,
    max_output: f64,
    deadband: f64,
    // Supplied by the gyro collaborator, degrees clockwise
    heading_deg: f64,
}

impl DriveSubsystem {
    pub fn new(
        front_left: MotorOutputDevice,
        rear_left: MotorOutputDevice,
        front_right: MotorOutputDevice,
        rear_right: MotorOutputDevice,
    ) -> Self {
        Self {
            front_left,
            rear_left,
            front_right,
            rear_right,
            max_output: 1.0,
            deadband: DEFAULT_DEADBAND,
            heading_deg: 0.0,
        }
    }

    pub const MOTORS: [DeviceId; 4] = [
        DeviceId::FrontLeftDrive,
        DeviceId::RearLeftDrive,
        DeviceId::FrontRightDrive,
        DeviceId::RearRightDrive,
    ];

    /// Drives with cartesian speeds, each in [-1, 1] (clamped).
    pub fn drive(
        &mut self,
        x_speed: f64,
        y_speed: f64,
        rot: f64,
        field_relative: bool,
    ) -> Result<(), DeviceError> {
        let mut x = self.condition(x_speed);
        let mut y = self.condition(y_speed);
        let rot = self.condition(rot);

        if field_relative {
            let (sin, cos) = (-self.heading_deg).to_radians().sin_cos();
            let rotated_x = x * cos - y * sin;
            let rotated_y = x * sin + y * cos;
            x = rotated_x;
            y = rotated_y;
        }

        let [fl, fr, rl, rr] = mecanum_wheel_speeds(x, y, rot);
        let scale = self.max_output;
        self.write_wheels([fl * scale, rl * scale, fr * scale, rr * scale])
    }

    /// Scales every subsequent `drive` output; used for half-speed driving.
    pub fn set_max_output(&mut self, max_output: f64) -> Result<(), DeviceError> {
        if !max_output.is_finite() || !(0.0..=1.0).contains(&max_output) {
            return Err(DeviceError::InvalidLimit { value: max_output });
        }
        debug!("Drive max output set to {}", max_output);
        self.max_output = max_output;
        Ok(())
    }

    pub fn max_output(&self) -> f64 {
        self.max_output
    }

    pub fn set_heading(&mut self, heading_deg: f64) {
        self.heading_deg = heading_deg;
    }

    pub fn stop(&mut self) -> Result<(), DeviceError> {
        self.write_wheels([0.0; 4])
    }

    pub fn motors(&self) -> [&MotorOutputDevice; 4] {
        [
            &self.front_left,
            &self.rear_left,
            &self.front_right,
            &self.rear_right,
        ]
    }

    fn motors_mut(&mut self) -> [&mut MotorOutputDevice; 4] {
        [
            &mut self.front_left,
            &mut self.rear_left,
            &mut self.front_right,
            &mut self.rear_right,
        ]
    }

    // Outputs in `motors()` order. A failing wheel does not keep the others
    // at their old output; the first error is returned.
    fn write_wheels(&mut self, outputs: [f64; 4]) -> Result<(), DeviceError> {
        let mut first_error = None;
        for (motor, output) in self.motors_mut().into_iter().zip(outputs) {
            if let Err(e) = motor.set_output(output) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn condition(&self, value: f64) -> f64 {
        let value = if value.is_finite() {
            value.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        if value.abs() < self.deadband {
            0.0
        } else {
            value
        }
    }
}

/// Wheel speeds `[front_left, front_right, rear_left, rear_right]`,
/// normalised so none exceeds 1 in magnitude.
pub fn mecanum_wheel_speeds(x: f64, y: f64, rot: f64) -> [f64; 4] {
    let mut speeds = [x + y + rot, x - y - rot, x - y + rot, x + y - rot];

    let max = speeds.iter().fold(0.0f64, |acc, s| acc.max(s.abs()));
    if max > 1.0 {
        speeds.iter_mut().for_each(|s| *s /= max);
    }
    speeds
}
