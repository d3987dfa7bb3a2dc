//! Hardware PWM driver for Raspberry Pi controlled motor controllers

use rppal::pwm::{Channel, Polarity, Pwm};
use std::time::Duration;
use tracing::info;

use super::error::DriverError;
use super::motor::ActuatorDriver;

// Standard RC/motor-controller servo pulse: 50 Hz, 1.0-2.0 ms, 1.5 ms neutral
const PERIOD: Duration = Duration::from_millis(20);
const NEUTRAL_PULSE_US: f64 = 1500.0;
const PULSE_SPAN_US: f64 = 500.0;

/// Drives a PWM motor controller from one of the Pi's hardware PWM channels.
///
/// PWM gives no feedback, so the sensor position is always zero.
pub struct PwmDriver {
    pwm: Pwm,
}

impl PwmDriver {
    pub fn open(port: u8) -> Result<Self, DriverError> {
        let channel = match port {
            0 => Channel::Pwm0,
            1 => Channel::Pwm1,
            other => {
                return Err(DriverError(format!(
                    "No hardware PWM channel for port {}",
                    other
                )))
            }
        };

        let pwm = Pwm::with_period(
            channel,
            PERIOD,
            pulse_width(0.0),
            Polarity::Normal,
            true,
        )
        .map_err(|e| DriverError(format!("Failed to open PWM port {}: {}", port, e)))?;

        info!("Opened hardware PWM on port {}", port);
        Ok(Self { pwm })
    }
}

fn pulse_width(output: f64) -> Duration {
    Duration::from_micros((NEUTRAL_PULSE_US + output * PULSE_SPAN_US).round() as u64)
}

impl ActuatorDriver for PwmDriver {
    fn set_percent_output(&mut self, output: f64) -> Result<(), DriverError> {
        self.pwm
            .set_pulse_width(pulse_width(output))
            .map_err(|e| DriverError(e.to_string()))
    }

    fn sensor_position(&self) -> f64 {
        0.0
    }

    fn set_sensor_position(&mut self, _position: f64) -> Result<(), DriverError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_width_spans_one_to_two_milliseconds() {
        assert_eq!(pulse_width(-1.0), Duration::from_micros(1000));
        assert_eq!(pulse_width(0.0), Duration::from_micros(1500));
        assert_eq!(pulse_width(1.0), Duration::from_micros(2000));
        assert_eq!(pulse_width(0.5), Duration::from_micros(1750));
    }

    #[test]
    fn ports_without_hardware_channel_are_rejected() {
        assert!(PwmDriver::open(7).is_err());
    }
}
