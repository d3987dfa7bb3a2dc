//! Robot configuration
//!
//! Loaded once at startup from `$ROBOT_CONFIG` or
//! `~/.config/robot_container/robot.toml`. Every section has defaults, so a
//! missing file or a partial file still yields a complete configuration.
//! Nothing here is reconfigurable while the robot runs.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::controller::POV_ANGLES;
use crate::subsystems::DeviceId;

const CONFIG_DIR: &str = ".config/robot_container";
const CONFIG_FILE: &str = "robot.toml";
const CONFIG_ENV: &str = "ROBOT_CONFIG";
// Upper bound for a single match period
const MAX_PERIOD_SECS: f64 = 3600.0;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub controllers: ControllersConfig,
    pub devices: DevicesConfig,
    pub outputs: OutputsConfig,
    pub dpad: DpadConfig,
    #[serde(rename = "loop")]
    pub tick: LoopConfig,
    pub schedule: ScheduleConfig,
}

/// Gamepad ports of the two operator roles.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllersConfig {
    pub driver_port: u8,
    pub mech_port: u8,
    pub joystick_deadzone: f32,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            driver_port: 0,
            mech_port: 1,
            joystick_deadzone: 0.05,
        }
    }
}

impl ControllersConfig {
    pub fn ports(&self) -> Vec<u8> {
        vec![self.driver_port, self.mech_port]
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Simulated,
    Pwm,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    pub port: u8,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub driver: DriverKind,
}

impl DeviceConfig {
    fn on(port: u8) -> Self {
        Self {
            port,
            inverted: false,
            driver: DriverKind::Simulated,
        }
    }

    fn inverted_on(port: u8) -> Self {
        Self {
            inverted: true,
            ..Self::on(port)
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DevicesConfig {
    pub front_left_drive: DeviceConfig,
    pub rear_left_drive: DeviceConfig,
    pub front_right_drive: DeviceConfig,
    pub rear_right_drive: DeviceConfig,
    pub shooter: DeviceConfig,
    pub intake: DeviceConfig,
    pub intake_height: DeviceConfig,
    pub elevator: DeviceConfig,
    pub elevator_wheel: DeviceConfig,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            front_left_drive: DeviceConfig::on(1),
            rear_left_drive: DeviceConfig::on(2),
            // Right side motors face the other way
            front_right_drive: DeviceConfig::inverted_on(3),
            rear_right_drive: DeviceConfig::inverted_on(4),
            shooter: DeviceConfig::on(5),
            intake: DeviceConfig::on(6),
            intake_height: DeviceConfig::on(7),
            elevator: DeviceConfig::on(8),
            elevator_wheel: DeviceConfig::on(9),
        }
    }
}

impl DevicesConfig {
    pub fn get(&self, id: DeviceId) -> &DeviceConfig {
        match id {
            DeviceId::FrontLeftDrive => &self.front_left_drive,
            DeviceId::RearLeftDrive => &self.rear_left_drive,
            DeviceId::FrontRightDrive => &self.front_right_drive,
            DeviceId::RearRightDrive => &self.rear_right_drive,
            DeviceId::Shooter => &self.shooter,
            DeviceId::Intake => &self.intake,
            DeviceId::IntakeHeight => &self.intake_height,
            DeviceId::Elevator => &self.elevator,
            DeviceId::ElevatorWheel => &self.elevator_wheel,
        }
    }
}

/// Output magnitudes used by the bindings and the autonomous routine.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OutputsConfig {
    pub intake_output: f64,
    pub adjust_intake_output: f64,
    pub low_shooter_output: f64,
    pub high_shooter_output: f64,
    pub elevator_output: f64,
    pub elevator_wheel_output: f64,
    // Drive output limit while the driver holds the half-speed bumper
    pub half_speed_output: f64,
    pub auto_drive_output: f64,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            intake_output: 0.6,
            adjust_intake_output: 0.3,
            low_shooter_output: 0.35,
            high_shooter_output: 0.8,
            elevator_output: 0.5,
            elevator_wheel_output: 0.4,
            half_speed_output: 0.5,
            auto_drive_output: 0.4,
        }
    }
}

/// D-pad angles for elevator up/down.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DpadConfig {
    pub up: u16,
    pub down: u16,
}

impl Default for DpadConfig {
    fn default() -> Self {
        Self { up: 0, down: 180 }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoopConfig {
    pub period_ms: u64,
    // Telemetry is published every N ticks
    pub telemetry_every_ticks: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            telemetry_every_ticks: 5,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Autonomous, then teleop, then disabled
    #[default]
    Match,
    Autonomous,
    Teleop,
    Disabled,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub mode: ScheduleMode,
    pub autonomous_secs: f64,
    pub teleop_secs: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::Match,
            autonomous_secs: 15.0,
            teleop_secs: 135.0,
        }
    }
}

impl RobotConfig {
    /// Path from `$ROBOT_CONFIG`, else the file in the user's config dir.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads and validates the configuration, falling back to defaults when
    /// the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            warn!(
                "No configuration at {}, using defaults",
                path.display()
            );
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))?;
        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    pub fn validate(&self) -> Result<()> {
        let controllers = &self.controllers;
        if controllers.driver_port == controllers.mech_port {
            return Err(eyre!(
                "Driver and mechanism controller share port {}",
                controllers.driver_port
            ));
        }
        if !(0.0..1.0).contains(&controllers.joystick_deadzone) {
            return Err(eyre!(
                "Joystick deadzone {} must be within [0, 1)",
                controllers.joystick_deadzone
            ));
        }

        let mut ports = HashSet::new();
        for id in DeviceId::ALL {
            let port = self.devices.get(id).port;
            if !ports.insert(port) {
                return Err(eyre!("Device {} reuses port {}", id, port));
            }
        }

        let outputs = &self.outputs;
        for (name, value) in [
            ("intake_output", outputs.intake_output),
            ("adjust_intake_output", outputs.adjust_intake_output),
            ("low_shooter_output", outputs.low_shooter_output),
            ("high_shooter_output", outputs.high_shooter_output),
            ("elevator_output", outputs.elevator_output),
            ("elevator_wheel_output", outputs.elevator_wheel_output),
            ("auto_drive_output", outputs.auto_drive_output),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(eyre!("Output {} = {} must be within [-1, 1]", name, value));
            }
        }
        if !(0.0..=1.0).contains(&outputs.half_speed_output) {
            return Err(eyre!(
                "half_speed_output = {} must be within [0, 1]",
                outputs.half_speed_output
            ));
        }

        for (name, angle) in [("up", self.dpad.up), ("down", self.dpad.down)] {
            if !POV_ANGLES.contains(&angle) {
                return Err(eyre!("D-pad {} angle {} is not a POV position", name, angle));
            }
        }

        if self.tick.period_ms == 0 {
            return Err(eyre!("Loop period must be positive"));
        }
        if self.tick.telemetry_every_ticks == 0 {
            return Err(eyre!("telemetry_every_ticks must be positive"));
        }
        for (name, secs) in [
            ("autonomous_secs", self.schedule.autonomous_secs),
            ("teleop_secs", self.schedule.teleop_secs),
        ] {
            // Also rejects NaN
            if !(0.0..=MAX_PERIOD_SECS).contains(&secs) {
                return Err(eyre!(
                    "Schedule {} = {} must be within [0, {}]",
                    name,
                    secs,
                    MAX_PERIOD_SECS
                ));
            }
        }

        Ok(())
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        RobotConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = RobotConfig::from_toml_str(
            r#"
            [controllers]
            mech_port = 3

            [devices.shooter]
            port = 12
            inverted = true

            [loop]
            period_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.controllers.mech_port, 3);
        assert_eq!(config.controllers.driver_port, 0);
        assert_eq!(config.devices.shooter.port, 12);
        assert!(config.devices.shooter.inverted);
        assert_eq!(config.devices.shooter.driver, DriverKind::Simulated);
        assert_eq!(config.devices.intake, DevicesConfig::default().intake);
        assert_eq!(config.tick.period_ms, 10);
        assert_eq!(config.outputs, OutputsConfig::default());
    }

    #[test]
    fn duplicate_device_ports_are_rejected() {
        let err = RobotConfig::from_toml_str(
            r#"
            [devices.elevator]
            port = 5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("reuses port 5"));
    }

    #[test]
    fn out_of_range_output_is_rejected() {
        let mut config = RobotConfig::default();
        config.outputs.high_shooter_output = 1.2;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::default();
        config.outputs.half_speed_output = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_dpad_angle_is_rejected() {
        let mut config = RobotConfig::default();
        config.dpad.up = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_schedule_is_rejected() {
        let result = RobotConfig::from_toml_str("[schedule]\nteleop_secs = inf\n");
        assert!(result.is_err());
        let result = RobotConfig::from_toml_str("[schedule]\nautonomous_secs = nan\n");
        assert!(result.is_err());

        let mut config = RobotConfig::default();
        config.schedule.teleop_secs = 1e300;
        assert!(config.validate().is_err());
        config.schedule.teleop_secs = 3600.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn shared_controller_port_is_rejected() {
        let mut config = RobotConfig::default();
        config.controllers.mech_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_round_trip() {
        let mut config = RobotConfig::default();
        config.schedule.mode = ScheduleMode::Teleop;
        config.devices.shooter.driver = DriverKind::Pwm;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = RobotConfig::load_from(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RobotConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
