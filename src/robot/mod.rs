//! Robot lifecycle and the per-tick control function
//!
//! ```text
//! Disabled ◄──► Autonomous ◄──► Teleop
//! ```
//!
//! Every mode change first puts all devices in neutral. In teleop each tick
//! evaluates the binding table, then runs the default drive unless a binding
//! already wrote a drive motor.

pub mod container;
pub mod schedule;

pub use schedule::MatchSchedule;

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::autonomous::{AutoRun, AutoSelector, SelectorError};
use crate::bindings::{BindingError, BindingTable, Sealed, TickReport};
use crate::config::RobotConfig;
use crate::controller::InputSnapshot;
use crate::subsystems::Subsystems;
use crate::telemetry::Sinks;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RobotMode {
    Disabled,
    Autonomous,
    Teleop,
}

impl fmt::Display for RobotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RobotMode::Disabled => "disabled",
            RobotMode::Autonomous => "autonomous",
            RobotMode::Teleop => "teleop",
        };
        f.write_str(name)
    }
}

pub struct Robot {
    config: RobotConfig,
    subsystems: Subsystems,
    bindings: BindingTable<Sealed>,
    selector: AutoSelector,
    sinks: Sinks,
    mode: RobotMode,
    auto_run: Option<AutoRun>,
    period: Duration,
    ticks: u64,
}

impl Robot {
    /// Wires bindings and the chooser, publishes the chooser and starts the
    /// cameras. The robot starts disabled.
    pub fn new(config: RobotConfig, subsystems: Subsystems, mut sinks: Sinks) -> Result<Self, BindingError> {
        let bindings = container::configure_button_bindings(&config)?;
        let selector = container::configure_autonomous(&config);
        selector.publish(sinks.dashboard.as_mut());
        container::start_cameras(sinks.video.as_mut());

        let period = Duration::from_millis(config.tick.period_ms);
        info!(
            "Robot ready: {} bindings, tick period {:?}",
            bindings.len(),
            period
        );

        Ok(Self {
            config,
            subsystems,
            bindings,
            selector,
            sinks,
            mode: RobotMode::Disabled,
            auto_run: None,
            period,
            ticks: 0,
        })
    }

    pub fn mode(&self) -> RobotMode {
        self.mode
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn subsystems(&self) -> &Subsystems {
        &self.subsystems
    }

    pub fn bindings(&self) -> &BindingTable<Sealed> {
        &self.bindings
    }

    pub fn auto_run(&self) -> Option<&AutoRun> {
        self.auto_run.as_ref()
    }

    /// Picks the autonomous routine used the next time autonomous starts.
    pub fn select_autonomous(&mut self, name: &str) -> Result<(), SelectorError> {
        self.selector.select(name)
    }

    pub fn set_mode(&mut self, mode: RobotMode) {
        if mode == self.mode {
            return;
        }
        info!("Robot mode {} -> {}", self.mode, mode);

        let failures = self.subsystems.neutral_all();
        if failures > 0 {
            warn!("{} devices failed to go neutral", failures);
        }
        if let Err(e) = self.subsystems.drive.set_max_output(1.0) {
            self.sinks.diagnostics.report("mode change", &e);
        }
        self.auto_run = None;

        match mode {
            RobotMode::Disabled => {}
            RobotMode::Autonomous => {
                // Read once per autonomous period
                self.auto_run = self.selector.selected().map(|routine| routine.start());
                if self.auto_run.is_none() {
                    warn!("No autonomous routine available");
                }
            }
            RobotMode::Teleop => self.bindings.reset_toggles(),
        }

        self.mode = mode;
        self.sinks.dashboard.put_string("mode", &mode.to_string());
    }

    pub fn disable(&mut self) {
        self.set_mode(RobotMode::Disabled);
    }

    /// One control loop iteration, assuming exactly one period has passed.
    pub fn tick(&mut self, snapshot: &InputSnapshot) -> TickReport {
        self.tick_for(snapshot, self.period)
    }

    /// One control loop iteration after `dt` of wall time. Autonomous steps
    /// are timed with `dt`, so late or skipped ticks do not stretch them.
    pub fn tick_for(&mut self, snapshot: &InputSnapshot, dt: Duration) -> TickReport {
        let report = match self.mode {
            RobotMode::Disabled => TickReport::default(),
            RobotMode::Autonomous => {
                if let Some(run) = &mut self.auto_run {
                    run.tick(
                        dt,
                        &mut self.subsystems,
                        self.sinks.diagnostics.as_mut(),
                    );
                }
                TickReport::default()
            }
            RobotMode::Teleop => {
                let report = self.bindings.evaluate(
                    snapshot,
                    &mut self.subsystems,
                    self.sinks.diagnostics.as_mut(),
                );
                if report.wrote_drive() {
                    debug!("Default drive overridden this tick");
                } else {
                    self.default_drive(snapshot);
                }
                report
            }
        };

        self.ticks += 1;
        if self.ticks % u64::from(self.config.tick.telemetry_every_ticks) == 0 {
            self.publish_telemetry();
        }
        report
    }

    // Split-stick arcade from the driver gamepad; stick y is positive down
    fn default_drive(&mut self, snapshot: &InputSnapshot) {
        let (x, y, rot) = snapshot
            .controller(self.config.controllers.driver_port)
            .map(|driver| {
                (
                    -f64::from(driver.left_stick.y),
                    f64::from(driver.left_stick.x),
                    f64::from(driver.right_stick.x),
                )
            })
            .unwrap_or_default();

        if let Err(e) = self.subsystems.drive.drive(x, y, rot, false) {
            self.sinks.diagnostics.report("default drive", &e);
        }
    }

    fn publish_telemetry(&mut self) {
        let dashboard = self.sinks.dashboard.as_mut();
        for device in self.subsystems.devices() {
            dashboard.put_number(device.id().name(), device.last_output());
        }
        dashboard.put_number("drive_max_output", self.subsystems.drive.max_output());
        dashboard.put_number(
            "intake_height_position",
            self.subsystems.intake_height.get_position(),
        );
        if let Some(run) = &self.auto_run {
            let step = run
                .current_step()
                .map(|step| step.label.as_str())
                .unwrap_or("done");
            dashboard.put_string("auto_step", step);
        }
    }
}
