//! Timed autonomous routines

use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::OutputsConfig;
use crate::subsystems::{DeviceError, DeviceId, DriveSubsystem, Subsystems};
use crate::telemetry::DiagnosticsSink;

/// Robot-relative drive speeds for one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveCommand {
    pub x: f64,
    pub y: f64,
    pub rot: f64,
}

/// Outputs held for a fixed duration. Applied every tick while current, at
/// least once even with a zero duration.
#[derive(Clone, Debug, PartialEq)]
pub struct AutoStep {
    pub label: String,
    pub outputs: Vec<(DeviceId, f64)>,
    pub drive: Option<DriveCommand>,
    pub duration: Duration,
}

impl AutoStep {
    pub fn new(label: impl Into<String>, duration: Duration) -> Self {
        Self {
            label: label.into(),
            outputs: Vec::new(),
            drive: None,
            duration,
        }
    }

    pub fn output(mut self, device: DeviceId, value: f64) -> Self {
        self.outputs.push((device, value));
        self
    }

    pub fn drive(mut self, x: f64, y: f64, rot: f64) -> Self {
        self.drive = Some(DriveCommand { x, y, rot });
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AutoRoutine {
    name: String,
    steps: Vec<AutoStep>,
}

impl AutoRoutine {
    pub fn new(name: impl Into<String>, steps: Vec<AutoStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Shoot the preloaded ball high, then back off the line.
    pub fn basic(outputs: &OutputsConfig) -> Self {
        Self::new(
            "Basic Auto",
            vec![
                AutoStep::new("spin up shooter", Duration::from_millis(1000))
                    .output(DeviceId::Shooter, outputs.high_shooter_output),
                AutoStep::new("feed", Duration::from_millis(2000))
                    .output(DeviceId::Shooter, outputs.high_shooter_output)
                    .output(DeviceId::Elevator, outputs.elevator_output),
                AutoStep::new("stop mechanisms", Duration::ZERO)
                    .output(DeviceId::Shooter, 0.0)
                    .output(DeviceId::Elevator, 0.0),
                AutoStep::new("back up", Duration::from_millis(1500)).drive(
                    -outputs.auto_drive_output,
                    0.0,
                    0.0,
                ),
                AutoStep::new("stop", Duration::ZERO).drive(0.0, 0.0, 0.0),
            ],
        )
    }

    /// Does nothing; every device stays neutral.
    pub fn idle() -> Self {
        Self::new("Do Nothing", Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[AutoStep] {
        &self.steps
    }

    pub fn start(&self) -> AutoRun {
        info!("Starting autonomous routine '{}'", self.name);
        AutoRun {
            routine: self.clone(),
            step: 0,
            elapsed: Duration::ZERO,
            touched: BTreeSet::new(),
            finished: false,
        }
    }
}

/// One execution of a routine, advanced one tick at a time.
#[derive(Debug)]
pub struct AutoRun {
    routine: AutoRoutine,
    step: usize,
    elapsed: Duration,
    touched: BTreeSet<DeviceId>,
    finished: bool,
}

impl AutoRun {
    pub fn routine(&self) -> &AutoRoutine {
        &self.routine
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_step(&self) -> Option<&AutoStep> {
        if self.finished {
            None
        } else {
            self.routine.steps.get(self.step)
        }
    }

    /// Applies the current step and advances its clock by `dt`, the time
    /// since the previous tick. Returns whether the routine is still running.
    pub fn tick(
        &mut self,
        dt: Duration,
        subsystems: &mut Subsystems,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> bool {
        if self.finished {
            return false;
        }

        let Some(step) = self.routine.steps.get(self.step) else {
            self.finish(subsystems, diagnostics);
            return false;
        };

        if let Err(e) = apply_step(step, subsystems) {
            diagnostics.report(&format!("auto: {}", step.label), &e);
        }
        self.touched.extend(step.outputs.iter().map(|(id, _)| *id));
        if step.drive.is_some() {
            self.touched.extend(DriveSubsystem::MOTORS);
        }

        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed >= step.duration {
            debug!("Autonomous step '{}' done", step.label);
            self.step += 1;
            self.elapsed = Duration::ZERO;
            if self.step >= self.routine.steps.len() {
                self.finish(subsystems, diagnostics);
                return false;
            }
        }
        true
    }

    // Everything the routine wrote goes back to neutral
    fn finish(&mut self, subsystems: &mut Subsystems, diagnostics: &mut dyn DiagnosticsSink) {
        for id in &self.touched {
            if let Err(e) = subsystems.device_mut(*id).set_output(0.0) {
                diagnostics.report("auto: neutral", &e);
            }
        }
        self.finished = true;
        info!("Autonomous routine '{}' finished", self.routine.name);
    }
}

fn apply_step(step: &AutoStep, subsystems: &mut Subsystems) -> Result<(), DeviceError> {
    for (id, value) in &step.outputs {
        subsystems.device_mut(*id).set_output(*value)?;
    }
    if let Some(drive) = step.drive {
        subsystems.drive.drive(drive.x, drive.y, drive.rot, false)?;
    }
    Ok(())
}
