//! Binding table with a build/seal lifecycle
//!
//! ```text
//! Building ──register()*──► seal() ──► Sealed ──evaluate() per tick
//! ```
//!
//! Registration is only possible while building. A sealed table can only be
//! evaluated and have its toggles reset.

use statum::{machine, state};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

use super::action::CommandAction;
use super::edge::{EdgeSet, InputEdgeBinding};
use super::error::BindingError;
use crate::controller::{Control, ControlId, InputSnapshot, POV_ANGLES};
use crate::subsystems::{DeviceId, Subsystems};
use crate::telemetry::DiagnosticsSink;

/// One registered control → action association.
#[derive(Clone, Debug)]
pub struct Binding {
    label: String,
    trigger: InputEdgeBinding,
    action: CommandAction,
}

impl Binding {
    pub fn new(label: impl Into<String>, control: Control, edges: EdgeSet, action: CommandAction) -> Self {
        Self {
            label: label.into(),
            trigger: InputEdgeBinding::new(control, edges),
            action,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn control(&self) -> Control {
        self.trigger.control()
    }

    pub fn edges(&self) -> EdgeSet {
        self.trigger.edges()
    }

    pub fn action(&self) -> &CommandAction {
        &self.action
    }

    pub fn toggle_active(&self) -> bool {
        self.trigger.toggle_active()
    }
}

/// What one evaluation did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Actions run, start or stop
    pub fired: usize,
    pub failures: usize,
    pub written: BTreeSet<DeviceId>,
}

impl TickReport {
    pub fn wrote_drive(&self) -> bool {
        self.written.iter().any(DeviceId::is_drive)
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum TableState {
    Building,
    Sealed,
}

#[machine]
#[derive(Debug)]
pub struct BindingTable<S: TableState> {
    bindings: Vec<Binding>,
    // Ports with a configured gamepad slot
    known_ports: HashSet<u8>,
    conflicts: Vec<BindingError>,
}

impl<S: TableState> BindingTable<S> {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Overlapping registrations seen while building.
    pub fn conflicts(&self) -> &[BindingError] {
        &self.conflicts
    }
}

impl BindingTable<Building> {
    pub fn create(known_ports: impl IntoIterator<Item = u8>) -> Self {
        let known_ports: HashSet<u8> = known_ports.into_iter().collect();
        debug!("Creating binding table for ports {:?}", known_ports);
        Self::new(Vec::new(), known_ports, Vec::new())
    }

    /// Appends a binding.
    ///
    /// Fails when the control is not on a configured port, names an invalid
    /// POV angle, or the edges do not suit the action mode. Overlaps with an
    /// earlier binding on the same control and target are recorded and
    /// logged, and the binding is registered anyway.
    pub fn register(&mut self, binding: Binding) -> Result<(), BindingError> {
        let control = binding.control();

        if !self.known_ports.contains(&control.port) {
            return Err(BindingError::UnknownControl {
                control,
                reason: format!("no controller configured on port {}", control.port),
            });
        }
        if let ControlId::Pov(angle) = control.id {
            if !POV_ANGLES.contains(&angle) {
                return Err(BindingError::UnknownControl {
                    control,
                    reason: format!("{} is not a POV angle", angle),
                });
            }
        }
        binding.action.check_edges(&binding.edges())?;

        let existing = self.bindings.iter().find(|other| {
            other.control() == control
                && other.action.target == binding.action.target
                && other.edges().overlaps(&binding.edges())
        });
        if let Some(existing) = existing {
            let conflict = BindingError::DuplicateBinding {
                label: binding.label.clone(),
                existing: existing.label.clone(),
                control,
            };
            warn!("{}", conflict);
            self.conflicts.push(conflict);
        }

        debug!(
            "Registered '{}': {} {} -> {} ({:?})",
            binding.label,
            control,
            binding.edges(),
            binding.action.target,
            binding.action.mode
        );
        self.bindings.push(binding);
        Ok(())
    }

    pub fn seal(self) -> BindingTable<Sealed> {
        info!(
            "Binding table sealed with {} bindings ({} conflicts)",
            self.bindings.len(),
            self.conflicts.len()
        );
        self.transition()
    }
}

impl BindingTable<Sealed> {
    /// Fires every binding whose edges occurred in `snapshot`, in
    /// registration order. Failing actions go to `diagnostics`; evaluation
    /// continues with the next one.
    pub fn evaluate(
        &mut self,
        snapshot: &InputSnapshot,
        subsystems: &mut Subsystems,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> TickReport {
        let mut report = TickReport::default();

        for binding in &mut self.bindings {
            let sample = snapshot.sample(&binding.trigger.control());
            let edges = binding.trigger.edges();

            for fired in binding.trigger.poll(sample) {
                let Some(phase) = binding.action.phase_for(fired, &edges) else {
                    continue;
                };

                report.fired += 1;
                match binding.action.run(phase, subsystems) {
                    Ok(()) => {
                        if let Some(id) = binding.action.target.device() {
                            report.written.insert(id);
                        }
                    }
                    Err(e) => {
                        report.failures += 1;
                        diagnostics.report(&binding.label, &BindingError::from(e));
                    }
                }
            }
        }

        report
    }

    pub fn reset_toggles(&mut self) {
        debug!("Resetting toggle state");
        self.bindings
            .iter_mut()
            .for_each(|binding| binding.trigger.reset_toggle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::ActionTarget;
    use crate::config::DevicesConfig;
    use crate::controller::{ButtonType, ControlSample, ControllerState};
    use crate::subsystems::OutputLog;
    use crate::telemetry::TracingDiagnostics;
    use std::collections::HashMap;

    const MECH: u8 = 1;

    fn snapshot(samples: &[(ButtonType, ControlSample)]) -> InputSnapshot {
        let mut state = ControllerState {
            connected: true,
            ..ControllerState::default()
        };
        for (button, sample) in samples {
            state.buttons.insert(*button, *sample);
        }
        let mut snapshot = InputSnapshot::default();
        snapshot.controllers.insert(MECH, state);
        snapshot
    }

    fn press(button: ButtonType) -> InputSnapshot {
        snapshot(&[(
            button,
            ControlSample {
                held: true,
                pressed: true,
                released: false,
            },
        )])
    }

    fn release(button: ButtonType) -> InputSnapshot {
        snapshot(&[(
            button,
            ControlSample {
                held: false,
                pressed: false,
                released: true,
            },
        )])
    }

    fn tap(button: ButtonType) -> InputSnapshot {
        snapshot(&[(
            button,
            ControlSample {
                held: false,
                pressed: true,
                released: true,
            },
        )])
    }

    fn fixture() -> (Subsystems, HashMap<DeviceId, OutputLog>, TracingDiagnostics) {
        let (subsystems, logs) = Subsystems::simulated(&DevicesConfig::default());
        (subsystems, logs, TracingDiagnostics::default())
    }

    fn shooter(on: f64) -> CommandAction {
        CommandAction::toggle(ActionTarget::Device(DeviceId::Shooter), on, 0.0)
    }

    #[test]
    fn unconfigured_port_is_unknown() {
        let mut table = BindingTable::create([0, 1]);
        let err = table
            .register(Binding::new(
                "ghost",
                Control::button(4, ButtonType::A),
                EdgeSet::on_toggle(),
                shooter(1.0),
            ))
            .unwrap_err();
        assert!(matches!(err, BindingError::UnknownControl { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn invalid_pov_angle_is_unknown() {
        let mut table = BindingTable::create([MECH]);
        let err = table
            .register(Binding::new(
                "elevator",
                Control::pov(MECH, 30),
                EdgeSet::on_hold(),
                CommandAction::momentary(ActionTarget::Device(DeviceId::Elevator), 0.5, 0.0),
            ))
            .unwrap_err();
        assert!(matches!(err, BindingError::UnknownControl { .. }));
    }

    #[test]
    fn toggle_without_toggled_edge_is_rejected() {
        let mut table = BindingTable::create([MECH]);
        let err = table
            .register(Binding::new(
                "shooter",
                Control::button(MECH, ButtonType::X),
                EdgeSet::on_press(),
                shooter(1.0),
            ))
            .unwrap_err();
        assert!(matches!(err, BindingError::IncompatibleEdge { .. }));
    }

    #[test]
    fn duplicate_is_recorded_but_registered() {
        let mut table = BindingTable::create([MECH]);
        let control = Control::button(MECH, ButtonType::X);
        table
            .register(Binding::new("first", control, EdgeSet::on_toggle(), shooter(1.0)))
            .unwrap();
        table
            .register(Binding::new("second", control, EdgeSet::on_toggle(), shooter(0.5)))
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.conflicts(),
            &[BindingError::DuplicateBinding {
                label: "second".to_string(),
                existing: "first".to_string(),
                control,
            }]
        );
    }

    #[test]
    fn different_targets_do_not_conflict() {
        let mut table = BindingTable::create([MECH]);
        let control = Control::button(MECH, ButtonType::B);
        for (label, id) in [("intake", DeviceId::Intake), ("wheel", DeviceId::ElevatorWheel)] {
            table
                .register(Binding::new(
                    label,
                    control,
                    EdgeSet::on_hold(),
                    CommandAction::momentary(ActionTarget::Device(id), 0.5, 0.0),
                ))
                .unwrap();
        }
        assert!(table.conflicts().is_empty());
    }

    #[test]
    fn odd_presses_leave_toggle_on_even_leave_it_off() {
        for presses in 1..=6 {
            let (mut subsystems, logs, mut diagnostics) = fixture();
            let mut table = BindingTable::create([MECH]);
            table
                .register(Binding::new(
                    "shooter",
                    Control::button(MECH, ButtonType::X),
                    EdgeSet::on_toggle(),
                    shooter(1.0),
                ))
                .unwrap();
            let mut table = table.seal();

            for _ in 0..presses {
                table.evaluate(&press(ButtonType::X), &mut subsystems, &mut diagnostics);
                table.evaluate(&release(ButtonType::X), &mut subsystems, &mut diagnostics);
            }

            let expected = if presses % 2 == 1 { 1.0 } else { 0.0 };
            assert_eq!(logs[&DeviceId::Shooter].last(), Some(expected));
        }
    }

    #[test]
    fn tap_inside_one_tick_ends_at_off_value() {
        let (mut subsystems, logs, mut diagnostics) = fixture();
        let mut table = BindingTable::create([MECH]);
        table
            .register(Binding::new(
                "intake",
                Control::button(MECH, ButtonType::B),
                EdgeSet::on_hold(),
                CommandAction::momentary(ActionTarget::Device(DeviceId::Intake), 0.6, 0.0),
            ))
            .unwrap();
        let mut table = table.seal();

        let report = table.evaluate(&tap(ButtonType::B), &mut subsystems, &mut diagnostics);
        assert_eq!(report.fired, 2);
        assert_eq!(logs[&DeviceId::Intake].outputs(), vec![0.6, 0.0]);
        assert_eq!(subsystems.intake.last_output(), 0.0);
    }

    #[test]
    fn later_registration_wins_on_the_same_device() {
        let (mut subsystems, logs, mut diagnostics) = fixture();
        let mut table = BindingTable::create([MECH]);
        table
            .register(Binding::new(
                "low",
                Control::button(MECH, ButtonType::X),
                EdgeSet::on_press(),
                CommandAction::momentary(ActionTarget::Device(DeviceId::Shooter), 0.35, 0.0),
            ))
            .unwrap();
        table
            .register(Binding::new(
                "high",
                Control::button(MECH, ButtonType::A),
                EdgeSet::on_press(),
                CommandAction::momentary(ActionTarget::Device(DeviceId::Shooter), 0.8, 0.0),
            ))
            .unwrap();
        let mut table = table.seal();

        let both = snapshot(&[
            (
                ButtonType::A,
                ControlSample {
                    held: true,
                    pressed: true,
                    released: false,
                },
            ),
            (
                ButtonType::X,
                ControlSample {
                    held: true,
                    pressed: true,
                    released: false,
                },
            ),
        ]);
        table.evaluate(&both, &mut subsystems, &mut diagnostics);
        assert_eq!(logs[&DeviceId::Shooter].outputs(), vec![0.35, 0.8]);
        assert_eq!(subsystems.shooter.last_output(), 0.8);
    }

    #[test]
    fn failing_action_does_not_stop_evaluation() {
        let (mut subsystems, logs, mut diagnostics) = fixture();
        let mut table = BindingTable::create([MECH]);
        table
            .register(Binding::new(
                "broken",
                Control::button(MECH, ButtonType::B),
                EdgeSet::on_press(),
                CommandAction::momentary(ActionTarget::Device(DeviceId::Intake), 1.5, 0.0),
            ))
            .unwrap();
        table
            .register(Binding::new(
                "wheel",
                Control::button(MECH, ButtonType::B),
                EdgeSet::on_press(),
                CommandAction::momentary(ActionTarget::Device(DeviceId::ElevatorWheel), 0.4, 0.0),
            ))
            .unwrap();
        let mut table = table.seal();

        let report = table.evaluate(&press(ButtonType::B), &mut subsystems, &mut diagnostics);
        assert_eq!(report.fired, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(diagnostics.count("broken"), 1);
        assert!(logs[&DeviceId::Intake].outputs().is_empty());
        assert_eq!(logs[&DeviceId::ElevatorWheel].outputs(), vec![0.4]);
        assert_eq!(
            report.written,
            BTreeSet::from([DeviceId::ElevatorWheel])
        );
    }

    #[test]
    fn reset_toggles_restarts_from_inactive() {
        let (mut subsystems, logs, mut diagnostics) = fixture();
        let mut table = BindingTable::create([MECH]);
        table
            .register(Binding::new(
                "shooter",
                Control::button(MECH, ButtonType::X),
                EdgeSet::on_toggle(),
                shooter(1.0),
            ))
            .unwrap();
        let mut table = table.seal();

        table.evaluate(&press(ButtonType::X), &mut subsystems, &mut diagnostics);
        table.evaluate(&release(ButtonType::X), &mut subsystems, &mut diagnostics);
        assert!(table.bindings()[0].toggle_active());

        table.reset_toggles();
        table.evaluate(&press(ButtonType::X), &mut subsystems, &mut diagnostics);
        assert_eq!(logs[&DeviceId::Shooter].outputs(), vec![1.0, 1.0]);
    }

    #[test]
    fn drive_writes_are_reported() {
        let (mut subsystems, _logs, mut diagnostics) = fixture();
        let mut table = BindingTable::create([MECH]);
        table
            .register(Binding::new(
                "creep",
                Control::button(MECH, ButtonType::Start),
                EdgeSet::on_hold(),
                CommandAction::momentary(ActionTarget::Device(DeviceId::FrontLeftDrive), 0.2, 0.0),
            ))
            .unwrap();
        let mut table = table.seal();

        let report = table.evaluate(&press(ButtonType::Start), &mut subsystems, &mut diagnostics);
        assert!(report.wrote_drive());
        let report = table.evaluate(&InputSnapshot::default(), &mut subsystems, &mut diagnostics);
        assert!(!report.wrote_drive());
    }
}
