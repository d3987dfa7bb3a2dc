//! Wiring of the two gamepads, the autonomous chooser and the cameras

use tracing::info;

use crate::autonomous::{AutoRoutine, AutoSelector};
use crate::bindings::{
    ActionTarget, Binding, BindingError, BindingTable, CommandAction, EdgeSet, Sealed,
};
use crate::config::RobotConfig;
use crate::controller::{ButtonType, Control};
use crate::subsystems::DeviceId;
use crate::telemetry::VideoSink;

pub const CAMERAS: [(&str, u32); 2] = [("Usb Camera 0", 0), ("Usb Camera 1", 1)];

pub fn configure_button_bindings(config: &RobotConfig) -> Result<BindingTable<Sealed>, BindingError> {
    let driver = config.controllers.driver_port;
    let mech = config.controllers.mech_port;
    let out = &config.outputs;

    let device = ActionTarget::Device;
    let hold = |id: DeviceId, value: f64| CommandAction::momentary(device(id), value, 0.0);

    let bindings = vec![
        // Half speed while the right bumper is held
        Binding::new(
            "driver RB half speed",
            Control::button(driver, ButtonType::RightBumper),
            EdgeSet::on_hold(),
            CommandAction::momentary(ActionTarget::DriveMaxOutput, out.half_speed_output, 1.0),
        ),
        // Intake height moves on release and keeps moving until the other bumper
        Binding::new(
            "mech LB extend intake",
            Control::button(mech, ButtonType::LeftBumper),
            EdgeSet::on_release(),
            hold(DeviceId::IntakeHeight, out.adjust_intake_output),
        ),
        Binding::new(
            "mech RB retract intake",
            Control::button(mech, ButtonType::RightBumper),
            EdgeSet::on_release(),
            hold(DeviceId::IntakeHeight, -out.adjust_intake_output),
        ),
        Binding::new(
            "mech X low shot",
            Control::button(mech, ButtonType::X),
            EdgeSet::on_toggle(),
            CommandAction::toggle(device(DeviceId::Shooter), out.low_shooter_output, 0.0),
        ),
        Binding::new(
            "mech A high shot",
            Control::button(mech, ButtonType::A),
            EdgeSet::on_toggle(),
            CommandAction::toggle(device(DeviceId::Shooter), out.high_shooter_output, 0.0),
        ),
        Binding::new(
            "mech B intake",
            Control::button(mech, ButtonType::B),
            EdgeSet::on_hold(),
            hold(DeviceId::Intake, out.intake_output),
        ),
        Binding::new(
            "mech B elevator wheel",
            Control::button(mech, ButtonType::B),
            EdgeSet::on_hold(),
            hold(DeviceId::ElevatorWheel, out.elevator_wheel_output),
        ),
        Binding::new(
            "mech Y spit out",
            Control::button(mech, ButtonType::Y),
            EdgeSet::on_hold(),
            hold(DeviceId::Intake, -out.intake_output),
        ),
        Binding::new(
            "mech Y elevator wheel out",
            Control::button(mech, ButtonType::Y),
            EdgeSet::on_hold(),
            hold(DeviceId::ElevatorWheel, -out.elevator_wheel_output),
        ),
        Binding::new(
            "mech POV elevator up",
            Control::pov(mech, config.dpad.up),
            EdgeSet::on_hold(),
            hold(DeviceId::Elevator, out.elevator_output),
        ),
        Binding::new(
            "mech POV elevator down",
            Control::pov(mech, config.dpad.down),
            EdgeSet::on_hold(),
            hold(DeviceId::Elevator, -out.elevator_output),
        ),
    ];

    let mut table = BindingTable::create(config.controllers.ports());
    for binding in bindings {
        table.register(binding)?;
    }
    Ok(table.seal())
}

pub fn configure_autonomous(config: &RobotConfig) -> AutoSelector {
    let mut selector = AutoSelector::new();
    selector.set_default_option("Basic Auto", AutoRoutine::basic(&config.outputs));
    selector.add_option("Do Nothing", AutoRoutine::idle());
    selector
}

pub fn start_cameras(video: &mut dyn VideoSink) {
    for (name, index) in CAMERAS {
        video.start_capture(name, index);
    }
    info!("Started {} camera captures", CAMERAS.len());
}
