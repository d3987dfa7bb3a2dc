use color_eyre::{eyre::eyre, Result};
use robot_container::config::RobotConfig;
use robot_container::controller::{ControllerHandle, ControllerSettings, InputSnapshot};
use robot_container::robot::{MatchSchedule, Robot};
use robot_container::subsystems::Subsystems;
use robot_container::telemetry::Sinks;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = RobotConfig::load()?;
    let cancel = CancellationToken::new();

    let controller_settings = ControllerSettings {
        joystick_deadzone: config.controllers.joystick_deadzone,
        slots: config.controllers.ports(),
        ..ControllerSettings::default()
    };
    // Without gamepads the robot still runs autonomous and idles in teleop
    let mut controllers = match ControllerHandle::spawn(Some(controller_settings), cancel.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Running without controllers: {}", e);
            None
        }
    };

    let subsystems = Subsystems::from_config(&config.devices)
        .map_err(|e| eyre!("Failed to initialize subsystems: {}", e))?;
    let schedule = MatchSchedule::from_config(&config.schedule);
    let mut robot = Robot::new(config, subsystems, Sinks::tracing())
        .map_err(|e| eyre!("Failed to configure bindings: {}", e))?;

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        ctrl_c_cancel.cancel();
    });

    let mut ticker = interval(robot.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut last_tick = started;

    info!("Entering control loop");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        let elapsed = now.duration_since(started);
        let dt = now.duration_since(last_tick);
        last_tick = now;
        robot.set_mode(schedule.mode_at(elapsed));

        let snapshot = match controllers.as_mut() {
            Some(handle) => match handle.poll() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!("Controller input failed, continuing without it: {}", e);
                    controllers = None;
                    InputSnapshot::default()
                }
            },
            None => InputSnapshot::default(),
        };
        robot.tick_for(&snapshot, dt);

        if schedule.is_over(elapsed) {
            info!("Match over");
            break;
        }
    }

    robot.disable();
    cancel.cancel();
    if let Some(mut handle) = controllers {
        handle.shutdown();
    }
    info!("Robot stopped");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
