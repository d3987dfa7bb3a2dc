//! Which mode the robot is in at a given time since startup

use std::time::Duration;

use super::RobotMode;
use crate::config::{ScheduleConfig, ScheduleMode};

#[derive(Clone, Debug, PartialEq)]
pub struct MatchSchedule {
    mode: ScheduleMode,
    autonomous: Duration,
    teleop: Duration,
}

impl MatchSchedule {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            mode: config.mode,
            autonomous: period(config.autonomous_secs),
            teleop: period(config.teleop_secs),
        }
    }

    fn match_end(&self) -> Duration {
        self.autonomous.saturating_add(self.teleop)
    }

    pub fn mode_at(&self, elapsed: Duration) -> RobotMode {
        match self.mode {
            ScheduleMode::Autonomous => RobotMode::Autonomous,
            ScheduleMode::Teleop => RobotMode::Teleop,
            ScheduleMode::Disabled => RobotMode::Disabled,
            ScheduleMode::Match => {
                if elapsed < self.autonomous {
                    RobotMode::Autonomous
                } else if elapsed < self.match_end() {
                    RobotMode::Teleop
                } else {
                    RobotMode::Disabled
                }
            }
        }
    }

    /// Whether nothing more will happen after `elapsed`.
    pub fn is_over(&self, elapsed: Duration) -> bool {
        self.mode == ScheduleMode::Match && elapsed >= self.match_end()
    }
}

// Negative and NaN collapse to zero, too large saturates
fn period(secs: f64) -> Duration {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
