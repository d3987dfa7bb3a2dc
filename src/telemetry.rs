//! Outbound sinks: dashboard, diagnostics and video
//!
//! The robot only ever writes to these. The default implementations log
//! through `tracing`; real transports plug in behind the same traits.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use tracing::{debug, error, info};

pub trait DashboardSink: Send {
    /// Publishes a named chooser with its options and default, once.
    fn publish_chooser(&mut self, name: &str, options: &[String], default: &str);

    fn put_number(&mut self, key: &str, value: f64);

    fn put_string(&mut self, key: &str, value: &str);
}

pub trait DiagnosticsSink: Send {
    fn report(&mut self, label: &str, error: &dyn Error);
}

pub trait VideoSink: Send {
    fn start_capture(&mut self, name: &str, device_index: u32);
}

/// Dashboard that logs and keeps the latest value per key.
#[derive(Debug, Default)]
pub struct TracingDashboard {
    numbers: BTreeMap<String, f64>,
    strings: BTreeMap<String, String>,
}

impl TracingDashboard {
    pub fn number(&self, key: &str) -> Option<f64> {
        self.numbers.get(key).copied()
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }
}

impl DashboardSink for TracingDashboard {
    fn publish_chooser(&mut self, name: &str, options: &[String], default: &str) {
        info!(
            "Chooser '{}' published: options {:?}, default '{}'",
            name, options, default
        );
        self.strings.insert(name.to_string(), default.to_string());
    }

    fn put_number(&mut self, key: &str, value: f64) {
        debug!("{} = {:.3}", key, value);
        self.numbers.insert(key.to_string(), value);
    }

    fn put_string(&mut self, key: &str, value: &str) {
        debug!("{} = {}", key, value);
        self.strings.insert(key.to_string(), value.to_string());
    }
}

/// Logs the first report per label with `error!`, repeats at debug level.
#[derive(Debug, Default)]
pub struct TracingDiagnostics {
    counts: HashMap<String, u64>,
}

impl TracingDiagnostics {
    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&mut self, label: &str, error: &dyn Error) {
        let count = self.counts.entry(label.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            error!("{}: {}", label, error);
        } else {
            debug!("{}: {} (repeated {} times)", label, error, count);
        }
    }
}

#[derive(Debug, Default)]
pub struct TracingVideo {
    captures: Vec<(String, u32)>,
}

impl TracingVideo {
    pub fn captures(&self) -> &[(String, u32)] {
        &self.captures
    }
}

impl VideoSink for TracingVideo {
    fn start_capture(&mut self, name: &str, device_index: u32) {
        info!("Starting capture '{}' from device {}", name, device_index);
        self.captures.push((name.to_string(), device_index));
    }
}

/// The sinks a robot writes to.
pub struct Sinks {
    pub dashboard: Box<dyn DashboardSink>,
    pub diagnostics: Box<dyn DiagnosticsSink>,
    pub video: Box<dyn VideoSink>,
}

impl Sinks {
    pub fn tracing() -> Self {
        Self {
            dashboard: Box::new(TracingDashboard::default()),
            diagnostics: Box::new(TracingDiagnostics::default()),
            video: Box::new(TracingVideo::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::{DeviceError, DeviceId};

    #[test]
    fn diagnostics_count_per_label() {
        let mut diagnostics = TracingDiagnostics::default();
        let err = DeviceError::InvalidOutput {
            device: DeviceId::Shooter,
            value: 2.0,
        };
        diagnostics.report("mech A", &err);
        diagnostics.report("mech A", &err);
        diagnostics.report("mech X", &err);

        assert_eq!(diagnostics.count("mech A"), 2);
        assert_eq!(diagnostics.count("mech X"), 1);
        assert_eq!(diagnostics.count("driver RB"), 0);
        assert_eq!(diagnostics.total(), 3);
    }

    #[test]
    fn dashboard_keeps_latest_values() {
        let mut dashboard = TracingDashboard::default();
        dashboard.put_number("shooter", 0.35);
        dashboard.put_number("shooter", 0.8);
        dashboard.put_string("mode", "teleop");
        dashboard.publish_chooser("Auto", &["Basic Auto".to_string()], "Basic Auto");

        assert_eq!(dashboard.number("shooter"), Some(0.8));
        assert_eq!(dashboard.string("mode"), Some("teleop"));
        assert_eq!(dashboard.string("Auto"), Some("Basic Auto"));
        assert_eq!(dashboard.number("elevator"), None);
    }
}
