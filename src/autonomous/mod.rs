//! Autonomous routine chooser
//!
//! The selector is filled once at startup, published to the dashboard, and
//! read once when autonomous starts.

pub mod routine;

pub use routine::{AutoRoutine, AutoRun, AutoStep, DriveCommand};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::telemetry::DashboardSink;

pub const CHOOSER_NAME: &str = "Auto Mode";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectorError {
    #[error("Unknown autonomous option: {0}")]
    UnknownOption(String),
}

#[derive(Debug, Default)]
pub struct AutoSelector {
    // Insertion order is display order
    options: Vec<(String, AutoRoutine)>,
    default: Option<String>,
    selected: Option<String>,
}

impl AutoSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option and makes it the default.
    pub fn set_default_option(&mut self, name: impl Into<String>, routine: AutoRoutine) {
        let name = name.into();
        if let Some(previous) = &self.default {
            warn!("Replacing default autonomous option '{}' with '{}'", previous, name);
        }
        self.add_option(name.clone(), routine);
        self.default = Some(name);
    }

    /// Adds an option; a name already present is replaced in place.
    pub fn add_option(&mut self, name: impl Into<String>, routine: AutoRoutine) {
        let name = name.into();
        match self.options.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = routine,
            None => {
                debug!("Adding autonomous option '{}'", name);
                self.options.push((name, routine));
            }
        }
    }

    pub fn select(&mut self, name: &str) -> Result<(), SelectorError> {
        if !self.options.iter().any(|(existing, _)| existing == name) {
            return Err(SelectorError::UnknownOption(name.to_string()));
        }
        info!("Autonomous option '{}' selected", name);
        self.selected = Some(name.to_string());
        Ok(())
    }

    /// The selected routine, else the default.
    pub fn selected(&self) -> Option<&AutoRoutine> {
        let name = self.selected.as_ref().or(self.default.as_ref())?;
        self.options
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, routine)| routine)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn option_names(&self) -> Vec<String> {
        self.options.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn publish(&self, dashboard: &mut dyn DashboardSink) {
        dashboard.publish_chooser(
            CHOOSER_NAME,
            &self.option_names(),
            self.default_name().unwrap_or(""),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputsConfig;
    use crate::telemetry::TracingDashboard;

    fn selector() -> AutoSelector {
        let mut selector = AutoSelector::new();
        selector.set_default_option("Basic Auto", AutoRoutine::basic(&OutputsConfig::default()));
        selector.add_option("Do Nothing", AutoRoutine::idle());
        selector
    }

    #[test]
    fn default_is_used_until_something_is_selected() {
        let mut selector = selector();
        assert_eq!(selector.selected().map(AutoRoutine::name), Some("Basic Auto"));

        selector.select("Do Nothing").unwrap();
        assert_eq!(selector.selected().map(AutoRoutine::name), Some("Do Nothing"));
    }

    #[test]
    fn unknown_option_keeps_the_selection() {
        let mut selector = selector();
        assert_eq!(
            selector.select("Five Ball"),
            Err(SelectorError::UnknownOption("Five Ball".to_string()))
        );
        assert_eq!(selector.selected().map(AutoRoutine::name), Some("Basic Auto"));
    }

    #[test]
    fn empty_selector_has_nothing_selected() {
        assert!(AutoSelector::new().selected().is_none());
    }

    #[test]
    fn publish_lists_options_in_order() {
        let mut dashboard = TracingDashboard::default();
        let selector = selector();
        selector.publish(&mut dashboard);

        assert_eq!(selector.option_names(), vec!["Basic Auto", "Do Nothing"]);
        assert_eq!(dashboard.string(CHOOSER_NAME), Some("Basic Auto"));
    }
}
