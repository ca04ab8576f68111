//! Reporting hook for notable bridge and remote events

use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity attached to a reported event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Receives events such as end of game output or remote backoffs
pub trait Reporter: Send + Sync {
    fn report(&self, severity: Severity, message: &str);
}

/// Forwards reports to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
            Severity::Critical => tracing::error!(critical = true, "{}", message),
        }
    }
}

/// Keeps every report in memory, for tests and diagnostics
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn events(&self) -> Vec<(Severity, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events()
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, severity: Severity, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push((severity, message.to_string()));
        }
    }
}

/// Shared handle used by the bridge and the remote client
pub type SharedReporter = Arc<dyn Reporter>;

/// The default reporter, backed by `tracing`
pub fn tracing_reporter() -> SharedReporter {
    Arc::new(TracingReporter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter() {
        let reporter = RecordingReporter::new();
        let shared: SharedReporter = Arc::new(reporter.clone());

        shared.report(Severity::Warning, "rate limited");
        shared.report(Severity::Critical, "boom");
        shared.report(Severity::Warning, "network");

        assert_eq!(reporter.count(Severity::Warning), 2);
        assert_eq!(reporter.count(Severity::Critical), 1);
        assert_eq!(reporter.events()[1], (Severity::Critical, "boom".to_string()));
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Info < Severity::Warning);
        assert_eq!(Severity::Critical.to_string(), "critical");
    }
}
