//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Monotonic counters
//! - Run-level scopes
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes an outcome
//! 2. No background threads
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use progression::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::StudentPromoted, &[("student_id", &id)]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, ProgressionMetrics};
pub use scope::ObservationScope;

/// Severity an event is logged at when no explicit level is chosen.
pub fn default_severity(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_degraded() {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Log an event at its default severity
pub fn log_event(event: Event) {
    Logger::log(default_severity(event), event.as_str(), &[]);
}

/// Log an event with fields at its default severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(default_severity(event), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severity() {
        assert_eq!(default_severity(Event::StoreCorruption), Severity::Fatal);
        assert_eq!(default_severity(Event::LevelFallbackUsed), Severity::Warn);
        assert_eq!(default_severity(Event::StudentPromoted), Severity::Info);
    }

    #[test]
    fn test_log_event() {
        log_event(Event::ConfigLoaded);
        log_event_with_fields(Event::RevertNoMatch, &[("tenant_id", "t-1")]);
    }
}
