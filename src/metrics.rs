use metrics::{counter, gauge, histogram};

use crate::models::Mood;

/// Metrics collection and management.
///
/// Thin facade over the `metrics` macros; without an installed recorder
/// every call is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    // Entry lifecycle metrics
    pub entries_saved_total: &'static str,
    pub reflections_saved_total: &'static str,
    pub entries_unlocked: &'static str,
    pub entries_locked: &'static str,
    pub newly_unlocked_total: &'static str,

    // Input and access metrics
    pub validation_failures_total: &'static str,
    pub authorization_refused_total: &'static str,

    // Collaborator metrics
    pub storage_errors_total: &'static str,
    pub audio_captured_bytes: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            entries_saved_total: "echoverse_entries_saved_total",
            reflections_saved_total: "echoverse_reflections_saved_total",
            entries_unlocked: "echoverse_entries_unlocked",
            entries_locked: "echoverse_entries_locked",
            newly_unlocked_total: "echoverse_newly_unlocked_total",

            validation_failures_total: "echoverse_validation_failures_total",
            authorization_refused_total: "echoverse_authorization_refused_total",

            storage_errors_total: "echoverse_storage_errors_total",
            audio_captured_bytes: "echoverse_audio_captured_bytes",
        }
    }
}

impl MetricsCollector {
    /// Record a saved entry
    pub fn record_entry_saved(&self, mood: Mood) {
        counter!(self.entries_saved_total, "mood" => mood.label()).increment(1);
    }

    /// Record a saved reflection
    pub fn record_reflection_saved(&self) {
        counter!(self.reflections_saved_total).increment(1);
    }

    /// Record the outcome of an unlock evaluation pass
    pub fn record_unlock_evaluation(&self, unlocked: usize, locked: usize) {
        gauge!(self.entries_unlocked).set(unlocked as f64);
        gauge!(self.entries_locked).set(locked as f64);
    }

    /// Record entries surfaced in the newly-unlocked notification
    pub fn record_newly_unlocked(&self, count: usize) {
        counter!(self.newly_unlocked_total).increment(count as u64);
    }

    /// Record a rejected draft
    pub fn record_validation_failure(&self, field: &'static str) {
        counter!(self.validation_failures_total, "field" => field).increment(1);
    }

    /// Record an access refused because the caller does not own the entry
    pub fn record_authorization_refused(&self) {
        counter!(self.authorization_refused_total).increment(1);
    }

    /// Record a failed store read or write
    pub fn record_storage_error(&self, operation: &'static str) {
        counter!(self.storage_errors_total, "operation" => operation).increment(1);
    }

    /// Record the size of a finished capture
    pub fn record_audio_captured(&self, bytes: usize) {
        histogram!(self.audio_captured_bytes).record(bytes as f64);
    }
}
