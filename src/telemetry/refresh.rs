use std::time::SystemTime;

use tracing::{Level, event};
use uuid::Uuid;

/// Correlates the log lines of one refresh attempt.
#[derive(Clone, Debug)]
pub(crate) struct RefreshTelemetry {
    attempt_id: Uuid,
    context: String,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn emit_start(&self, at: SystemTime) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = ?at,
            "refresh.start"
        );
    }

    pub fn emit_success(&self, at: SystemTime) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = ?at,
            "refresh.success"
        );
    }

    pub fn emit_failure(&self, reason: &str, at: SystemTime) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = ?at,
            reason = %reason,
            "refresh.failure"
        );
    }
}
