//! Per-controller counters and last-error snapshot (§4.3), updated only
//! by the [`crate::dispatcher::Dispatcher`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use radiod_common::ErrorKind;

#[derive(Debug, Default)]
struct Inner {
    commands_sent: u64,
    commands_failed: u64,
    last_error_string: Option<String>,
    last_error_age: Option<Duration>,
    errors_by_kind: HashMap<ErrorKind, u64>,
}

pub struct Metrics {
    inner: Mutex<Inner>,
    created_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            created_at: Instant::now(),
        }
    }

    pub fn record_success(&self) {
        self.inner.lock().commands_sent += 1;
    }

    pub fn record_failure(&self, kind: ErrorKind, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.commands_sent += 1;
        inner.commands_failed += 1;
        inner.last_error_string = Some(message.into());
        inner.last_error_age = Some(self.created_at.elapsed());
        *inner.errors_by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let succeeded = inner.commands_sent - inner.commands_failed;

        MetricsSnapshot {
            commands_sent: inner.commands_sent,
            commands_failed: inner.commands_failed,
            commands_succeeded: succeeded,
            success_rate: if inner.commands_sent == 0 {
                1.0
            } else {
                succeeded as f64 / inner.commands_sent as f64
            },
            last_error_string: inner.last_error_string.clone(),
            last_error_age: inner.last_error_age,
            errors_by_kind: inner.errors_by_kind.clone(),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}

/// An immutable snapshot returned by `get_metrics`.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub commands_sent: u64,
    pub commands_failed: u64,
    pub commands_succeeded: u64,
    pub success_rate: f64,
    pub last_error_string: Option<String>,
    pub last_error_age: Option<Duration>,
    pub errors_by_kind: HashMap<ErrorKind, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_holds_across_success_and_failure() {
        let metrics = Metrics::new();
        metrics.record_success();
        metrics.record_success();
        metrics.record_failure(ErrorKind::Command, "boom");

        let snap = metrics.snapshot();
        assert_eq!(snap.commands_succeeded + snap.commands_failed, snap.commands_sent);
        assert_eq!(snap.commands_sent, 3);
        assert_eq!(snap.commands_failed, 1);
        assert_eq!(snap.last_error_string.as_deref(), Some("boom"));
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = Metrics::new();
        metrics.record_success();
        metrics.record_failure(ErrorKind::Timeout, "timed out");
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.commands_sent, 0);
        assert_eq!(snap.commands_failed, 0);
        assert!(snap.last_error_string.is_none());
    }
}
