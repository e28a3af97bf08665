//! Alerts (§7) and the rate-limited log that guards against a flapping
//! source (e.g. a lossy event-bus subscriber, a repeatedly-failing
//! service) flooding the session's alert stream.

use crate::wire::AlertLevel;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct Alert {
    pub level: AlertLevel,
    pub source: String,
    pub text: String,
    pub node_id: Option<u32>,
}

impl Alert {
    pub fn new(level: AlertLevel, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            level,
            source: source.into(),
            text: text.into(),
            node_id: None,
        }
    }

    pub fn for_node(mut self, node_id: u32) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

/// Tracks the last emission time per source key so that a single noisy
/// source cannot exceed one alert per `min_interval`.
#[derive(Debug)]
pub struct AlertLog {
    min_interval: Duration,
    last_emitted: HashMap<String, Instant>,
    history: Vec<Alert>,
}

impl AlertLog {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emitted: HashMap::new(),
            history: Vec::new(),
        }
    }

    /// Default limiter used for lossy-subscriber alerts: at most once
    /// every 10 seconds per subscriber.
    pub fn for_lossy_subscribers() -> Self {
        Self::new(Duration::from_secs(10))
    }

    /// Record `alert` if the source hasn't emitted within `min_interval`;
    /// returns whether it was actually recorded (vs. suppressed).
    pub fn record(&mut self, alert: Alert, now: Instant) -> bool {
        if let Some(last) = self.last_emitted.get(&alert.source) {
            if now.duration_since(*last) < self.min_interval {
                return false;
            }
        }
        self.last_emitted.insert(alert.source.clone(), now);
        self.history.push(alert);
        true
    }

    pub fn history(&self) -> &[Alert] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppresses_repeat_alerts_within_window() {
        let mut log = AlertLog::new(Duration::from_secs(10));
        let start = Instant::now();
        assert!(log.record(Alert::new(AlertLevel::Warning, "sub-1", "dropped"), start));
        assert!(!log.record(
            Alert::new(AlertLevel::Warning, "sub-1", "dropped again"),
            start + Duration::from_secs(1)
        ));
        assert!(log.record(
            Alert::new(AlertLevel::Warning, "sub-1", "dropped"),
            start + Duration::from_secs(11)
        ));
        assert_eq!(log.history().len(), 2);
    }

    #[test]
    fn different_sources_are_independent() {
        let mut log = AlertLog::new(Duration::from_secs(10));
        let now = Instant::now();
        assert!(log.record(Alert::new(AlertLevel::Warning, "sub-1", "a"), now));
        assert!(log.record(Alert::new(AlertLevel::Warning, "sub-2", "b"), now));
    }
}
