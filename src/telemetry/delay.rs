//! Per-command latency bucketing.
//!
//! Each command gets a [`DelayTracker`] with seven fixed bands. The
//! supervisor flushes all trackers periodically and resets them, so memory
//! stays bounded by the number of distinct command names.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often accumulated measures are flushed.
pub const TELEMETRY_REPORTING_DELAY: Duration = Duration::from_secs(2 * 60);

const IMMEDIATE_DELAY_MAX_MS: u64 = 25;
const NEAR_IMMEDIATE_DELAY_MAX_MS: u64 = 50;
const SHORT_DELAY_MAX_MS: u64 = 250;
const MEDIUM_DELAY_MAX_MS: u64 = 500;
const IDLE_DELAY_MAX_MS: u64 = 1500;
const NON_FOCUS_DELAY_MAX_MS: u64 = 3000;

/// Bucket counts for one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayMeasures {
    /// 0..=25 ms
    pub immediate_delay: u64,
    /// 26..=50 ms
    pub near_immediate_delay: u64,
    /// 51..=250 ms
    pub short_delay: u64,
    /// 251..=500 ms
    pub medium_delay: u64,
    /// 501..=1500 ms
    pub idle_delay: u64,
    /// 1501..=3000 ms
    pub non_focus_delay: u64,
    /// over 3000 ms
    pub big_delay: u64,
}

impl DelayMeasures {
    /// Bucket values in band order.
    #[must_use]
    pub fn as_array(&self) -> [u64; 7] {
        [
            self.immediate_delay,
            self.near_immediate_delay,
            self.short_delay,
            self.medium_delay,
            self.idle_delay,
            self.non_focus_delay,
            self.big_delay,
        ]
    }
}

/// Latency histogram for a single command.
#[derive(Debug, Clone, Default)]
pub struct DelayTracker {
    name: String,
    measures: DelayMeasures,
}

impl DelayTracker {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measures: DelayMeasures::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Count one round trip of `elapsed_ms` milliseconds.
    pub fn report_delay(&mut self, elapsed_ms: u64) {
        let m = &mut self.measures;
        let bucket = if elapsed_ms <= IMMEDIATE_DELAY_MAX_MS {
            &mut m.immediate_delay
        } else if elapsed_ms <= NEAR_IMMEDIATE_DELAY_MAX_MS {
            &mut m.near_immediate_delay
        } else if elapsed_ms <= SHORT_DELAY_MAX_MS {
            &mut m.short_delay
        } else if elapsed_ms <= MEDIUM_DELAY_MAX_MS {
            &mut m.medium_delay
        } else if elapsed_ms <= IDLE_DELAY_MAX_MS {
            &mut m.idle_delay
        } else if elapsed_ms <= NON_FOCUS_DELAY_MAX_MS {
            &mut m.non_focus_delay
        } else {
            &mut m.big_delay
        };
        *bucket = bucket.saturating_add(1);
    }

    #[must_use]
    pub fn has_measures(&self) -> bool {
        self.measures.as_array().iter().any(|&count| count > 0)
    }

    #[must_use]
    pub fn measures(&self) -> DelayMeasures {
        self.measures
    }

    pub fn clear_measures(&mut self) {
        self.measures = DelayMeasures::default();
    }
}

/// One flushed telemetry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryReport {
    /// `"omnisharp"` followed by the command name.
    pub event_name: String,
    pub measures: DelayMeasures,
}

/// Trackers for every command seen since the server started.
#[derive(Debug, Default)]
pub struct DelayTrackers {
    trackers: BTreeMap<String, DelayTracker>,
}

impl DelayTrackers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request.
    pub fn record(&mut self, command: &str, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.trackers
            .entry(command.to_string())
            .or_insert_with(|| DelayTracker::new(command))
            .report_delay(elapsed_ms);
    }

    #[must_use]
    pub fn get(&self, command: &str) -> Option<&DelayTracker> {
        self.trackers.get(command)
    }

    /// Collect reports for every tracker with measures and reset them.
    pub fn flush(&mut self) -> Vec<TelemetryReport> {
        self.trackers
            .values_mut()
            .filter(|tracker| tracker.has_measures())
            .map(|tracker| {
                let report = TelemetryReport {
                    event_name: format!("omnisharp{}", tracker.name()),
                    measures: tracker.measures(),
                };
                tracker.clear_measures();
                report
            })
            .collect()
    }

    /// Forget every tracker.
    pub fn reset(&mut self) {
        self.trackers.clear();
    }
}
