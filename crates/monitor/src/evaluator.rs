//! Threshold evaluation: a pure function from (reading, thresholds, time) to
//! alerts.

use serde::Serialize;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::reading::{Metric, Reading};
use crate::thresholds::{Side, ThresholdSet};

/// A single threshold breach.  Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub metric: Metric,
    pub level: Side,
    pub message: String,
    /// Local wall-clock time of the evaluation, `HH:MM:SS`.
    pub time: String,
}

/// Compare `reading` against every configured threshold.
///
/// Per metric at most one alert is produced: above `high` wins, otherwise
/// below `low`.  Metrics without bounds are skipped.  Output order follows
/// [`Metric`] order.
pub fn evaluate(reading: &Reading, thresholds: &ThresholdSet, at: OffsetDateTime) -> Vec<Alert> {
    let time = clock_time(at);
    let mut alerts = Vec::new();

    for (&metric, bounds) in thresholds {
        let value = reading.get(metric);
        let unit = metric.unit();

        let (level, message) = if value > bounds.high as f64 {
            (
                Side::High,
                format!(
                    "High {} Alert: {value}{unit} exceeds threshold of {}{unit}",
                    metric.label(),
                    bounds.high
                ),
            )
        } else if value < bounds.low as f64 {
            (
                Side::Low,
                format!(
                    "Low {} Alert: {value}{unit} below threshold of {}{unit}",
                    metric.label(),
                    bounds.low
                ),
            )
        } else {
            continue;
        };

        alerts.push(Alert {
            metric,
            level,
            message,
            time: time.clone(),
        });
    }

    alerts
}

/// Current time in the local offset, or UTC when the local offset cannot be
/// determined (common inside multi-threaded processes).
pub fn local_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    match UtcOffset::current_local_offset() {
        Ok(offset) => now.to_offset(offset),
        Err(_) => now,
    }
}

fn clock_time(at: OffsetDateTime) -> String {
    let fmt = format_description!("[hour]:[minute]:[second]");
    at.format(&fmt).unwrap_or_else(|_| {
        format!("{:02}:{:02}:{:02}", at.hour(), at.minute(), at.second())
    })
}

// ===========================================================================
// Tests
// ===========================================================================
