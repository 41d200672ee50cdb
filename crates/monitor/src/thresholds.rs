//! Per-metric alert bounds and their persisted store.
//!
//! Bounds are persisted as integer strings under
//! `threshold.<metric>.<high|low>`.  Anything that fails to parse falls back
//! to the hardcoded default; those fallbacks are collected in a
//! [`LoadReport`] so the caller can log them.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::Db;
use crate::reading::Metric;

/// Key prefix shared by every persisted threshold.
pub const KEY_PREFIX: &str = "threshold.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub high: i64,
    pub low: i64,
}

/// Which side of a [`Bounds`] a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    High,
    Low,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::High => "high",
            Side::Low => "low",
        }
    }
}

/// Metric → bounds.  A `BTreeMap` keyed on [`Metric`] iterates in evaluation
/// order.
pub type ThresholdSet = BTreeMap<Metric, Bounds>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsPatch {
    #[serde(default)]
    pub high: Option<i64>,
    #[serde(default)]
    pub low: Option<i64>,
}

/// Partial update: only the listed metrics and sides change.
pub type ThresholdPatch = BTreeMap<Metric, BoundsPatch>;

/// Persisted key for one side of one metric.
pub fn setting_key(metric: Metric, side: Side) -> String {
    format!("{KEY_PREFIX}{}.{}", metric.key(), side.as_str())
}

/// Hardcoded bounds.  Rainfall has none.
pub fn default_thresholds() -> ThresholdSet {
    BTreeMap::from([
        (Metric::Temperature, Bounds { high: 35, low: 15 }),
        (Metric::Humidity, Bounds { high: 90, low: 30 }),
        (Metric::SoilMoisture, Bounds { high: 70, low: 30 }),
    ])
}

/// A persisted value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fallback {
    pub key: String,
    pub raw: String,
    pub default: i64,
}

/// What happened while loading thresholds from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Keys whose persisted value was used.
    pub overridden: Vec<String>,
    /// Keys whose persisted value was unparseable.
    pub fallbacks: Vec<Fallback>,
}

impl LoadReport {
    /// At least one persisted value was unusable.
    pub fn has_fallbacks(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdStore {
    current: ThresholdSet,
}

impl Default for ThresholdStore {
    fn default() -> Self {
        Self {
            current: default_thresholds(),
        }
    }
}

impl ThresholdStore {
    pub fn new(current: ThresholdSet) -> Self {
        Self { current }
    }

    pub fn get(&self) -> &ThresholdSet {
        &self.current
    }

    /// Merge a partial update into the current set.
    ///
    /// A metric that has no bounds yet only accepts a patch carrying both
    /// sides; anything less is dropped.
    pub fn set(&mut self, patch: &ThresholdPatch) {
        for (&metric, p) in patch {
            match self.current.get_mut(&metric) {
                Some(bounds) => {
                    if let Some(high) = p.high {
                        bounds.high = high;
                    }
                    if let Some(low) = p.low {
                        bounds.low = low;
                    }
                }
                None => match (p.high, p.low) {
                    (Some(high), Some(low)) => {
                        self.current.insert(metric, Bounds { high, low });
                    }
                    _ => {
                        warn!(
                            %metric,
                            "threshold patch for unconfigured metric needs both sides, ignored"
                        );
                    }
                },
            }
        }
    }

    /// Build the store from persisted settings layered over the defaults.
    pub fn from_settings(persisted: &BTreeMap<String, String>) -> (Self, LoadReport) {
        let defaults = default_thresholds();
        let mut current = ThresholdSet::new();
        let mut report = LoadReport::default();

        for metric in Metric::ALL {
            let high_key = setting_key(metric, Side::High);
            let low_key = setting_key(metric, Side::Low);

            match defaults.get(&metric) {
                Some(d) => {
                    let high = resolve(persisted, &high_key, d.high, &mut report);
                    let low = resolve(persisted, &low_key, d.low, &mut report);
                    current.insert(metric, Bounds { high, low });
                }
                None => {
                    // No default: only configured if both sides are stored
                    // and usable.
                    let high = persisted.get(&high_key).and_then(|v| parse_bound(v));
                    let low = persisted.get(&low_key).and_then(|v| parse_bound(v));
                    if let (Some(high), Some(low)) = (high, low) {
                        report.overridden.push(high_key);
                        report.overridden.push(low_key);
                        current.insert(metric, Bounds { high, low });
                    }
                }
            }
        }

        (Self { current }, report)
    }

    /// Load from the settings table.
    pub async fn load(db: &Db) -> Result<(Self, LoadReport)> {
        let persisted: BTreeMap<String, String> =
            db.settings_with_prefix(KEY_PREFIX).await?.into_iter().collect();
        let (store, report) = Self::from_settings(&persisted);

        for f in &report.fallbacks {
            warn!(
                key = %f.key,
                raw = %f.raw,
                default = f.default,
                "unparseable persisted threshold, using default"
            );
        }

        Ok((store, report))
    }

    /// Persist every configured bound in one transaction.
    pub async fn save(&self, db: &Db) -> Result<()> {
        let pairs: Vec<(String, String)> = self
            .current
            .iter()
            .flat_map(|(&metric, bounds)| {
                [
                    (setting_key(metric, Side::High), bounds.high.to_string()),
                    (setting_key(metric, Side::Low), bounds.low.to_string()),
                ]
            })
            .collect();
        db.set_settings(&pairs).await
    }

    /// Back to defaults, forgetting every persisted threshold.
    pub async fn reset(&mut self, db: &Db) -> Result<()> {
        db.remove_with_prefix(KEY_PREFIX).await?;
        self.current = default_thresholds();
        Ok(())
    }
}

fn parse_bound(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn resolve(
    persisted: &BTreeMap<String, String>,
    key: &str,
    default: i64,
    report: &mut LoadReport,
) -> i64 {
    let Some(raw) = persisted.get(key) else {
        return default;
    };
    match parse_bound(raw) {
        Some(v) => {
            report.overridden.push(key.to_string());
            v
        }
        None => {
            report.fallbacks.push(Fallback {
                key: key.to_string(),
                raw: raw.clone(),
                default,
            });
            default
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
