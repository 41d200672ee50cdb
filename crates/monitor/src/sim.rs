//! Stateful environment simulator for local development.
//!
//! Each metric follows a bounded random walk from the previous reading:
//! - Mean reversion toward a per-metric centre
//! - Scenario drift (e.g. drying soil, warming air)
//! - Occasional spikes (sensor flakiness)
//! - Hard clamp to the physically possible range

use std::fmt;

use serde::Deserialize;

use crate::reading::{Metric, Reading};

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Pre-configured simulation profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Hovers near the seed values.  Low noise, rare spikes.  Good for
    /// exercising the API without tripping alerts.
    #[default]
    Stable,
    /// Soil dries out and the air warms up.  Trips the soil-moisture low and
    /// temperature high alerts within a few minutes.
    Drying,
    /// Large steps and ~10% spike rate.  Alerts flap.
    Flaky,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "drying" => Self::Drying,
            "flaky" => Self::Flaky,
            _ => Self::Stable, // default
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Drying => write!(f, "drying"),
            Self::Flaky => write!(f, "flaky"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-metric walk parameters
// ---------------------------------------------------------------------------

struct Walk {
    metric: Metric,
    min: f64,
    max: f64,
    center: f64,
    /// Added every step (positive = upward).
    drift: f64,
    sigma: f64,
}

/// Physical range of each metric.
pub fn metric_range(metric: Metric) -> (f64, f64) {
    match metric {
        Metric::Temperature => (0.0, 50.0),
        Metric::Humidity | Metric::SoilMoisture => (0.0, 100.0),
        Metric::Rainfall => (0.0, 300.0),
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Produces a new [`Reading`] per step, each derived from the last.
pub struct Simulator {
    current: Reading,
    walks: Vec<Walk>,
    mean_reversion: f64,
    spike_prob: f64,
    spike_scale: f64,
}

impl Simulator {
    pub fn new(scenario: Scenario, seed: Reading) -> Self {
        let (sigma_scale, mean_reversion, spike_prob, spike_scale) = match scenario {
            Scenario::Stable => (1.0, 0.05, 0.005, 4.0),
            Scenario::Drying => (1.0, 0.01, 0.02, 4.0),
            Scenario::Flaky => (3.0, 0.02, 0.10, 8.0),
        };

        let drift = |metric: Metric| match (scenario, metric) {
            (Scenario::Drying, Metric::SoilMoisture) => -0.6,
            (Scenario::Drying, Metric::Temperature) => 0.15,
            (Scenario::Drying, Metric::Humidity) => -0.2,
            (Scenario::Drying, Metric::Rainfall) => -0.5,
            _ => 0.0,
        };

        let base_sigma = |metric: Metric| match metric {
            Metric::Temperature => 0.3,
            Metric::Humidity => 0.8,
            Metric::SoilMoisture => 0.5,
            Metric::Rainfall => 1.5,
        };

        let walks = Metric::ALL
            .into_iter()
            .map(|metric| {
                let (min, max) = metric_range(metric);
                Walk {
                    metric,
                    min,
                    max,
                    center: seed.get(metric).clamp(min, max),
                    drift: drift(metric),
                    sigma: base_sigma(metric) * sigma_scale,
                }
            })
            .collect();

        Self {
            current: seed,
            walks,
            mean_reversion,
            spike_prob,
            spike_scale,
        }
    }

    /// The last reading produced (or the seed before the first step).
    pub fn current(&self) -> Reading {
        self.current
    }

    /// Advance one step and return the new reading.
    pub fn step(&mut self) -> Reading {
        let mut next = self.current;

        for w in &self.walks {
            let prev = self.current.get(w.metric);

            let pull = self.mean_reversion * (w.center - prev);
            let walk = gaussian(0.0, w.sigma);
            let spike = if fastrand::f64() < self.spike_prob {
                gaussian(0.0, w.sigma * self.spike_scale)
            } else {
                0.0
            };

            let value = (prev + w.drift + pull + walk + spike).clamp(w.min, w.max);
            // One decimal place, like a real sensor readout.
            next.set(w.metric, (value * 10.0).round() / 10.0);
        }

        self.current = next;
        next
    }
}

// ===========================================================================
// Tests
// ===========================================================================
