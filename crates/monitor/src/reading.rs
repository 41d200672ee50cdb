//! Sensor snapshot types shared by the feed, evaluator and API.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// One of the four environmental metrics.
///
/// Declaration order is the evaluation order: alerts raised in the same cycle
/// always come out temperature, humidity, soil moisture, rainfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Temperature,
    Humidity,
    SoilMoisture,
    Rainfall,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::SoilMoisture,
        Metric::Rainfall,
    ];

    /// Key used in persisted settings and JSON (`soilMoisture`, ...).
    pub fn key(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::SoilMoisture => "soilMoisture",
            Metric::Rainfall => "rainfall",
        }
    }

    /// Human-readable label used in alert messages.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::SoilMoisture => "Soil Moisture",
            Metric::Rainfall => "Rainfall",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity | Metric::SoilMoisture => "%",
            Metric::Rainfall => "mm",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One sampled or synthesized sensor snapshot.  Replaced wholesale by the
/// next reading, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub rainfall: f64,
}

impl Reading {
    /// What the dashboard shows before the first successful poll.
    pub const SEED: Reading = Reading {
        temperature: 29.0,
        humidity: 78.0,
        soil_moisture: 59.0,
        rainfall: 50.0,
    };

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::SoilMoisture => self.soil_moisture,
            Metric::Rainfall => self.rainfall,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Temperature => self.temperature = value,
            Metric::Humidity => self.humidity = value,
            Metric::SoilMoisture => self.soil_moisture = value,
            Metric::Rainfall => self.rainfall = value,
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::SEED
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_keys_round_trip() {
        for m in Metric::ALL {
            assert_eq!(Metric::from_key(m.key()), Some(m));
        }
        assert_eq!(Metric::from_key("pressure"), None);
    }

    #[test]
    fn metric_order_is_evaluation_order() {
        let mut sorted = Metric::ALL;
        sorted.sort();
        assert_eq!(sorted, Metric::ALL);
    }

    #[test]
    fn metric_serializes_camel_case() {
        let json = serde_json::to_string(&Metric::SoilMoisture).unwrap();
        assert_eq!(json, r#""soilMoisture""#);
    }

    #[test]
    fn reading_get_and_set() {
        let mut r = Reading::SEED;
        r.set(Metric::Rainfall, 12.5);
        assert_eq!(r.get(Metric::Rainfall), 12.5);
        assert_eq!(r.get(Metric::Temperature), 29.0);
    }

    #[test]
    fn reading_json_uses_camel_case() {
        let json = serde_json::to_value(Reading::SEED).unwrap();
        assert_eq!(json["soilMoisture"], 59.0);
        assert_eq!(json.as_object().unwrap().len(), 4);
    }
}
