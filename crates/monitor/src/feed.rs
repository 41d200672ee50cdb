//! Sensor feed adapters: where each poll cycle's [`Reading`] comes from.
//!
//! [`HttpFeed`] performs one GET per cycle against the sensor endpoint;
//! [`SimFeed`] synthesizes the next reading locally.  Failures are reported
//! as [`FeedError`] and the poller simply skips the cycle.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reading::Reading;
use crate::sim::{Scenario, Simulator};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Transport failure (connect, DNS, timeout, ...).
    #[error("sensor request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The sensor endpoint answered with a non-2xx status.
    #[error("sensor endpoint returned HTTP {0}")]
    Status(u16),

    /// Body was not the expected JSON shape.
    #[error("malformed sensor payload: {0}")]
    Malformed(String),

    /// The endpoint is up but reports no sensor attached.
    #[error("sensor reports disconnected")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A source of readings, polled once per tick.
pub trait SensorFeed: Send {
    fn next_reading(&mut self) -> impl Future<Output = Result<Reading, FeedError>> + Send;
}

// ---------------------------------------------------------------------------
// HTTP feed
// ---------------------------------------------------------------------------

/// How the endpoint encodes soil moisture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilMoistureScale {
    /// Already a 0-100 percentage.
    #[default]
    Percent,
    /// Raw 10-bit ADC count; 1023 is bone dry, 0 is saturated.
    Adc10,
}

impl SoilMoistureScale {
    pub fn to_percent(self, value: f64) -> f64 {
        match self {
            SoilMoistureScale::Percent => value,
            SoilMoistureScale::Adc10 => ((1023.0 - value) / 1023.0 * 100.0).round(),
        }
    }
}

/// Body of `GET /sensor-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPayload {
    #[serde(default = "default_connected")]
    pub connected: bool,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    /// Serial-attached sensor boards have no rain gauge.
    #[serde(default)]
    pub rainfall: f64,
}

fn default_connected() -> bool {
    true
}

impl SensorPayload {
    pub fn into_reading(self, scale: SoilMoistureScale) -> Result<Reading, FeedError> {
        if !self.connected {
            return Err(FeedError::Disconnected);
        }
        Ok(Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            soil_moisture: scale.to_percent(self.soil_moisture),
            rainfall: self.rainfall,
        })
    }
}

impl From<Reading> for SensorPayload {
    fn from(r: Reading) -> Self {
        Self {
            connected: true,
            temperature: r.temperature,
            humidity: r.humidity,
            soil_moisture: r.soil_moisture,
            rainfall: r.rainfall,
        }
    }
}

pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
    scale: SoilMoistureScale,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration, scale: SoilMoistureScale) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FeedError::Network)?;
        Ok(Self {
            client,
            url: url.into(),
            scale,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Reading, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(FeedError::Network)?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(FeedError::Network)?;
        let payload: SensorPayload =
            serde_json::from_slice(&body).map_err(|e| FeedError::Malformed(e.to_string()))?;

        payload.into_reading(self.scale)
    }
}

impl SensorFeed for HttpFeed {
    async fn next_reading(&mut self) -> Result<Reading, FeedError> {
        self.fetch().await
    }
}

// ---------------------------------------------------------------------------
// Simulated feed
// ---------------------------------------------------------------------------

/// Synthesizes each reading from the previous one; never fails.
pub struct SimFeed {
    sim: Simulator,
}

impl SimFeed {
    pub fn new(scenario: Scenario, seed: Reading) -> Self {
        Self {
            sim: Simulator::new(scenario, seed),
        }
    }
}

impl SensorFeed for SimFeed {
    async fn next_reading(&mut self) -> Result<Reading, FeedError> {
        Ok(self.sim.step())
    }
}

// ---------------------------------------------------------------------------
// Runtime selection
// ---------------------------------------------------------------------------

/// The feed chosen by configuration at startup.
pub enum AnyFeed {
    Http(HttpFeed),
    Sim(SimFeed),
}

impl SensorFeed for AnyFeed {
    async fn next_reading(&mut self) -> Result<Reading, FeedError> {
        match self {
            AnyFeed::Http(f) => f.next_reading().await,
            AnyFeed::Sim(f) => f.next_reading().await,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
