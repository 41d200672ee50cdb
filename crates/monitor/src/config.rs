//! TOML config file loading and validation.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::feed::SoilMoistureScale;
use crate::sim::Scenario;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Poll interval bounds.  Anything faster hammers the sensor board; anything
/// slower is no longer a live view.
const MIN_INTERVAL_MS: u64 = 500;
const MAX_INTERVAL_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub recommendation: RecommendationConfig,
    pub alerts: AlertsConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Http,
    Simulated,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub source: FeedSource,
    pub url: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub soil_moisture_scale: SoilMoistureScale,
    /// Simulated source only.
    pub scenario: Scenario,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::Http,
            url: "http://localhost:5000/sensor-data".to_string(),
            interval_ms: 2_000,
            timeout_ms: 5_000,
            soil_moisture_scale: SoilMoistureScale::Percent,
            scenario: Scenario::Stable,
        }
    }
}

impl FeedConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5001/predict".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl RecommendationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// 0 disables the re-evaluation timer.
    pub reevaluate_interval_ms: u64,
}

impl AlertsConfig {
    pub fn reevaluate_interval(&self) -> Option<Duration> {
        (self.reevaluate_interval_ms > 0).then(|| Duration::from_millis(self.reevaluate_interval_ms))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all sections.  Returns `Ok(())` or an error describing every
    /// violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_feed(&mut errors);
        self.validate_recommendation(&mut errors);
        self.validate_alerts(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_feed(&self, errors: &mut Vec<String>) {
        let f = &self.feed;

        if f.source == FeedSource::Http && !is_http_url(&f.url) {
            errors.push(format!("feed.url '{}' is not an http(s) URL", f.url));
        }
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&f.interval_ms) {
            errors.push(format!(
                "feed.interval_ms {} out of range [{MIN_INTERVAL_MS}, {MAX_INTERVAL_MS}]",
                f.interval_ms
            ));
        }
        if f.timeout_ms == 0 {
            errors.push("feed.timeout_ms must be positive".to_string());
        }
    }

    fn validate_recommendation(&self, errors: &mut Vec<String>) {
        let r = &self.recommendation;

        if !is_http_url(&r.url) {
            errors.push(format!("recommendation.url '{}' is not an http(s) URL", r.url));
        }
        if r.timeout_ms == 0 {
            errors.push("recommendation.timeout_ms must be positive".to_string());
        }
    }

    fn validate_alerts(&self, errors: &mut Vec<String>) {
        let ms = self.alerts.reevaluate_interval_ms;
        if ms != 0 && ms < MIN_INTERVAL_MS {
            errors.push(format!(
                "alerts.reevaluate_interval_ms {ms} is below {MIN_INTERVAL_MS} (use 0 to disable)"
            ));
        }
    }
}

fn is_http_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("http://")
        .or_else(|| s.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Like [`load`], but a missing file means "all defaults".
pub fn load_or_default(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        load(path)
    } else {
        tracing::info!(path, "no config file, using defaults");
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[feed]
source = "simulated"
url = "http://10.0.0.5:5000/sensor-data"
interval_ms = 3000
timeout_ms = 1500
soil_moisture_scale = "adc10"
scenario = "drying"

[recommendation]
url = "http://10.0.0.6:5001/predict"
timeout_ms = 8000

[alerts]
reevaluate_interval_ms = 5000

[web]
port = 9000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.feed.source, FeedSource::Simulated);
        assert_eq!(config.feed.interval(), Duration::from_secs(3));
        assert_eq!(config.feed.soil_moisture_scale, SoilMoistureScale::Adc10);
        assert_eq!(config.feed.scenario, Scenario::Drying);
        assert_eq!(config.recommendation.timeout(), Duration::from_secs(8));
        assert_eq!(
            config.alerts.reevaluate_interval(),
            Some(Duration::from_secs(5))
        );
        assert_eq!(config.web.port, 9000);
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.feed.source, FeedSource::Http);
        assert_eq!(config.feed.url, "http://localhost:5000/sensor-data");
        assert_eq!(config.feed.interval_ms, 2_000);
        assert_eq!(config.recommendation.url, "http://127.0.0.1:5001/predict");
        assert_eq!(config.alerts.reevaluate_interval(), None);
        assert_eq!(config.web.port, 8080);
        config.validate().unwrap();
    }

    #[test]
    fn parse_partial_section() {
        let config: Config = toml::from_str("[feed]\ninterval_ms = 4000\n").unwrap();
        assert_eq!(config.feed.interval_ms, 4000);
        assert_eq!(config.feed.timeout_ms, 5_000);
    }

    #[test]
    fn unknown_source_is_a_parse_error() {
        assert!(toml::from_str::<Config>("[feed]\nsource = \"mqtt\"\n").is_err());
    }

    #[test]
    fn misspelled_scenario_is_a_parse_error() {
        let err = toml::from_str::<Config>("[feed]\nscenario = \"dryng\"\n").unwrap_err();
        assert!(err.to_string().contains("dryng"), "got: {err}");
    }

    #[test]
    fn scenario_defaults_to_stable() {
        let config: Config = toml::from_str("[feed]\nsource = \"simulated\"\n").unwrap();
        assert_eq!(config.feed.scenario, Scenario::Stable);
    }

    // -- Validation -------------------------------------------------------

    #[test]
    fn interval_too_short() {
        let mut cfg = Config::default();
        cfg.feed.interval_ms = 100;
        assert_validation_err(&cfg, "feed.interval_ms 100 out of range");
    }

    #[test]
    fn interval_too_long() {
        let mut cfg = Config::default();
        cfg.feed.interval_ms = 120_000;
        assert_validation_err(&cfg, "feed.interval_ms 120000 out of range");
    }

    #[test]
    fn zero_timeouts_rejected() {
        let mut cfg = Config::default();
        cfg.feed.timeout_ms = 0;
        cfg.recommendation.timeout_ms = 0;
        assert_validation_err(&cfg, "feed.timeout_ms must be positive");
        assert_validation_err(&cfg, "recommendation.timeout_ms must be positive");
    }

    #[test]
    fn bad_feed_url_rejected_for_http_source() {
        let mut cfg = Config::default();
        cfg.feed.url = "localhost:5000".into();
        assert_validation_err(&cfg, "feed.url 'localhost:5000' is not an http(s) URL");
    }

    #[test]
    fn feed_url_ignored_for_simulated_source() {
        let mut cfg = Config::default();
        cfg.feed.source = FeedSource::Simulated;
        cfg.feed.url = String::new();
        cfg.validate().unwrap();
    }

    #[test]
    fn bad_recommendation_url_rejected() {
        let mut cfg = Config::default();
        cfg.recommendation.url = "ftp://x/predict".into();
        assert_validation_err(&cfg, "recommendation.url");
    }

    #[test]
    fn reevaluate_interval_too_short() {
        let mut cfg = Config::default();
        cfg.alerts.reevaluate_interval_ms = 10;
        assert_validation_err(&cfg, "alerts.reevaluate_interval_ms 10 is below");
    }

    #[test]
    fn multiple_errors_collected() {
        let mut cfg = Config::default();
        cfg.feed.url = "nope".into();
        cfg.feed.interval_ms = 0;
        cfg.recommendation.timeout_ms = 0;
        let msg = format!("{:#}", cfg.validate().unwrap_err());
        assert!(msg.contains("3 errors"), "got: {msg}");
        assert!(msg.contains("feed.url"));
        assert!(msg.contains("feed.interval_ms"));
        assert!(msg.contains("recommendation.timeout_ms"));
    }

    #[test]
    fn url_check() {
        assert!(is_http_url("http://a"));
        assert!(is_http_url("https://a:1/b"));
        assert!(!is_http_url("http://"));
        assert!(!is_http_url("a.b"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_or_default("/definitely/not/here/monitor.toml").unwrap();
        assert_eq!(cfg.web.port, 8080);
    }
}
