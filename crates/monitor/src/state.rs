use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::evaluator::{evaluate, Alert};
use crate::notifications::NotificationLog;
use crate::reading::Reading;
use crate::recommend::Recommendation;
use crate::settings::Theme;
use crate::thresholds::{ThresholdPatch, ThresholdSet, ThresholdStore};

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<AppState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Everything the dashboard shows.  Owned by the controller in `main` and
/// mutated only through the methods below.
pub struct AppState {
    pub started_at: Instant,
    pub reading: Reading,
    /// `None` until the first successful poll.
    pub last_update: Option<OffsetDateTime>,
    pub thresholds: ThresholdStore,
    pub notifications: NotificationLog,
    pub recommendation: RecommendationState,
    pub feed: FeedHealth,
    pub theme: Theme,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedHealth {
    pub cycles_ok: u64,
    pub cycles_skipped: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecommendationState {
    #[default]
    Idle,
    Loading,
    Ready(Recommendation),
}

// ---------------------------------------------------------------------------
// JSON response (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub reading: Reading,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    pub thresholds: ThresholdSet,
    pub notifications: Vec<Alert>,
    pub recommendation: RecommendationState,
    pub feed: FeedHealth,
    pub theme: Theme,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl AppState {
    pub fn new(thresholds: ThresholdStore, theme: Theme) -> Self {
        Self {
            started_at: Instant::now(),
            reading: Reading::SEED,
            last_update: None,
            thresholds,
            notifications: NotificationLog::new(),
            recommendation: RecommendationState::Idle,
            feed: FeedHealth::default(),
            theme,
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Replace the current reading, evaluate it and log any alerts.  Returns
    /// the number of new alerts.
    pub fn apply_reading(&mut self, reading: Reading, at: OffsetDateTime) -> usize {
        self.reading = reading;
        self.last_update = Some(at);
        self.feed.cycles_ok += 1;
        self.evaluate_current(at)
    }

    /// Count a skipped poll cycle.  The reading stays as it was.
    pub fn record_skip(&mut self, error: String) {
        self.feed.cycles_skipped += 1;
        self.feed.last_error = Some(error);
    }

    /// Re-run the evaluator on the current reading.  Does nothing before the
    /// first real reading arrives.
    pub fn evaluate_current(&mut self, at: OffsetDateTime) -> usize {
        if self.last_update.is_none() {
            return 0;
        }
        let alerts = evaluate(&self.reading, self.thresholds.get(), at);
        let n = alerts.len();
        self.notifications.push(alerts);
        n
    }

    /// Apply a partial threshold update and re-check the current reading
    /// against the new bounds.
    pub fn update_thresholds(&mut self, patch: &ThresholdPatch, at: OffsetDateTime) -> usize {
        self.thresholds.set(patch);
        self.evaluate_current(at)
    }

    /// Move to `Loading` unless a request is already in flight.  Returns the
    /// reading snapshot to send.
    pub fn begin_recommendation(&mut self) -> Option<Reading> {
        if self.recommendation == RecommendationState::Loading {
            return None;
        }
        self.recommendation = RecommendationState::Loading;
        Some(self.reading)
    }

    pub fn finish_recommendation(&mut self, rec: Recommendation) {
        self.recommendation = RecommendationState::Ready(rec);
    }

    pub fn clear_recommendation(&mut self) {
        self.recommendation = RecommendationState::Idle;
    }

    /// Build the JSON-serialisable status snapshot.
    pub fn to_status(&self) -> StatusResponse {
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            reading: self.reading,
            last_update: self.last_update,
            thresholds: self.thresholds.get().clone(),
            notifications: self.notifications.to_vec(),
            recommendation: self.recommendation.clone(),
            feed: self.feed.clone(),
            theme: self.theme,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
