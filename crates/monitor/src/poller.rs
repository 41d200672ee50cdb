//! Timer-driven polling: fetch a reading every tick and evaluate it.
//!
//! Each tick awaits its fetch before the next tick is taken, so requests
//! never overlap and an old response can never land after a newer one.
//! Ticks missed while a slow request is in flight are skipped, not queued.
//!
//! A failed fetch is logged and counted; the next tick is the only recovery.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::evaluator::local_now;
use crate::feed::SensorFeed;
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run the polling loop until `cancel` fires.  Intended to be
/// `tokio::spawn`-ed from main.
pub async fn run<F: SensorFeed>(
    mut feed: F,
    shared: SharedState,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_ms = every.as_millis() as u64, "poller started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("poller stopping");
                break;
            }
            _ = ticker.tick() => {
                poll_once(&mut feed, &shared).await;
            }
        }
    }
}

/// Periodically re-check the current reading against the thresholds,
/// independent of new data arriving.
pub async fn run_reevaluation(shared: SharedState, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the poller covers that moment.
    ticker.tick().await;

    info!(interval_ms = every.as_millis() as u64, "re-evaluation timer started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("re-evaluation timer stopping");
                break;
            }
            _ = ticker.tick() => {
                let n = shared.write().await.evaluate_current(local_now());
                if n > 0 {
                    debug!(alerts = n, "re-evaluation raised alerts");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Single cycle
// ---------------------------------------------------------------------------

/// One poll cycle.  Returns `true` if a reading was applied.
pub async fn poll_once<F: SensorFeed>(feed: &mut F, shared: &SharedState) -> bool {
    // Fetch without holding the lock.
    match feed.next_reading().await {
        Ok(reading) => {
            let mut st = shared.write().await;
            let alerts = st.apply_reading(reading, local_now());
            debug!(
                temperature = reading.temperature,
                humidity = reading.humidity,
                soil_moisture = reading.soil_moisture,
                rainfall = reading.rainfall,
                alerts,
                "reading applied"
            );
            if alerts > 0 {
                info!(alerts, "threshold alerts raised");
            }
            true
        }
        Err(e) => {
            warn!(error = %e, "poll cycle skipped");
            shared.write().await.record_skip(e.to_string());
            false
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedError;
    use crate::reading::Reading;
    use crate::settings::Theme;
    use crate::state::AppState;
    use crate::thresholds::ThresholdStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Feed that replays a script, then keeps returning the last entry.
    struct ScriptedFeed {
        script: VecDeque<Result<Reading, FeedError>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedFeed {
        fn new(script: Vec<Result<Reading, FeedError>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    script: script.into(),
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl SensorFeed for ScriptedFeed {
        async fn next_reading(&mut self) -> Result<Reading, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(r) => r,
                None => Err(FeedError::Disconnected),
            }
        }
    }

    fn shared() -> SharedState {
        AppState::new(ThresholdStore::default(), Theme::Dark).shared()
    }

    fn hot() -> Reading {
        Reading {
            temperature: 40.0,
            humidity: 50.0,
            soil_moisture: 50.0,
            rainfall: 10.0,
        }
    }

    // -- poll_once ------------------------------------------------------

    #[tokio::test]
    async fn successful_poll_updates_state_and_alerts() {
        let (mut feed, _) = ScriptedFeed::new(vec![Ok(hot())]);
        let shared = shared();

        assert!(poll_once(&mut feed, &shared).await);

        let st = shared.read().await;
        assert_eq!(st.reading, hot());
        assert!(st.last_update.is_some());
        assert_eq!(st.notifications.len(), 1);
        assert_eq!(
            st.notifications.iter().next().unwrap().message,
            "High Temperature Alert: 40°C exceeds threshold of 35°C"
        );
    }

    #[tokio::test]
    async fn failed_poll_is_skipped() {
        let (mut feed, _) = ScriptedFeed::new(vec![Ok(hot()), Err(FeedError::Status(500))]);
        let shared = shared();

        poll_once(&mut feed, &shared).await;
        assert!(!poll_once(&mut feed, &shared).await);

        let st = shared.read().await;
        assert_eq!(st.reading, hot(), "previous reading kept");
        assert_eq!(st.notifications.len(), 1, "no alerts from skipped cycle");
        assert_eq!(st.feed.cycles_ok, 1);
        assert_eq!(st.feed.cycles_skipped, 1);
    }

    #[tokio::test]
    async fn disconnected_sensor_is_skipped() {
        let (mut feed, _) = ScriptedFeed::new(vec![Err(FeedError::Disconnected)]);
        let shared = shared();

        assert!(!poll_once(&mut feed, &shared).await);
        let st = shared.read().await;
        assert_eq!(st.reading, Reading::SEED);
        assert!(st.last_update.is_none());
    }

    // -- run loop -------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn run_polls_every_interval_until_cancelled() {
        let (feed, calls) = ScriptedFeed::new((0..100).map(|_| Ok(hot())).collect());
        let shared = shared();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            feed,
            Arc::clone(&shared),
            Duration::from_secs(2),
            cancel.clone(),
        ));

        // Ticks at t=0, 2, 4, 6.
        tokio::time::sleep(Duration::from_millis(6_500)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let st = shared.read().await;
        assert_eq!(st.feed.cycles_ok, 4);
        assert_eq!(st.notifications.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_loop_stops_polling() {
        let (feed, calls) = ScriptedFeed::new((0..100).map(|_| Ok(hot())).collect());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(feed, shared(), Duration::from_secs(2), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        let before = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test(start_paused = true)]
    async fn notification_log_stays_bounded_under_polling() {
        let (feed, _) = ScriptedFeed::new((0..50).map(|_| Ok(hot())).collect());
        let shared = shared();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            feed,
            Arc::clone(&shared),
            Duration::from_secs(2),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(shared.read().await.notifications.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn reevaluation_timer_repeats_alerts() {
        let shared = shared();
        shared.write().await.apply_reading(hot(), local_now());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_reevaluation(
            Arc::clone(&shared),
            Duration::from_secs(5),
            cancel.clone(),
        ));
        // Ticks at t=5 and t=10.
        tokio::time::sleep(Duration::from_millis(11_000)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(shared.read().await.notifications.len(), 3);
    }
}
