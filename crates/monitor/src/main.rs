use anyhow::{Context, Result};
use std::{env, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use plant_monitor::config::{self, FeedSource};
use plant_monitor::db::Db;
use plant_monitor::feed::{AnyFeed, HttpFeed, SimFeed};
use plant_monitor::poller;
use plant_monitor::reading::Reading;
use plant_monitor::recommend::Recommender;
use plant_monitor::settings::load_theme;
use plant_monitor::state::AppState;
use plant_monitor::thresholds::ThresholdStore;
use plant_monitor::web::{self, AppContext};

#[tokio::main]
async fn main() -> Result<()> {
    // ── Tracing ─────────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plant_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "monitor.toml".to_string());
    let db_url =
        env::var("DB_URL").unwrap_or_else(|_| "sqlite:plant-monitor.db?mode=rwc".to_string());

    let cfg = config::load_or_default(&config_path)?;
    let web_port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(cfg.web.port);

    // ── Database ────────────────────────────────────────────────────
    let db = Db::connect(&db_url).await?;
    db.migrate().await?;

    // Persisted settings are the source of truth for thresholds and theme.
    let (thresholds, report) = ThresholdStore::load(&db).await?;
    info!(
        overridden = report.overridden.len(),
        fallbacks = report.fallbacks.len(),
        "thresholds loaded"
    );
    let theme = load_theme(&db).await?;

    // ── Shared state ────────────────────────────────────────────────
    let shared = AppState::new(thresholds, theme).shared();
    let cancel = CancellationToken::new();

    // ── Feed + poller ───────────────────────────────────────────────
    let feed = match cfg.feed.source {
        FeedSource::Http => {
            let f = HttpFeed::new(
                cfg.feed.url.clone(),
                cfg.feed.timeout(),
                cfg.feed.soil_moisture_scale,
            )
            .context("failed to build sensor http client")?;
            info!(url = f.url(), "polling sensor endpoint");
            AnyFeed::Http(f)
        }
        FeedSource::Simulated => {
            let scenario = cfg.feed.scenario;
            info!(%scenario, "using simulated sensor feed");
            AnyFeed::Sim(SimFeed::new(scenario, Reading::SEED))
        }
    };

    let poller_handle = tokio::spawn(poller::run(
        feed,
        Arc::clone(&shared),
        cfg.feed.interval(),
        cancel.clone(),
    ));

    let reeval_handle = cfg.alerts.reevaluate_interval().map(|every| {
        tokio::spawn(poller::run_reevaluation(
            Arc::clone(&shared),
            every,
            cancel.clone(),
        ))
    });

    // ── Web server ──────────────────────────────────────────────────
    let recommender = Recommender::new(cfg.recommendation.url.clone(), cfg.recommendation.timeout())
        .context("failed to build prediction http client")?;
    let ctx = AppContext {
        shared: Arc::clone(&shared),
        db: db.clone(),
        recommender: Arc::new(recommender),
    };
    let mut web_handle = tokio::spawn(web::serve(ctx, web_port, cancel.clone()));

    // ── Shutdown ────────────────────────────────────────────────────
    // Ctrl-C stops everything; so does the web server exiting on its own
    // (e.g. the port was already taken).
    let web_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("received Ctrl-C, shutting down"),
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, shutting down"),
            }
            cancel.cancel();
            (&mut web_handle).await
        }
        res = &mut web_handle => res,
    };
    cancel.cancel();

    poller_handle.await.context("poller task panicked")?;
    if let Some(h) = reeval_handle {
        h.await.context("re-evaluation task panicked")?;
    }
    web_result.context("web task panicked")??;

    info!("shutdown complete");
    Ok(())
}
