//! Stand-in sensor board.  Serves the latest simulated reading at
//! `GET /sensor-data` in the same JSON shape the real board emits.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::{env, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use plant_monitor::feed::SensorPayload;
use plant_monitor::reading::Reading;
use plant_monitor::sim::{Scenario, Simulator};

type Latest = Arc<RwLock<Reading>>;

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

fn router(latest: Latest) -> Router {
    Router::new()
        .route("/sensor-data", get(sensor_data))
        .with_state(latest)
}

async fn sensor_data(State(latest): State<Latest>) -> Json<SensorPayload> {
    Json(SensorPayload::from(*latest.read().await))
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Step the simulator forever, publishing each sample to `latest`.
async fn sample_loop(mut sim: Simulator, latest: Latest, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // First tick is immediate; the seed is already published.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let r = sim.step();
        debug!(
            temperature = r.temperature,
            humidity = r.humidity,
            soil_moisture = r.soil_moisture,
            rainfall = r.rainfall,
            "sampled"
        );
        *latest.write().await = r;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensor_node=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Env config
    let port: u16 = env::var("NODE_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5000);
    let sample_every_ms: u64 = env::var("SAMPLE_EVERY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    let scenario = Scenario::from_str_lossy(
        &env::var("SIM_SCENARIO").unwrap_or_else(|_| "stable".to_string()),
    );

    let sim = Simulator::new(scenario, Reading::SEED);
    let latest: Latest = Arc::new(RwLock::new(sim.current()));
    tokio::spawn(sample_loop(
        sim,
        Arc::clone(&latest),
        Duration::from_millis(sample_every_ms.max(1)),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, %scenario, sample_every_ms, "sensor node serving /sensor-data");

    axum::serve(listener, router(latest))
        .with_graceful_shutdown(async {
            // A failed handler install just means we run until killed.
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl-C, shutting down");
            }
        })
        .await
        .context("sensor node server error")?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
