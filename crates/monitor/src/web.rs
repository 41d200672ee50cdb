use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::db::Db;
use crate::evaluator::local_now;
use crate::recommend::{Recommendation, Recommender};
use crate::settings::{save_theme, Theme};
use crate::state::SharedState;
use crate::thresholds::{ThresholdPatch, ThresholdSet};

const INDEX_HTML: &str = include_str!("ui/index.html");

// ---------------------------------------------------------------------------
// Context & errors
// ---------------------------------------------------------------------------

/// Everything a handler may touch.
#[derive(Clone)]
pub struct AppContext {
    pub shared: SharedState,
    pub db: Db,
    pub recommender: Arc<Recommender>,
}

/// Internal failure surfaced as a bare 500.
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %format!("{:#}", self.0), "api request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PatchResponse {
    thresholds: ThresholdSet,
    /// Alerts raised by re-checking the current reading.
    alerts: usize,
}

#[derive(Serialize, Deserialize)]
struct ThemeBody {
    theme: Theme,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(api_status))
        .route(
            "/api/thresholds",
            get(get_thresholds).patch(patch_thresholds),
        )
        .route("/api/thresholds/save", post(save_thresholds))
        .route("/api/thresholds/reset", post(reset_thresholds))
        .route("/api/notifications", delete(clear_notifications))
        .route(
            "/api/recommendation",
            post(request_recommendation).delete(clear_recommendation),
        )
        .route("/api/theme", get(get_theme).put(put_theme))
        .with_state(ctx)
}

async fn index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], INDEX_HTML)
}

async fn api_status(State(ctx): State<AppContext>) -> impl IntoResponse {
    let st = ctx.shared.read().await;
    Json(st.to_status())
}

// -- Thresholds -------------------------------------------------------------

async fn get_thresholds(State(ctx): State<AppContext>) -> Json<ThresholdSet> {
    Json(ctx.shared.read().await.thresholds.get().clone())
}

async fn patch_thresholds(
    State(ctx): State<AppContext>,
    Json(patch): Json<ThresholdPatch>,
) -> Json<PatchResponse> {
    let mut st = ctx.shared.write().await;
    let alerts = st.update_thresholds(&patch, local_now());
    info!(metrics = patch.len(), alerts, "thresholds updated");
    Json(PatchResponse {
        thresholds: st.thresholds.get().clone(),
        alerts,
    })
}

async fn save_thresholds(State(ctx): State<AppContext>) -> Result<StatusCode, ApiError> {
    // Snapshot first so the lock is not held across the DB writes.
    let store = ctx.shared.read().await.thresholds.clone();
    store.save(&ctx.db).await?;
    info!("thresholds saved");
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_thresholds(State(ctx): State<AppContext>) -> Result<Json<ThresholdSet>, ApiError> {
    let mut store = ctx.shared.read().await.thresholds.clone();
    store.reset(&ctx.db).await?;
    let current = store.get().clone();
    ctx.shared.write().await.thresholds = store;
    info!("thresholds reset to defaults");
    Ok(Json(current))
}

// -- Notifications ----------------------------------------------------------

async fn clear_notifications(State(ctx): State<AppContext>) -> StatusCode {
    ctx.shared.write().await.notifications.clear();
    StatusCode::NO_CONTENT
}

// -- Recommendation ---------------------------------------------------------

async fn request_recommendation(
    State(ctx): State<AppContext>,
) -> Result<Json<Recommendation>, StatusCode> {
    let Some(reading) = ctx.shared.write().await.begin_recommendation() else {
        return Err(StatusCode::CONFLICT);
    };

    // Run detached so the state leaves `Loading` even if this handler is
    // dropped (client gone, shutdown) before the prediction returns.
    let shared = Arc::clone(&ctx.shared);
    let task = tokio::spawn(async move {
        let rec = ctx.recommender.request(&reading).await;
        ctx.shared.write().await.finish_recommendation(rec.clone());
        rec
    });

    match task.await {
        Ok(rec) => Ok(Json(rec)),
        Err(e) => {
            error!(error = %e, "recommendation task failed");
            shared.write().await.clear_recommendation();
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn clear_recommendation(State(ctx): State<AppContext>) -> StatusCode {
    ctx.shared.write().await.clear_recommendation();
    StatusCode::NO_CONTENT
}

// -- Theme ------------------------------------------------------------------

async fn get_theme(State(ctx): State<AppContext>) -> Json<ThemeBody> {
    Json(ThemeBody {
        theme: ctx.shared.read().await.theme,
    })
}

async fn put_theme(
    State(ctx): State<AppContext>,
    Json(body): Json<ThemeBody>,
) -> Result<Json<ThemeBody>, ApiError> {
    save_theme(&ctx.db, body.theme).await?;
    ctx.shared.write().await.theme = body.theme;
    info!(theme = %body.theme, "theme changed");
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(ctx: AppContext, port: u16, cancel: CancellationToken) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "web ui listening");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("web server stopped");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
