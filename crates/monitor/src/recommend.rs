//! Crop recommendation call-out.
//!
//! One POST per request with the current reading; any failure yields the
//! fixed [`FALLBACK_CROPS`] list.  No retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::reading::Reading;

/// Returned whenever the prediction service cannot be used.
pub const FALLBACK_CROPS: [&str; 3] = ["Tomatoes", "Peppers", "Cucumbers"];

pub fn fallback_crops() -> Vec<String> {
    FALLBACK_CROPS.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("prediction request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("prediction endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed prediction response: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PredictRequest {
    temperature: f64,
    humidity: f64,
    soil_moisture: f64,
    rainfall: f64,
}

impl From<&Reading> for PredictRequest {
    fn from(r: &Reading) -> Self {
        Self {
            temperature: r.temperature,
            humidity: r.humidity,
            soil_moisture: r.soil_moisture,
            rainfall: r.rainfall,
        }
    }
}

/// The service may list bare names or scored entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CropEntry {
    Name(String),
    Scored {
        name: String,
        #[allow(dead_code)]
        #[serde(default)]
        probability: Option<f64>,
    },
}

impl CropEntry {
    fn into_name(self) -> String {
        match self {
            CropEntry::Name(name) | CropEntry::Scored { name, .. } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    recommended_crops: Vec<CropEntry>,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub crops: Vec<String>,
    /// True when `crops` is the fallback list.
    pub fallback: bool,
}

// ---------------------------------------------------------------------------
// Requester
// ---------------------------------------------------------------------------

pub struct Recommender {
    client: reqwest::Client,
    url: String,
}

impl Recommender {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RecommendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RecommendError::Network)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Ask for crops suited to `reading`.  Never fails.
    pub async fn request(&self, reading: &Reading) -> Recommendation {
        match self.try_request(reading).await {
            Ok(crops) => {
                info!(count = crops.len(), "recommendation received");
                Recommendation {
                    crops,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "recommendation failed, using fallback");
                Recommendation {
                    crops: fallback_crops(),
                    fallback: true,
                }
            }
        }
    }

    async fn try_request(&self, reading: &Reading) -> Result<Vec<String>, RecommendError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PredictRequest::from(reading))
            .send()
            .await
            .map_err(RecommendError::Network)?;

        if !response.status().is_success() {
            return Err(RecommendError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(RecommendError::Network)?;
        let parsed: PredictResponse =
            serde_json::from_slice(&body).map_err(|e| RecommendError::Malformed(e.to_string()))?;

        Ok(parsed
            .recommended_crops
            .into_iter()
            .map(CropEntry::into_name)
            .collect())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    async fn spawn_server(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn recommender_for(router: Router) -> Recommender {
        let base = spawn_server(router).await;
        Recommender::new(format!("{base}/predict"), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_fallback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let r = Recommender::new(format!("http://{addr}/predict"), Duration::from_secs(2)).unwrap();
        let rec = r.request(&Reading::SEED).await;
        assert_eq!(rec.crops, vec!["Tomatoes", "Peppers", "Cucumbers"]);
        assert!(rec.fallback);
    }

    #[tokio::test]
    async fn error_status_returns_fallback() {
        let r = recommender_for(Router::new().route(
            "/predict",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;
        let rec = r.request(&Reading::SEED).await;
        assert_eq!(rec.crops, fallback_crops());
        assert!(rec.fallback);
    }

    #[tokio::test]
    async fn missing_field_returns_fallback() {
        let r = recommender_for(Router::new().route(
            "/predict",
            post(|| async { Json(serde_json::json!({"error": "model not loaded"})) }),
        ))
        .await;
        let rec = r.request(&Reading::SEED).await;
        assert!(rec.fallback);
    }

    #[tokio::test]
    async fn string_list_is_returned() {
        let r = recommender_for(Router::new().route(
            "/predict",
            post(|| async { Json(serde_json::json!({"recommended_crops": ["Rice", "Maize"]})) }),
        ))
        .await;
        let rec = r.request(&Reading::SEED).await;
        assert_eq!(rec.crops, vec!["Rice", "Maize"]);
        assert!(!rec.fallback);
    }

    #[tokio::test]
    async fn scored_entries_yield_names() {
        let r = recommender_for(Router::new().route(
            "/predict",
            post(|| async {
                Json(serde_json::json!({"recommended_crops": [
                    {"name": "Coffee", "probability": 61.5},
                    {"name": "Banana", "probability": 20.0}
                ]}))
            }),
        ))
        .await;
        let rec = r.request(&Reading::SEED).await;
        assert_eq!(rec.crops, vec!["Coffee", "Banana"]);
    }

    #[tokio::test]
    async fn request_body_uses_snake_case_soil_moisture() {
        let r = recommender_for(Router::new().route(
            "/predict",
            post(|Json(body): Json<serde_json::Value>| async move {
                let ok = body["soil_moisture"] == 59.0
                    && body["temperature"] == 29.0
                    && body["humidity"] == 78.0
                    && body["rainfall"] == 50.0;
                let crops = if ok { vec!["Echo"] } else { vec![] };
                Json(serde_json::json!({ "recommended_crops": crops }))
            }),
        ))
        .await;
        let rec = r.request(&Reading::SEED).await;
        assert_eq!(rec.crops, vec!["Echo"]);
    }
}
