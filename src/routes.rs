use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::io::Write;
use tracing::{error, warn};

use crate::features::{self, FeatureOutcome};
use crate::model::Scorer;
use crate::state::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        // REST API routes
        .route("/", get(home))
        .route("/api/score", post(score_audio))
}

async fn home() -> Html<&'static str> {
    Html(concat!(
        "<h1>Welcome to the Grammar Scoring API!</h1>",
        "<p>Use the <code>/api/score</code> endpoint to upload an audio file ",
        "and get a grammar score.</p>",
        "<p>Check <code>/api/health</code> for health status of the API.</p>",
    ))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.model_loaded()
    }))
}

async fn score_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // Model availability is checked before the body is read
    let Some(scorer) = state.scorer.clone() else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Model not loaded" })),
        ));
    };

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("audio") {
            let data = field
                .bytes()
                .await
                .map_err(|e| processing_error(anyhow::anyhow!("failed to read upload: {e}")))?;

            let score = score_upload(&state, scorer.as_ref(), &data)
                .await
                .map_err(processing_error)?;

            return Ok(Json(json!({
                "score": score,
                "status": "success"
            })));
        }
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "No audio file provided" })),
    ))
}

async fn score_upload(state: &AppState, scorer: &dyn Scorer, data: &[u8]) -> anyhow::Result<f32> {
    // Unique per-request path; the file is removed when `temp` drops,
    // whichever way this function exits.
    let mut temp = tempfile::NamedTempFile::new()?;
    temp.write_all(data)?;
    temp.flush()?;

    let outcome = features::extract_features(temp.path(), &state.config.features);
    if let FeatureOutcome::Degraded { reason, .. } = &outcome {
        warn!("Scoring a degraded feature vector: {reason}");
    }

    scorer.predict(outcome.vector()).await
}

fn processing_error(err: anyhow::Error) -> (StatusCode, Json<Value>) {
    error!("Scoring request failed: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
}
