//! Publish trigger: GET|POST /api/cron/publish.
//!
//! Called by an external scheduler every few minutes. When `cron.secret` is
//! configured the caller must present it as a bearer token; the check runs
//! before the content store is touched.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use notepress_publisher::BatchResult;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::app::AppState;

/// Runs one publish batch and returns its report.
///
/// 401 on a bad or missing token, 500 when the candidate listing fails,
/// 200 + [`BatchResult`] otherwise (per-note failures are inside the report).
pub async fn cron_publish_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BatchResult>, (StatusCode, Json<Value>)> {
    if let Some(secret) = state.config.cron.secret.as_deref() {
        verify_bearer_token(&headers, secret).map_err(|e| auth_error(&e))?;
    }

    let now = Utc::now();
    match state.scheduler.run(now).await {
        Ok(batch) => {
            info!(
                run_id = %batch.run_id,
                processed = batch.processed,
                failed = batch.failed_count(),
                "cron publish completed"
            );
            Ok(Json(batch))
        }
        Err(e) => {
            error!(error = %e, "cron publish error");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Cron job failed"})),
            ))
        }
    }
}

/// Verify a static bearer token in the `Authorization: Bearer <token>` header.
fn verify_bearer_token(headers: &HeaderMap, expected: &str) -> Result<(), String> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing Authorization header".to_string())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if token == expected {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "cron trigger rejected");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Unauthorized"})),
    )
}
