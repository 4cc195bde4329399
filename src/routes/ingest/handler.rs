use axum::{
    body::Bytes,
    extract::{Json, State},
    http::HeaderMap,
    response::IntoResponse,
};

use crate::{AppState, error::AppError, store::PgResourceStore};

use super::model::IngestEnvelope;
use super::reconcile::reconcile_batch;

fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // No configured key means the endpoint is closed, not open.
    let expected = state.config.ingest_api_key.as_deref().ok_or_else(|| {
        tracing::error!("INGEST_API_KEY is not configured, rejecting ingest request");
        AppError::Unauthorized
    })?;

    let presented = headers.get("x-api-key").and_then(|h| h.to_str().ok());
    if presented != Some(expected) {
        return Err(AppError::Unauthorized);
    }

    Ok(())
}

fn check_body_size(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<(), AppError> {
    let declared = headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if declared.is_some_and(|len| len > state.config.max_body_bytes)
        || body.len() > state.config.max_body_bytes
    {
        return Err(AppError::PayloadTooLarge);
    }

    Ok(())
}

#[axum::debug_handler]
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    check_api_key(&state, &headers)?;
    check_body_size(&state, &headers, &body)?;

    // Two-stage parse so malformed JSON and schema violations report
    // differently.
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid JSON body".to_string()))?;
    let envelope: IngestEnvelope = serde_json::from_value(value).map_err(|e| {
        AppError::Validation(vec![crate::error::FieldError::new("body", e.to_string())])
    })?;

    let batch = envelope.normalize();
    batch.validate().map_err(AppError::Validation)?;

    tracing::info!(
        resources = batch.resources.len(),
        evaluated_at = %batch.evaluated_at,
        "ingest batch accepted"
    );

    let store = PgResourceStore::new(state.pool.clone());
    let report = reconcile_batch(&store, batch.evaluated_at, &batch.resources).await;

    if !report.success {
        tracing::warn!(errors = report.summary.errors, "ingest batch had item failures");
    }

    Ok(Json(report))
}
