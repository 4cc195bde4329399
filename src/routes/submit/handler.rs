use axum::{
    body::Bytes,
    extract::{Json, State},
    response::IntoResponse,
};
use serde::Serialize;

use crate::{AppState, error::AppError};

use super::model::{Submission, SubmissionRequest};

#[derive(Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: &'static str,
}

#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: SubmissionRequest = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid JSON body".to_string()))?;

    request.validate().map_err(AppError::Validation)?;

    Submission::create(
        &state.pool,
        request.url(),
        request.email(),
        request.context.as_deref(),
    )
    .await
    .map_err(|e| {
        tracing::error!("failed to save submission: {}", e);
        AppError::Internal("Failed to save submission".to_string())
    })?;

    // Confirmation delivery is best-effort; the submission is already saved.
    if let Some(email) = request.email() {
        if let Err(e) = state.notifier.send_confirmation(email, request.url()).await {
            tracing::warn!("failed to send confirmation email: {}", e);
        }
    }

    Ok(Json(SubmitResponse {
        success: true,
        message: "Thank you for your submission! We'll review it soon.",
    }))
}
