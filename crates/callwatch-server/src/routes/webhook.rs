//! Webhook Routes - Provider push channel
//!
//! Events are verified, mapped onto lifecycle statuses and queued for the
//! tracker's event ingestor.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};

use callwatch::services::normalize_conversation;
use callwatch::{CallEvent, CallStatus, ConversationDetail, Transcript};

use crate::adapters::{verify_signature, SIGNATURE_HEADER};
use crate::models::{WebhookAck, WebhookEvent};
use crate::AppState;

/// Receive a provider event
#[utoipa::path(
    post,
    path = "/api/webhook",
    request_body = WebhookEvent,
    responses(
        (status = 200, description = "Event accepted or skipped", body = WebhookAck),
        (status = 400, description = "Malformed event"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 503, description = "Event ingestion stopped")
    ),
    tag = "Webhook"
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, (StatusCode, String)> {
    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing signature".to_string()))?;
        if !verify_signature(secret, &body, signature) {
            tracing::warn!("⚠️ Webhook signature mismatch");
            return Err((StatusCode::UNAUTHORIZED, "Invalid signature".to_string()));
        }
    }

    let payload: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid event: {}", e)))?;

    let Some(status) = payload.lifecycle_status() else {
        if let Some(text) = &payload.text {
            tracing::debug!(job_id = %payload.job_id, text = %text, "Speech update");
        }
        return Ok(Json(WebhookAck {
            accepted: false,
            job_id: payload.job_id,
            status: None,
            reason: Some("event carries no lifecycle status".to_string()),
        }));
    };

    // Receipt time when the provider sends none
    let timestamp = payload
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp());
    let mut event = CallEvent::new(payload.job_id.clone(), status).at(timestamp);
    if status == CallStatus::Completed {
        if let Some(results) = transcript_results(&state, &payload) {
            event = event.with_results(results);
        }
    }

    tracing::info!(job_id = %payload.job_id, %status, "📨 Webhook event");

    state.events.send(event).await.map_err(|_| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Event ingestion stopped".to_string(),
        )
    })?;

    Ok(Json(WebhookAck {
        accepted: true,
        job_id: payload.job_id,
        status: Some(status.to_string()),
        reason: None,
    }))
}

/// Normalize a transcript attached to a `call_ended` event
fn transcript_results(state: &AppState, payload: &WebhookEvent) -> Option<callwatch::CallResult> {
    let transcript = Transcript::from_raw(payload.transcript.as_ref()?);
    if transcript.as_text().is_none() {
        return None;
    }
    let session = state.tracker.session(&payload.job_id).ok()?;

    let conversation_id = payload
        .conversation_id
        .clone()
        .unwrap_or_else(|| payload.job_id.clone());
    let detail = ConversationDetail::new(conversation_id, transcript);
    Some(normalize_conversation(&session.agent.questions, detail))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhook", post(receive_webhook))
}
