//! Call Routes - Dispatch and tracking

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::models::{
    AgentSummary, DiagnosticsResponse, ReconcileResponse, ResultResponse, SessionResponse,
    StartCallRequest, StartCallResponse, StopResponse,
};
use crate::routes::error_response;
use crate::AppState;

/// Start an outbound call
#[utoipa::path(
    post,
    path = "/api/calls",
    request_body = StartCallRequest,
    responses(
        (status = 200, description = "Call dispatched", body = StartCallResponse),
        (status = 400, description = "Invalid phone number or agent configuration"),
        (status = 409, description = "Job already tracked"),
        (status = 502, description = "Provider unavailable")
    ),
    tag = "Call"
)]
pub async fn start_call(
    State(state): State<AppState>,
    Json(payload): Json<StartCallRequest>,
) -> Result<Json<StartCallResponse>, (axum::http::StatusCode, String)> {
    let agent = payload.agent_config();
    tracing::info!(
        phone_number = %payload.phone_number,
        agent = %agent.name,
        questions = agent.questions.len(),
        "📞 Start call request"
    );

    let session = state
        .tracker
        .start(&payload.phone_number, agent)
        .await
        .map_err(error_response)?;

    Ok(Json(StartCallResponse {
        agent: AgentSummary::from_domain(&session.agent),
        job_id: session.job_id,
        agent_id: session.agent_id,
        status: session.status.to_string(),
    }))
}

/// List tracked sessions
#[utoipa::path(
    get,
    path = "/api/calls",
    responses(
        (status = 200, description = "Tracked sessions", body = Vec<SessionResponse>)
    ),
    tag = "Call"
)]
pub async fn list_calls(State(state): State<AppState>) -> Json<Vec<SessionResponse>> {
    let sessions = state
        .tracker
        .sessions()
        .into_iter()
        .map(|s| {
            let polling = state.tracker.is_polling(&s.job_id);
            SessionResponse::from_domain(s, polling)
        })
        .collect();
    Json(sessions)
}

/// Get session status
#[utoipa::path(
    get,
    path = "/api/calls/{job_id}",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "Call"
)]
pub async fn get_call(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<SessionResponse>, (axum::http::StatusCode, String)> {
    let session = state.tracker.session(&job_id).map_err(error_response)?;
    let polling = state.tracker.is_polling(&job_id);
    Ok(Json(SessionResponse::from_domain(session, polling)))
}

/// Acknowledge and discard a session
#[utoipa::path(
    delete,
    path = "/api/calls/{job_id}",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Session removed", body = SessionResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "Call"
)]
pub async fn delete_call(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<SessionResponse>, (axum::http::StatusCode, String)> {
    let removed = state.tracker.remove(&job_id).map_err(error_response)?;
    Ok(Json(SessionResponse::from_domain(removed, false)))
}

/// Stop polling a job
#[utoipa::path(
    post,
    path = "/api/calls/{job_id}/stop",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Polling stopped", body = StopResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "Call"
)]
pub async fn stop_call(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StopResponse>, (axum::http::StatusCode, String)> {
    let stopped = state.tracker.stop(&job_id).map_err(error_response)?;
    Ok(Json(StopResponse { job_id, stopped }))
}

/// Reconcile a call's results with the provider
#[utoipa::path(
    post,
    path = "/api/calls/{job_id}/reconcile",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Result, diagnostic snapshot or not found yet", body = ReconcileResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Call failed or was cancelled"),
        (status = 502, description = "Provider unavailable")
    ),
    tag = "Call"
)]
pub async fn reconcile_call(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ReconcileResponse>, (axum::http::StatusCode, String)> {
    let outcome = state
        .tracker
        .reconcile(&job_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ReconcileResponse { job_id, outcome }))
}

/// Get the current result state
#[utoipa::path(
    get,
    path = "/api/calls/{job_id}/result",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Result state", body = ResultResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "Call"
)]
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ResultResponse>, (axum::http::StatusCode, String)> {
    let result = state.tracker.get_result(&job_id).map_err(error_response)?;
    Ok(Json(ResultResponse { job_id, result }))
}

/// List the provider's conversation records for a job's agent
#[utoipa::path(
    get,
    path = "/api/calls/{job_id}/diagnostics",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Diagnostic snapshot", body = DiagnosticsResponse),
        (status = 404, description = "Session not found"),
        (status = 502, description = "Provider unavailable")
    ),
    tag = "Call"
)]
pub async fn get_diagnostics(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<DiagnosticsResponse>, (axum::http::StatusCode, String)> {
    let snapshot = state
        .tracker
        .diagnostics(&job_id)
        .await
        .map_err(error_response)?;
    Ok(Json(DiagnosticsResponse::from_domain(snapshot)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/calls", get(list_calls).post(start_call))
        .route("/api/calls/:job_id", get(get_call).delete(delete_call))
        .route("/api/calls/:job_id/stop", post(stop_call))
        .route("/api/calls/:job_id/reconcile", post(reconcile_call))
        .route("/api/calls/:job_id/result", get(get_result))
        .route("/api/calls/:job_id/diagnostics", get(get_diagnostics))
}
