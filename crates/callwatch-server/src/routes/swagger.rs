//! OpenAPI Documentation
//!
//! Centralized API documentation using utoipa.

use utoipa::OpenApi;

use crate::models::{
    // Call models
    AgentSummary,
    DiagnosticsResponse,
    ReconcileResponse,
    ResultResponse,
    SessionResponse,
    StartCallRequest,
    StartCallResponse,
    StopResponse,
    // Webhook models
    WebhookAck,
    WebhookEvent,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Call endpoints
        super::call::start_call,
        super::call::list_calls,
        super::call::get_call,
        super::call::delete_call,
        super::call::stop_call,
        super::call::reconcile_call,
        super::call::get_result,
        super::call::get_diagnostics,
        // Push channel
        super::webhook::receive_webhook,
        super::events::stream_events,
    ),
    info(
        title = "Callwatch API",
        version = "0.1.0",
        description = "Lifecycle tracking for outbound conversational-AI phone calls.\n\nDispatch a call, follow its status through polling and provider webhooks, then fetch normalized answers or diagnostics.",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Call", description = "Call - Dispatch, status and results"),
        (name = "Webhook", description = "Webhook - Provider push channel"),
        (name = "Events", description = "Events - Server-sent session updates"),
    ),
    components(
        schemas(
            // Call
            StartCallRequest,
            StartCallResponse,
            AgentSummary,
            SessionResponse,
            ResultResponse,
            ReconcileResponse,
            DiagnosticsResponse,
            StopResponse,
            // Webhook
            WebhookEvent,
            WebhookAck,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/calls",
            "/api/calls/{job_id}",
            "/api/calls/{job_id}/stop",
            "/api/calls/{job_id}/reconcile",
            "/api/calls/{job_id}/result",
            "/api/calls/{job_id}/diagnostics",
            "/api/webhook",
            "/api/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
