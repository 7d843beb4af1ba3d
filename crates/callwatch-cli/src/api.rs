//! Callwatch API Client

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct CallwatchClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

// ============================================
// API Types
// ============================================

#[derive(Debug, Default, Serialize)]
pub struct StartCallRequest {
    pub phone_number: String,
    pub questions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    pub purpose: String,
    pub questions_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct StartCallResponse {
    pub job_id: String,
    pub agent_id: String,
    pub status: String,
    pub agent: AgentSummary,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub job_id: String,
    pub phone_number: String,
    pub status: String,
    pub last_update: Option<i64>,
    pub attempts: u32,
    pub polling: bool,
    pub has_outcome: bool,
}

impl SessionResponse {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed" | "cancelled")
    }
}

#[derive(Debug, Deserialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResultResponse {
    pub result: Value,
}

#[derive(Debug, Deserialize)]
pub struct ReconcileResponse {
    pub outcome: Value,
}

impl CallwatchClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    fn call_url(&self, job_id: &str, suffix: &str) -> String {
        format!(
            "{}/api/calls/{}{}",
            self.base_url,
            urlencoding::encode(job_id),
            suffix
        )
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let resp = request
            .send()
            .await
            .context("Failed to connect to Callwatch API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("API error ({}): {}", status, body);
        }

        resp.json().await.context("Failed to parse response")
    }

    pub async fn health(&self) -> Result<Value> {
        let url = format!("{}/health", self.base_url);
        self.send(self.client.get(&url)).await
    }

    pub async fn start_call(&self, request: &StartCallRequest) -> Result<StartCallResponse> {
        let url = format!("{}/api/calls", self.base_url);
        self.send(self.client.post(&url).json(request)).await
    }

    pub async fn list_calls(&self) -> Result<Vec<SessionResponse>> {
        let url = format!("{}/api/calls", self.base_url);
        self.send(self.client.get(&url)).await
    }

    pub async fn get_call(&self, job_id: &str) -> Result<SessionResponse> {
        self.send(self.client.get(self.call_url(job_id, ""))).await
    }

    pub async fn forget_call(&self, job_id: &str) -> Result<SessionResponse> {
        self.send(self.client.delete(self.call_url(job_id, ""))).await
    }

    pub async fn stop_call(&self, job_id: &str) -> Result<StopResponse> {
        self.send(self.client.post(self.call_url(job_id, "/stop")))
            .await
    }

    pub async fn reconcile(&self, job_id: &str) -> Result<ReconcileResponse> {
        self.send(self.client.post(self.call_url(job_id, "/reconcile")))
            .await
    }

    pub async fn result(&self, job_id: &str) -> Result<ResultResponse> {
        self.send(self.client.get(self.call_url(job_id, "/result")))
            .await
    }

    pub async fn diagnostics(&self, job_id: &str) -> Result<Value> {
        self.send(self.client.get(self.call_url(job_id, "/diagnostics")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_url_encodes_job_id() {
        let client = CallwatchClient::new("http://localhost:5001/", None);
        assert_eq!(
            client.call_url("job 1", "/result"),
            "http://localhost:5001/api/calls/job%201/result"
        );
    }

    #[test]
    fn test_start_request_omits_unset_fields() {
        let request = StartCallRequest {
            phone_number: "+34699043286".to_string(),
            questions: vec!["What is your name?".to_string()],
            ..StartCallRequest::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["phone_number"], "+34699043286");
        assert!(json.get("agent_name").is_none());
    }
}
