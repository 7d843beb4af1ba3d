//! ElevenLabs Conversational AI Provider
//!
//! Implements `CallProvider` over the ElevenLabs REST API using reqwest.
//! Every call gets its own agent; the call itself is a one-recipient batch.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use callwatch::domain::select_conversation;
use callwatch::{
    AgentConfig, CallJob, CallProvider, CallStatus, ConversationDetail, ConversationRecord,
    DispatchedCall, ProviderAnswer, StatusReport, TrackerError, Transcript,
};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Conversation states that mean the transcript is not final yet
const UNFINISHED: &[&str] = &["initiated", "in-progress", "in_progress", "processing"];

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    pub phone_number_id: String,
    pub timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            phone_number_id: phone_number_id.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP implementation of CallProvider
pub struct ElevenLabsProvider {
    client: Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsProvider {
    pub fn new(config: ElevenLabsConfig) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("callwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TrackerError::unavailable)?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header("xi-api-key", &self.config.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .header("xi-api-key", &self.config.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TrackerError> {
        request.send().await.map_err(TrackerError::unavailable)
    }

    async fn create_agent(&self, agent: &AgentConfig) -> Result<String, TrackerError> {
        let response = self
            .send(self.post("/convai/agents/create").json(&agent_payload(agent)))
            .await?;
        let body = rejected_on_client_error(response, "agent creation").await?;

        body.get("agent_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TrackerError::unavailable("agent creation returned no agent_id"))
    }

    async fn submit_batch(&self, agent_id: &str, phone_number: &str) -> Result<String, TrackerError> {
        let payload = json!({
            "call_name": format!("AI Call to {}", phone_number),
            "agent_id": agent_id,
            "agent_phone_number_id": self.config.phone_number_id,
            "scheduled_time_unix": chrono::Utc::now().timestamp(),
            "recipients": [{ "phone_number": phone_number }],
        });
        let response = self
            .send(self.post("/convai/batch-calling/submit").json(&payload))
            .await?;
        let body = rejected_on_client_error(response, "batch submission").await?;

        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TrackerError::unavailable("batch submission returned no id"))
    }

    async fn batch(&self, job_id: &str) -> Result<Value, TrackerError> {
        let response = self
            .send(self.get(&format!("/convai/batch-calling/{}", job_id)))
            .await?;
        expect_json(response, "batch status").await
    }

    async fn conversation(&self, conversation_id: &str) -> Result<Option<Value>, TrackerError> {
        let response = self
            .send(self.get(&format!("/convai/conversations/{}", conversation_id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_json(response, "conversation").await.map(Some)
    }
}

#[async_trait]
impl CallProvider for ElevenLabsProvider {
    async fn dispatch_call(&self, job: &CallJob) -> Result<DispatchedCall, TrackerError> {
        let agent_id = self.create_agent(&job.agent).await?;
        tracing::info!(agent_id = %agent_id, name = %job.agent.name, "🤖 Agent created");

        let job_id = self.submit_batch(&agent_id, &job.phone_number).await?;
        Ok(DispatchedCall { job_id, agent_id })
    }

    async fn query_status(&self, job_id: &str) -> Result<StatusReport, TrackerError> {
        let batch = self.batch(job_id).await?;
        parse_status_report(&batch, chrono::Utc::now().timestamp())
    }

    async fn query_conversation(
        &self,
        job_id: &str,
        agent_id: &str,
    ) -> Result<Option<ConversationDetail>, TrackerError> {
        // The batch links its recipients' conversations directly
        let linked = self
            .batch(job_id)
            .await
            .ok()
            .and_then(|batch| recipient_conversation_id(&batch));

        let conversation_id = match linked {
            Some(id) => id,
            None => {
                let records = self.list_conversations(agent_id).await?;
                match select_conversation(&records, job_id, agent_id) {
                    Some(record) => record.conversation_id.clone(),
                    None => return Ok(None),
                }
            }
        };

        let Some(raw) = self.conversation(&conversation_id).await? else {
            return Ok(None);
        };

        let status = raw.get("status").and_then(Value::as_str).unwrap_or_default();
        if UNFINISHED.contains(&status) {
            tracing::debug!(job_id, conversation_id = %conversation_id, status, "Conversation not final yet");
            return Ok(None);
        }

        Ok(Some(parse_conversation_detail(&conversation_id, &raw)))
    }

    async fn list_conversations(
        &self,
        agent_id: &str,
    ) -> Result<Vec<ConversationRecord>, TrackerError> {
        let response = self
            .send(
                self.get("/convai/conversations")
                    .query(&[("agent_id", agent_id)]),
            )
            .await?;
        let body = expect_json(response, "conversation listing").await?;

        Ok(body
            .get("conversations")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .cloned()
                    .filter_map(ConversationRecord::from_raw)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }
}

/// 4xx means the provider rejected our input; anything else non-2xx is
/// treated as the provider being unavailable.
async fn rejected_on_client_error(response: Response, what: &str) -> Result<Value, TrackerError> {
    let status = response.status();
    if status.is_client_error() {
        let text = response.text().await.unwrap_or_default();
        return Err(TrackerError::dispatch(format!(
            "{} rejected: {} - {}",
            what, status, text
        )));
    }
    expect_json(response, what).await
}

async fn expect_json(response: Response, what: &str) -> Result<Value, TrackerError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(TrackerError::unavailable(format!(
            "{} failed: {} - {}",
            what, status, text
        )));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| TrackerError::unavailable(format!("{}: invalid JSON: {}", what, e)))
}

/// Agent creation payload. Each question becomes a data-collection item so
/// the provider reports answers under `question_N`.
pub fn agent_payload(agent: &AgentConfig) -> Value {
    let data_collection: serde_json::Map<String, Value> = agent
        .questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            (
                AgentConfig::question_id(i),
                json!({ "type": "string", "description": question }),
            )
        })
        .collect();

    json!({
        "name": agent.name,
        "conversation_config": {
            "agent": {
                "prompt": { "prompt": agent_prompt(agent) },
                "first_message": agent.effective_first_message(),
                "language": agent.language,
            },
            "asr": { "quality": "high" },
            "tts": { "voice_id": agent.voice_id },
        },
        "platform_settings": {
            "data_collection": data_collection,
        },
    })
}

/// System prompt forwarded to the provider
pub fn agent_prompt(agent: &AgentConfig) -> String {
    let mut prompt = format!("You are {}, calling to {}.\n", agent.name, agent.purpose);

    if agent.questions.is_empty() {
        prompt.push_str("\nHave a natural, friendly conversation. Be professional and helpful.\n");
    } else {
        prompt.push_str("\nAsk these questions one at a time, waiting for each answer:\n\n");
        for (i, question) in agent.questions.iter().enumerate() {
            prompt.push_str(&format!("   {}. {}\n", i + 1, question));
        }
        prompt.push_str(&format!(
            "\nAfter all {} answers, thank them and end the call. \
             If they don't understand a question, rephrase it simply.\n",
            agent.questions.len()
        ));
    }

    if !agent.custom_prompt.trim().is_empty() {
        prompt.push_str("\nADDITIONAL INSTRUCTIONS:\n");
        prompt.push_str(agent.custom_prompt.trim());
        prompt.push('\n');
    }
    prompt
}

/// Status of a batch call. `now` stands in when the batch carries no
/// update time.
pub fn parse_status_report(batch: &Value, now: i64) -> Result<StatusReport, TrackerError> {
    let raw = batch
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| TrackerError::unavailable("batch status missing"))?;
    let status = CallStatus::from_provider(raw)
        .ok_or_else(|| TrackerError::unavailable(format!("unrecognized batch status: {}", raw)))?;

    let last_update = ["last_updated_at_unix", "created_at_unix"]
        .iter()
        .find_map(|key| batch.get(*key).and_then(Value::as_i64))
        .unwrap_or(now);

    Ok(StatusReport {
        status,
        last_update,
        embedded_results: None,
    })
}

fn recipient_conversation_id(batch: &Value) -> Option<String> {
    batch
        .get("recipients")?
        .as_array()?
        .iter()
        .find_map(|r| r.get("conversation_id").and_then(Value::as_str))
        .map(str::to_string)
}

/// Transcript and data-collection answers of a conversation
pub fn parse_conversation_detail(conversation_id: &str, raw: &Value) -> ConversationDetail {
    let transcript = raw
        .get("transcript")
        .map(Transcript::from_raw)
        .unwrap_or(Transcript::Unavailable);

    let answers = raw
        .pointer("/analysis/data_collection_results")
        .and_then(Value::as_object)
        .map(|results| {
            results
                .iter()
                .filter_map(|(key, entry)| {
                    let answer = match entry.get("value")? {
                        Value::Null => return None,
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Some(ProviderAnswer {
                        key: Some(key.clone()),
                        question: entry
                            .pointer("/json_schema/description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        answer,
                        confidence: entry.get("confidence").and_then(Value::as_f64),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    ConversationDetail::new(conversation_id, transcript).with_answers(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer) -> ElevenLabsProvider {
        let mut config = ElevenLabsConfig::new("xi-test", "phnum_1");
        config.base_url = server.uri();
        ElevenLabsProvider::new(config).unwrap()
    }

    fn agent() -> AgentConfig {
        AgentConfig::new("Survey Bot", "collect feedback")
            .with_questions(["What is your name?", "How satisfied are you?"])
    }

    #[test]
    fn test_agent_payload_collects_questions() {
        let payload = agent_payload(&agent());
        assert_eq!(
            payload["platform_settings"]["data_collection"]["question_2"]["description"],
            "How satisfied are you?"
        );
        let prompt = payload["conversation_config"]["agent"]["prompt"]["prompt"]
            .as_str()
            .unwrap();
        assert!(prompt.contains("1. What is your name?"));
    }

    #[test]
    fn test_status_report_parsing() {
        let report = parse_status_report(
            &json!({"status": "in_progress", "last_updated_at_unix": 1700}),
            9999,
        )
        .unwrap();
        assert_eq!(report.status, CallStatus::InProgress);
        assert_eq!(report.last_update, 1700);

        let report = parse_status_report(&json!({"status": "pending"}), 9999).unwrap();
        assert_eq!(report.last_update, 9999);

        assert!(parse_status_report(&json!({"status": "weird"}), 0).is_err());
    }

    #[test]
    fn test_conversation_detail_parsing() {
        let raw = json!({
            "status": "done",
            "transcript": [
                {"role": "agent", "message": "What is your name?"},
                {"role": "user", "message": "Ana"}
            ],
            "analysis": {
                "data_collection_results": {
                    "question_1": {
                        "value": "Ana",
                        "json_schema": {"description": "What is your name?"}
                    },
                    "question_2": {"value": null}
                }
            }
        });

        let detail = parse_conversation_detail("conv_1", &raw);
        assert_eq!(detail.answers.len(), 1);
        assert_eq!(detail.answers[0].key.as_deref(), Some("question_1"));
        assert_eq!(
            detail.transcript.as_text(),
            Some("agent: What is your name?\nuser: Ana")
        );
    }

    #[tokio::test]
    async fn test_dispatch_creates_agent_then_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/convai/agents/create"))
            .and(header("xi-api-key", "xi-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"agent_id": "agent_7"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/convai/batch-calling/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "btcal_7"})))
            .expect(1)
            .mount(&server)
            .await;

        let job = CallJob::new("+34699043286", agent()).unwrap();
        let dispatched = provider(&server).await.dispatch_call(&job).await.unwrap();
        assert_eq!(dispatched.job_id, "btcal_7");
        assert_eq!(dispatched.agent_id, "agent_7");
    }

    #[tokio::test]
    async fn test_rejected_dispatch_is_dispatch_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/convai/agents/create"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad voice"))
            .mount(&server)
            .await;

        let job = CallJob::new("+34699043286", agent()).unwrap();
        let err = provider(&server).await.dispatch_call(&job).await.unwrap_err();
        assert!(matches!(err, TrackerError::Dispatch(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/convai/batch-calling/btcal_1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server).await.query_status("btcal_1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_conversation_found_through_agent_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/convai/batch-calling/btcal_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/convai/conversations"))
            .and(query_param("agent_id", "agent_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [
                    {"conversation_id": "conv_old", "agent_id": "agent_1", "start_time_unix_secs": 10},
                    {"conversation_id": "conv_new", "agent_id": "agent_1", "start_time_unix_secs": 20}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/convai/conversations/conv_new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "done",
                "transcript": "user: hi"
            })))
            .mount(&server)
            .await;

        let detail = provider(&server)
            .await
            .query_conversation("btcal_1", "agent_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.conversation_id, "conv_new");
    }

    #[tokio::test]
    async fn test_no_conversation_yet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/convai/batch-calling/btcal_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "recipients": [{"conversation_id": "conv_1"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/convai/conversations/conv_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
            .mount(&server)
            .await;

        let found = provider(&server)
            .await
            .query_conversation("btcal_1", "agent_1")
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
