//! Result Reconciler - Turns a finished conversation into a CallResult
//!
//! Reconciliation is pull-based. A miss counts as one attempt; after the
//! configured number of misses a diagnostic snapshot is stored instead of a
//! result, and every later call returns that snapshot without touching the
//! provider.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{
    AgentConfig, CallOutcome, CallResult, Confidence, ConversationDetail, DiagnosticSnapshot,
    ExtractedAnswer, ProviderAnswer, TrackerError,
};
use crate::ports::CallProvider;
use crate::services::diagnostics::DiagnosticsCollector;
use crate::services::extraction::{extract_answer, NOT_ANSWERED};
use crate::services::session_manager::{ReconcilePlan, SessionManager};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What one reconciliation call produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Result { result: CallResult },
    Diagnostic { snapshot: DiagnosticSnapshot },
    /// No matching conversation yet; try again later
    NotFound { attempts: u32, max_attempts: u32 },
}

impl ReconcileOutcome {
    fn settled(outcome: CallOutcome) -> Self {
        match outcome {
            CallOutcome::Result(result) => ReconcileOutcome::Result { result },
            CallOutcome::Diagnostic(snapshot) => ReconcileOutcome::Diagnostic { snapshot },
        }
    }
}

#[derive(Clone)]
pub struct ResultReconciler {
    provider: Arc<dyn CallProvider>,
    sessions: Arc<SessionManager>,
    diagnostics: DiagnosticsCollector,
    max_attempts: u32,
}

impl ResultReconciler {
    pub fn new(
        provider: Arc<dyn CallProvider>,
        sessions: Arc<SessionManager>,
        max_attempts: u32,
    ) -> Self {
        Self {
            diagnostics: DiagnosticsCollector::new(provider.clone()),
            provider,
            sessions,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fetch and normalize the conversation for a job.
    ///
    /// Provider errors are returned to the caller and do not count as an
    /// attempt. Neither do misses while the call is still live.
    pub async fn reconcile(&self, job_id: &str) -> Result<ReconcileOutcome, TrackerError> {
        let plan = self.sessions.plan_reconcile(job_id, self.max_attempts)?;
        let (agent_id, questions, completed) = match plan {
            ReconcilePlan::Settled(outcome) => return Ok(ReconcileOutcome::settled(outcome)),
            ReconcilePlan::Exhausted { agent_id, attempts } => {
                return self.give_up(job_id, &agent_id, attempts).await;
            }
            ReconcilePlan::Query {
                agent_id,
                questions,
                completed,
            } => (agent_id, questions, completed),
        };

        tracing::debug!(job_id, agent_id = %agent_id, "Reconciling");

        match self.provider.query_conversation(job_id, &agent_id).await? {
            Some(detail) => {
                let result = normalize_conversation(&questions, detail);
                tracing::info!(
                    job_id,
                    conversation_id = %result.conversation_id,
                    answers = result.extracted_info.len(),
                    "✅ Call result reconciled"
                );
                let stored = self
                    .sessions
                    .store_outcome(job_id, CallOutcome::Result(result))?;
                Ok(ReconcileOutcome::settled(stored))
            }
            None if !completed => {
                let attempts = self.sessions.get_session(job_id)?.attempts;
                tracing::debug!(job_id, "Call still live, miss not counted");
                Ok(ReconcileOutcome::NotFound {
                    attempts,
                    max_attempts: self.max_attempts,
                })
            }
            None => {
                let attempts = self.sessions.record_miss(job_id, self.max_attempts)?;
                if attempts >= self.max_attempts {
                    return self.give_up(job_id, &agent_id, attempts).await;
                }
                tracing::info!(
                    job_id,
                    attempts,
                    max_attempts = self.max_attempts,
                    "⏳ No conversation yet"
                );
                Ok(ReconcileOutcome::NotFound {
                    attempts,
                    max_attempts: self.max_attempts,
                })
            }
        }
    }

    async fn give_up(
        &self,
        job_id: &str,
        agent_id: &str,
        attempts: u32,
    ) -> Result<ReconcileOutcome, TrackerError> {
        tracing::warn!(
            job_id,
            attempts,
            "❌ No conversation matched, storing diagnostics"
        );
        let snapshot = self
            .diagnostics
            .collect_or_note(job_id, agent_id, attempts)
            .await;
        let stored = self
            .sessions
            .store_outcome(job_id, CallOutcome::Diagnostic(snapshot))?;
        Ok(ReconcileOutcome::settled(stored))
    }
}

/// Map a provider conversation onto the configured questions.
///
/// Each question is matched, in order of preference, to a provider answer
/// carrying its identifier or exact text, to the anonymous answer at the
/// same position, or to an answer extracted from the transcript. Transcript
/// answers are unscored.
pub fn normalize_conversation(questions: &[String], detail: ConversationDetail) -> CallResult {
    let mut used = vec![false; detail.answers.len()];
    let mut result = CallResult::new(detail.conversation_id.clone(), detail.transcript.clone());
    let mut heuristic = 0;

    for (index, question) in questions.iter().enumerate() {
        let id = AgentConfig::question_id(index);

        let matched = find_identified(&detail.answers, &used, &id, question).or_else(|| {
            detail
                .answers
                .get(index)
                .filter(|a| a.key.is_none() && a.question.is_none() && !used[index])
                .map(|_| index)
        });

        let entry = match matched {
            Some(i) => {
                used[i] = true;
                let answer = &detail.answers[i];
                ExtractedAnswer {
                    question: question.clone(),
                    answer: answer.answer.clone(),
                    confidence: Confidence::from_score(answer.confidence),
                }
            }
            None => {
                heuristic += 1;
                let answer = detail
                    .transcript
                    .as_text()
                    .map(|text| extract_answer(question, text))
                    .unwrap_or_else(|| NOT_ANSWERED.to_string());
                ExtractedAnswer {
                    question: question.clone(),
                    answer,
                    confidence: Confidence::Unscored,
                }
            }
        };

        result.extracted_info.insert(id, entry);
    }

    if heuristic > 0 {
        let note = if detail.transcript.as_text().is_some() {
            format!(
                "{} of {} answers extracted from the transcript",
                heuristic,
                questions.len()
            )
        } else {
            "transcript unavailable".to_string()
        };
        result = result.with_note(note);
    }

    result
}

fn find_identified(
    answers: &[ProviderAnswer],
    used: &[bool],
    id: &str,
    question: &str,
) -> Option<usize> {
    let wanted = question.trim().to_lowercase();
    answers
        .iter()
        .enumerate()
        .filter(|(i, _)| !used[*i])
        .find(|(_, a)| a.key.as_deref() == Some(id))
        .or_else(|| {
            answers.iter().enumerate().filter(|(i, _)| !used[*i]).find(|(_, a)| {
                a.question
                    .as_deref()
                    .is_some_and(|q| q.trim().to_lowercase() == wanted)
            })
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentConfig, CallStatus, ConversationRecord, Transcript, UpdateSource};
    use crate::services::testing::MockProvider;

    const QUESTIONS: [&str; 3] = [
        "What is your name?",
        "How satisfied are you with our service?",
        "Would you recommend us?",
    ];

    fn setup(provider: Arc<MockProvider>) -> (ResultReconciler, Arc<SessionManager>) {
        let sessions = Arc::new(SessionManager::new());
        sessions
            .create_session(
                "job_1",
                "+34699043286",
                "agent_1",
                AgentConfig::default().with_questions(QUESTIONS),
            )
            .unwrap();
        sessions.apply_update("job_1", CallStatus::Completed, 100, None, UpdateSource::Poll);
        let reconciler = ResultReconciler::new(provider, sessions.clone(), 5);
        (reconciler, sessions)
    }

    fn answer(key: Option<&str>, question: Option<&str>, text: &str) -> ProviderAnswer {
        ProviderAnswer {
            key: key.map(str::to_string),
            question: question.map(str::to_string),
            answer: text.to_string(),
            confidence: Some(0.9),
        }
    }

    fn questions() -> Vec<String> {
        QUESTIONS.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn test_answers_correlated_by_text_regardless_of_order() {
        let detail = ConversationDetail::new("conv_1", Transcript::Unavailable).with_answers(vec![
            answer(None, Some(QUESTIONS[2]), "Yes"),
            answer(None, Some(QUESTIONS[0]), "Ana"),
            answer(None, Some(QUESTIONS[1]), "9/10"),
        ]);

        let result = normalize_conversation(&questions(), detail);
        assert_eq!(result.extracted_info.len(), 3);
        assert_eq!(result.answer_for(QUESTIONS[0]).unwrap().answer, "Ana");
        assert_eq!(result.answer_for(QUESTIONS[1]).unwrap().answer, "9/10");
        assert_eq!(result.answer_for(QUESTIONS[2]).unwrap().answer, "Yes");
        assert_eq!(
            result.extracted_info["question_1"].confidence,
            Confidence::Scored(0.9)
        );
        assert!(result.note.is_none());
    }

    #[test]
    fn test_identifier_beats_position() {
        let detail = ConversationDetail::new("conv_1", Transcript::Unavailable).with_answers(vec![
            answer(Some("question_2"), None, "8"),
            answer(None, None, "Ana"),
        ]);

        let result = normalize_conversation(&questions(), detail);
        assert_eq!(result.extracted_info["question_2"].answer, "8");
        assert_eq!(result.extracted_info["question_1"].answer, NOT_ANSWERED);
        assert_eq!(result.extracted_info["question_1"].confidence, Confidence::Unscored);
        assert_eq!(result.note.as_deref(), Some("transcript unavailable"));
    }

    #[test]
    fn test_positional_and_transcript_fallback() {
        let transcript = Transcript::Text("user: My name is Ana.\nuser: Yes, I would recommend you to friends.".into());
        let detail = ConversationDetail::new("conv_1", transcript)
            .with_answers(vec![answer(None, None, "Ana Lopez")]);

        let result = normalize_conversation(&questions(), detail);
        assert_eq!(result.extracted_info["question_1"].answer, "Ana Lopez");
        assert_eq!(result.extracted_info["question_2"].confidence, Confidence::Unscored);
        assert!(result.extracted_info["question_3"].answer.contains("recommend"));
        assert_eq!(
            result.note.as_deref(),
            Some("2 of 3 answers extracted from the transcript")
        );
    }

    #[test]
    fn test_duplicate_question_text_gets_two_entries() {
        let qs = vec!["Any comments?".to_string(), "Any comments?".to_string()];
        let detail = ConversationDetail::new("conv_1", Transcript::Unavailable).with_answers(vec![
            answer(None, Some("Any comments?"), "first"),
            answer(None, Some("Any comments?"), "second"),
        ]);

        let result = normalize_conversation(&qs, detail);
        assert_eq!(result.extracted_info["question_1"].answer, "first");
        assert_eq!(result.extracted_info["question_2"].answer, "second");
    }

    #[tokio::test]
    async fn test_found_conversation_is_stored() {
        let provider = Arc::new(MockProvider::new());
        provider.set_conversation(
            "job_1",
            ConversationDetail::new("conv_1", Transcript::Unavailable),
        );
        let (reconciler, sessions) = setup(provider.clone());

        let outcome = reconciler.reconcile("job_1").await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Result { .. }));

        reconciler.reconcile("job_1").await.unwrap();
        assert_eq!(provider.conversation_queries(), 1);
        assert!(sessions.get_session("job_1").unwrap().outcome.is_some());
    }

    #[tokio::test]
    async fn test_exhaustion_stores_snapshot() {
        let provider = Arc::new(MockProvider::new());
        provider.set_records(vec![ConversationRecord::from_raw(serde_json::json!({
            "conversation_id": "c9",
            "agent_id": "agent_1",
            "batch_call_id": "other_job",
        }))
        .unwrap()]);
        let (reconciler, _sessions) = setup(provider.clone());

        for attempt in 1..5 {
            assert_eq!(
                reconciler.reconcile("job_1").await.unwrap(),
                ReconcileOutcome::NotFound {
                    attempts: attempt,
                    max_attempts: 5
                }
            );
        }

        let ReconcileOutcome::Diagnostic { snapshot } = reconciler.reconcile("job_1").await.unwrap()
        else {
            panic!("expected diagnostics");
        };
        assert_eq!(snapshot.attempts, 5);
        assert_eq!(snapshot.seen_job_ids(), vec!["other_job"]);

        let queries = provider.conversation_queries();
        let again = reconciler.reconcile("job_1").await.unwrap();
        assert!(matches!(again, ReconcileOutcome::Diagnostic { .. }));
        assert_eq!(provider.conversation_queries(), queries);
        assert_eq!(provider.listing_queries(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_does_not_count() {
        let provider = Arc::new(MockProvider::new());
        provider.fail_conversation(true);
        let (reconciler, sessions) = setup(provider.clone());

        let err = reconciler.reconcile("job_1").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(sessions.get_session("job_1").unwrap().attempts, 0);
    }

    #[tokio::test]
    async fn test_failed_call_rejected() {
        let provider = Arc::new(MockProvider::new());
        let sessions = Arc::new(SessionManager::new());
        sessions
            .create_session("job_2", "+34699043286", "agent_1", AgentConfig::default())
            .unwrap();
        sessions.apply_update("job_2", CallStatus::Failed, 5, None, UpdateSource::Push);
        let reconciler = ResultReconciler::new(provider.clone(), sessions, 5);

        assert!(matches!(
            reconciler.reconcile("job_2").await,
            Err(TrackerError::NotReconcilable { .. })
        ));
        assert_eq!(provider.conversation_queries(), 0);
    }

    #[tokio::test]
    async fn test_live_call_misses_not_counted() {
        let provider = Arc::new(MockProvider::new());
        let sessions = Arc::new(SessionManager::new());
        sessions
            .create_session(
                "job_3",
                "+34699043286",
                "agent_1",
                AgentConfig::default().with_questions(QUESTIONS),
            )
            .unwrap();
        sessions.apply_update("job_3", CallStatus::InProgress, 100, None, UpdateSource::Poll);
        let reconciler = ResultReconciler::new(provider.clone(), sessions.clone(), 3);

        for _ in 0..6 {
            let outcome = reconciler.reconcile("job_3").await.unwrap();
            assert!(matches!(
                outcome,
                ReconcileOutcome::NotFound { attempts: 0, max_attempts: 3 }
            ));
        }
        assert_eq!(provider.conversation_queries(), 6);
        assert!(sessions.get_session("job_3").unwrap().outcome.is_none());

        provider.set_conversation(
            "job_3",
            ConversationDetail::new("conv_3", Transcript::Unavailable),
        );
        sessions.apply_update("job_3", CallStatus::Completed, 200, None, UpdateSource::Poll);
        let outcome = reconciler.reconcile("job_3").await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Result { .. }));
        assert_eq!(sessions.get_session("job_3").unwrap().attempts, 0);
    }
}
