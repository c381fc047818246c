//! Answer generation with primary/secondary failover.
//!
//! The backend sequence is an explicit state machine:
//! `Primary -> (Primary retry) -> Secondary -> Failed`. Timeouts skip the
//! primary retry. Every call runs on a detached task, so a caller that goes
//! away leaves the in-flight call to finish and its result is dropped.

use super::memory::ConversationTurn;
use super::types::RetrievalCandidate;
use crate::types::GenerationConfig;
use manualqa_core::AppResult;
use manualqa_llm::{BackendFault, LlmClient, LlmRequest};
use manualqa_prompt::{build_prompt, PromptDefinition};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Which configured backend served or failed a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Primary,
    Secondary,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running the failover sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Answered {
        text: String,
        backend: Backend,
        /// Backend calls made, failed ones included
        attempts: usize,
    },
    /// Every permitted call failed.
    Exhausted { faults: Vec<(Backend, BackendFault)> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailoverState {
    Primary { retried: bool },
    Secondary,
    Failed,
}

impl FailoverState {
    fn after(self, fault: &BackendFault, retry_primary: bool) -> Self {
        match self {
            Self::Primary { retried: false } if retry_primary && !fault.is_timeout() => {
                Self::Primary { retried: true }
            }
            Self::Primary { .. } => Self::Secondary,
            Self::Secondary | Self::Failed => Self::Failed,
        }
    }
}

/// Builds answer requests and runs them against the configured backends.
pub struct Generator {
    primary: Arc<dyn LlmClient>,
    secondary: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    config: GenerationConfig,
}

impl Generator {
    pub fn new(
        primary: Arc<dyn LlmClient>,
        secondary: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        config: GenerationConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            prompt,
            config,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Render the answer prompt for `query`.
    ///
    /// Excerpts are labelled `Excerpt 1..n` in ranking order. `history` is
    /// rendered oldest first.
    pub fn build_request(
        &self,
        query: &str,
        context: &[RetrievalCandidate],
        history: &[ConversationTurn],
    ) -> AppResult<LlmRequest> {
        let context: Vec<Value> = context
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                json!({
                    "label": format!("Excerpt {}", i + 1),
                    "page": candidate.chunk.page,
                    "section": candidate.chunk.section_title,
                    "text": candidate.chunk.text,
                })
            })
            .collect();

        let history: Vec<Value> = history
            .iter()
            .map(|turn| json!({ "query": turn.query, "answer": turn.answer }))
            .collect();

        let data = json!({
            "query": query,
            "context": context,
            "history": history,
        });

        let built = build_prompt(&self.prompt, &data)?;

        let mut request = LlmRequest::new(built.user, self.primary.model_name())
            .with_system(built.system)
            .with_temperature(built.metadata.temperature);
        if let Some(max_tokens) = built.metadata.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        Ok(request)
    }

    /// Run `request` through the failover sequence, never past `deadline`.
    pub async fn generate(&self, request: &LlmRequest, deadline: Instant) -> GenerationOutcome {
        let mut state = FailoverState::Primary { retried: false };
        let mut faults = Vec::new();
        let mut attempts = 0;

        loop {
            let (backend, client, limit) = match state {
                FailoverState::Primary { .. } => {
                    (Backend::Primary, &self.primary, self.config.primary_timeout())
                }
                FailoverState::Secondary => {
                    (Backend::Secondary, &self.secondary, self.config.secondary_timeout())
                }
                FailoverState::Failed => {
                    tracing::error!(attempts, "All inference backends failed");
                    return GenerationOutcome::Exhausted { faults };
                }
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(backend = %backend, "Request budget spent before backend call");
                faults.push((backend, BackendFault::Timeout(Duration::ZERO)));
                state = FailoverState::Failed;
                continue;
            }

            attempts += 1;
            let started = Instant::now();
            let call = request.for_model(client.model_name());

            match call_detached(Arc::clone(client), call, limit.min(remaining)).await {
                Ok(text) => {
                    tracing::info!(
                        backend = %backend,
                        model = client.model_name(),
                        attempts,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "Answer generated"
                    );
                    return GenerationOutcome::Answered {
                        text,
                        backend,
                        attempts,
                    };
                }
                Err(fault) => {
                    tracing::warn!(
                        backend = %backend,
                        model = client.model_name(),
                        fault = fault.kind(),
                        error = %fault,
                        "Backend call failed"
                    );
                    state = state.after(&fault, self.config.retry_primary);
                    faults.push((backend, fault));
                }
            }
        }
    }
}

/// One backend call on its own task, bounded by `limit`.
///
/// On timeout the join handle is dropped, which detaches the task; whatever
/// it eventually returns is discarded.
async fn call_detached(
    client: Arc<dyn LlmClient>,
    request: LlmRequest,
    limit: Duration,
) -> Result<String, BackendFault> {
    let handle = tokio::spawn(async move { client.complete(&request).await });

    match timeout(limit, handle).await {
        Err(_) => Err(BackendFault::Timeout(limit)),
        Ok(Err(join_error)) => Err(BackendFault::Unavailable(format!(
            "backend task failed: {}",
            join_error
        ))),
        Ok(Ok(Err(fault))) => Err(fault),
        Ok(Ok(Ok(response))) if response.content.trim().is_empty() => {
            Err(BackendFault::Malformed("empty response".to_string()))
        }
        Ok(Ok(Ok(response))) => Ok(response.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::tests::support::{ScriptedBackend, Step};
    use manualqa_prompt::default_answer_prompt;

    fn generator(primary: Arc<ScriptedBackend>, secondary: Arc<ScriptedBackend>) -> Generator {
        Generator::new(
            primary,
            secondary,
            default_answer_prompt().unwrap(),
            GenerationConfig::default(),
        )
    }

    fn candidate(page: u32, text: &str) -> RetrievalCandidate {
        RetrievalCandidate {
            chunk: Chunk {
                id: format!("c{}", page),
                text: text.to_string(),
                source_doc: "Manual".to_string(),
                page,
                section_title: Some("Chapter 2".to_string()),
                word_count: text.split_whitespace().count(),
                numeric_flag: false,
            },
            vector_score: 0.8,
            vector_rank: 0,
            rerank_score: Some(0.8),
            boosted_score: 0.8,
            passes_filters: true,
        }
    }

    fn request() -> LlmRequest {
        LlmRequest::new("Question: what is a PC-I?", "primary-model").with_system("rules")
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(15)
    }

    #[test]
    fn test_failover_transitions() {
        let unavailable = BackendFault::Unavailable("refused".into());
        let timed_out = BackendFault::Timeout(Duration::from_secs(8));
        let first = FailoverState::Primary { retried: false };

        assert_eq!(first.after(&unavailable, true), FailoverState::Primary { retried: true });
        assert_eq!(first.after(&unavailable, false), FailoverState::Secondary);
        assert_eq!(first.after(&timed_out, true), FailoverState::Secondary);
        assert_eq!(
            FailoverState::Primary { retried: true }.after(&unavailable, true),
            FailoverState::Secondary
        );
        assert_eq!(FailoverState::Secondary.after(&unavailable, true), FailoverState::Failed);
    }

    #[test]
    fn test_build_request_renders_context_and_history() {
        let gen = generator(
            ScriptedBackend::new("primary-model", vec![]),
            ScriptedBackend::new("secondary-model", vec![]),
        );
        let history = vec![ConversationTurn::new("Who prepares it?", "The sponsoring agency.", vec![])];
        let request = gen
            .build_request(
                "What is its purpose?",
                &[candidate(4, "The PC-I is the basic project document.")],
                &history,
            )
            .unwrap();

        assert_eq!(request.model, "primary-model");
        assert!(request.prompt.contains("[Excerpt 1] (page 4, Chapter 2)"));
        assert!(request.prompt.contains("The PC-I is the basic project document."));
        assert!(request.prompt.contains("Q: Who prepares it?"));
        assert!(request.prompt.ends_with("Question: What is its purpose?"));
        assert!(request.system.as_deref().unwrap().contains("Not found in the Manual."));
        assert_eq!(request.max_tokens, Some(220));
    }

    #[tokio::test]
    async fn test_primary_answers() {
        let primary = ScriptedBackend::new("primary-model", vec![Step::Reply("The answer.")]);
        let secondary = ScriptedBackend::new("secondary-model", vec![]);
        let gen = generator(primary.clone(), secondary.clone());

        let outcome = gen.generate(&request(), deadline()).await;
        assert_eq!(
            outcome,
            GenerationOutcome::Answered {
                text: "The answer.".to_string(),
                backend: Backend::Primary,
                attempts: 1
            }
        );
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_retried_once_on_fault() {
        let primary = ScriptedBackend::new(
            "primary-model",
            vec![Step::Fail(BackendFault::Unavailable("503".into())), Step::Reply("Second try.")],
        );
        let secondary = ScriptedBackend::new("secondary-model", vec![]);
        let gen = generator(primary.clone(), secondary.clone());

        match gen.generate(&request(), deadline()).await {
            GenerationOutcome::Answered { backend, attempts, .. } => {
                assert_eq!(backend, Backend::Primary);
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_response_is_malformed() {
        let primary = ScriptedBackend::new("primary-model", vec![Step::Reply("  "), Step::Reply("")]);
        let secondary = ScriptedBackend::new("secondary-model", vec![Step::Reply("From secondary.")]);
        let gen = generator(primary.clone(), secondary.clone());

        match gen.generate(&request(), deadline()).await {
            GenerationOutcome::Answered { backend, attempts, .. } => {
                assert_eq!(backend, Backend::Secondary);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_over_with_identical_system_prompt() {
        let primary = ScriptedBackend::new("primary-model", vec![Step::Hang]);
        let secondary = ScriptedBackend::new("secondary-model", vec![Step::Reply("From secondary.")]);
        let gen = generator(primary.clone(), secondary.clone());

        let outcome = gen.generate(&request(), deadline()).await;
        assert!(matches!(
            outcome,
            GenerationOutcome::Answered { backend: Backend::Secondary, .. }
        ));
        // no retry after a timeout
        assert_eq!(primary.calls(), 1);

        let sent_primary = &primary.requests()[0];
        let sent_secondary = &secondary.requests()[0];
        assert_eq!(sent_primary.system, sent_secondary.system);
        assert_eq!(sent_primary.prompt, sent_secondary.prompt);
        assert_eq!(sent_secondary.model, "secondary-model");
    }

    #[tokio::test]
    async fn test_exhausted_after_budgeted_attempts() {
        let fault = || Step::Fail(BackendFault::Unavailable("down".into()));
        let primary = ScriptedBackend::new("primary-model", vec![fault(), fault(), fault()]);
        let secondary = ScriptedBackend::new("secondary-model", vec![fault(), fault()]);
        let gen = generator(primary.clone(), secondary.clone());

        match gen.generate(&request(), deadline()).await {
            GenerationOutcome::Exhausted { faults } => {
                let backends: Vec<_> = faults.iter().map(|(b, _)| *b).collect();
                assert_eq!(backends, vec![Backend::Primary, Backend::Primary, Backend::Secondary]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_bounded_by_remaining_budget() {
        let primary = ScriptedBackend::new("primary-model", vec![Step::Hang]);
        let secondary = ScriptedBackend::new("secondary-model", vec![Step::Hang]);
        let gen = generator(primary, secondary);

        let started = Instant::now();
        let outcome = gen.generate(&request(), started + Duration::from_secs(10)).await;

        match outcome {
            GenerationOutcome::Exhausted { faults } => {
                assert_eq!(faults[0].1, BackendFault::Timeout(Duration::from_secs(8)));
                assert_eq!(faults[1].1, BackendFault::Timeout(Duration::from_secs(2)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(started.elapsed() <= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spent_budget_skips_calls() {
        let primary = ScriptedBackend::new("primary-model", vec![Step::Reply("late")]);
        let secondary = ScriptedBackend::new("secondary-model", vec![]);
        let gen = generator(primary.clone(), secondary.clone());

        let outcome = gen.generate(&request(), Instant::now()).await;
        assert!(matches!(outcome, GenerationOutcome::Exhausted { .. }));
        assert_eq!(primary.calls(), 0);
        assert_eq!(secondary.calls(), 0);
    }
}
