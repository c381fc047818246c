//! The answering pipeline.
//!
//! query -> classify -> (template | retrieve -> generate -> post-process).
//! Every outcome, failures included, resolves to deterministic text.

use super::generate::{GenerationOutcome, Generator};
use super::memory::{ConversationTurn, SessionStore};
use super::postprocess::AnswerFormatter;
use super::retrieve::Retriever;
use super::types::{AssistantReply, Citation};
use crate::router::{template_response, Category, Classification, QueryClassifier};
use manualqa_prompt::guardrails::keys;
use manualqa_prompt::GuardrailTemplates;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};

/// Answers Manual questions for many concurrent sessions.
pub struct ManualAssistant {
    classifier: Arc<QueryClassifier>,
    templates: Arc<GuardrailTemplates>,
    retriever: Retriever,
    generator: Generator,
    formatter: AnswerFormatter,
    sessions: Arc<dyn SessionStore>,
}

impl ManualAssistant {
    pub fn new(
        classifier: Arc<QueryClassifier>,
        templates: Arc<GuardrailTemplates>,
        retriever: Retriever,
        generator: Generator,
        formatter: AnswerFormatter,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            classifier,
            templates,
            retriever,
            generator,
            formatter,
            sessions,
        }
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Answer `query` within the session `session_id`.
    pub async fn submit(&self, query: &str, session_id: &str) -> AssistantReply {
        let classification = self.classifier.classify(query);
        tracing::info!(
            category = %classification.category,
            confidence = classification.confidence,
            should_retrieve = classification.should_retrieve,
            "Query classified"
        );

        if !classification.should_retrieve {
            let text = template_response(&self.templates, &classification)
                .unwrap_or_else(|| self.templates.lookup(&[keys::FALLBACK]));
            return AssistantReply {
                answer: text.to_string(),
                citations: Vec::new(),
                used_rag: false,
                category: classification.category,
            };
        }

        self.sessions.evict_expired().await;

        let deadline = Instant::now() + self.generator.config().request_timeout();
        match timeout_at(deadline, self.answer(query, session_id, &classification, deadline)).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::warn!(session_id, "Request budget exceeded");
                self.fixed(keys::TIMEOUT, classification.category)
            }
        }
    }

    /// Forget the conversation history of `session_id`.
    pub async fn clear_session(&self, session_id: &str) {
        self.sessions.clear(session_id).await;
    }

    async fn answer(
        &self,
        query: &str,
        session_id: &str,
        classification: &Classification,
        deadline: Instant,
    ) -> AssistantReply {
        let category = classification.category;

        // Held until the turn is appended
        let session = self.sessions.session(session_id).await;
        let mut session = session.lock().await;
        session.touch();
        let history = session.last_n(self.generator.config().history_turns);

        let candidates = match self
            .retriever
            .retrieve(query, &classification.retrieval_hints, category.retrieval_mode())
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Retrieval failed");
                return self.fixed(keys::RETRIEVAL_UNAVAILABLE, category);
            }
        };

        if candidates.is_empty() {
            return AssistantReply {
                answer: self.formatter.not_found().to_string(),
                citations: Vec::new(),
                used_rag: true,
                category,
            };
        }

        let request = match self.generator.build_request(query, &candidates, &history) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build answer prompt");
                return self.fixed(keys::SERVICE_UNAVAILABLE, category);
            }
        };

        let raw = match self.generator.generate(&request, deadline).await {
            GenerationOutcome::Answered { text, .. } => text,
            GenerationOutcome::Exhausted { .. } => {
                return self.fixed(keys::SERVICE_UNAVAILABLE, category);
            }
        };

        let citations: Vec<Citation> = candidates.iter().map(|c| Citation::of(&c.chunk)).collect();
        let formatted = self.formatter.format(&raw, &citations);

        session.append(ConversationTurn::new(
            query,
            formatted.text.clone(),
            formatted.citations.clone(),
        ));

        AssistantReply {
            answer: formatted.text,
            citations: formatted.citations,
            used_rag: true,
            category,
        }
    }

    fn fixed(&self, key: &str, category: Category) -> AssistantReply {
        AssistantReply {
            answer: self.templates.lookup(&[key]).to_string(),
            citations: Vec::new(),
            used_rag: true,
            category,
        }
    }
}
