//! Scripted backends and fixtures shared by the pipeline tests.

use crate::chunk::{word_count, Chunk, TextPatterns};
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::rag::{AnswerFormatter, Generator, InMemorySessionStore, ManualAssistant, Retriever};
use crate::rerank::LexicalReranker;
use crate::router::QueryClassifier;
use crate::types::KnowledgeBaseConfig;
use crate::vector_index::{MemoryIndex, VectorIndex};
use async_trait::async_trait;
use manualqa_core::{AppError, AppResult};
use manualqa_llm::{BackendFault, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use manualqa_prompt::{default_answer_prompt, GuardrailTemplates};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What a scripted backend does on its next call.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(&'static str),
    Fail(BackendFault),
    /// Never completes
    Hang,
}

/// Inference backend that plays back a fixed script and records requests.
///
/// Once the script runs out every call fails as unavailable.
pub struct ScriptedBackend {
    model: String,
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedBackend {
    pub fn new(model: &str, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            model: model.to_string(),
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedBackend {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, BackendFault> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(Step::Reply(text)) => Ok(LlmResponse {
                content: text.to_string(),
                model: self.model.clone(),
                usage: LlmUsage::new(100, 20),
            }),
            Some(Step::Fail(fault)) => Err(fault),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(BackendFault::Unavailable("script exhausted".to_string())),
        }
    }
}

/// Page 3 of the fixture manual.
pub const PURPOSE: &str = "The PC-I is the basic planning document for every development project in the public sector. \
    Its purpose is to set out the objectives, the scope, the cost estimates, the financing plan and the implementation \
    schedule so that the competent forum can appraise the project and decide on its approval.";

/// Page 7 of the fixture manual.
pub const APPROVAL: &str = "Projects costing up to Rs. 2,000 million are approved by the provincial development working party. \
    Projects above that limit are forwarded to the central development working party, which examines the appraisal and \
    recommends them to the executive committee for final approval within the prescribed time.";

/// Page 12 of the fixture manual.
pub const MONITORING: &str = "Progress of every ongoing project is monitored through the PC-III form, which the executing agency \
    submits each quarter. The form reports physical progress against the approved targets, the funds released and utilised, \
    and any problems that need the attention of the sponsoring department or the planning authorities.";

pub fn manual_chunk(page: u32, text: &str) -> Chunk {
    let patterns = TextPatterns::new().unwrap();
    Chunk {
        id: format!("manual-{}", page),
        text: text.to_string(),
        source_doc: "Manual".to_string(),
        page,
        section_title: None,
        word_count: word_count(text),
        numeric_flag: patterns.has_numeric_marker(text),
    }
}

/// The three fixture pages embedded with the trigram provider.
pub async fn manual_index() -> Arc<MemoryIndex> {
    let embedder = TrigramProvider::new(384);
    let index = Arc::new(MemoryIndex::new());
    for (page, text) in [(3, PURPOSE), (7, APPROVAL), (12, MONITORING)] {
        let chunk = manual_chunk(page, text);
        let embedding = embedder.embed(&chunk.text).await.unwrap();
        index.upsert(&chunk, &embedding).await.unwrap();
    }
    index
}

/// Assistant over the fixture manual with scripted backends.
pub struct Harness {
    pub assistant: ManualAssistant,
    pub primary: Arc<ScriptedBackend>,
    pub secondary: Arc<ScriptedBackend>,
}

pub async fn harness(primary: Vec<Step>, secondary: Vec<Step>) -> Harness {
    harness_with(
        KnowledgeBaseConfig::default(),
        Arc::new(TrigramProvider::new(384)),
        primary,
        secondary,
    )
    .await
}

pub async fn harness_with(
    config: KnowledgeBaseConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    primary: Vec<Step>,
    secondary: Vec<Step>,
) -> Harness {
    let primary = ScriptedBackend::new("primary-model", primary);
    let secondary = ScriptedBackend::new("secondary-model", secondary);

    let classifier = Arc::new(QueryClassifier::new().unwrap());
    let templates = Arc::new(GuardrailTemplates::default());
    let retriever = Retriever::new(
        embedder,
        manual_index().await,
        Arc::new(LexicalReranker),
        classifier.hints(),
        config.retrieval.clone(),
    )
    .unwrap();
    let generator = Generator::new(
        primary.clone(),
        secondary.clone(),
        default_answer_prompt().unwrap(),
        config.generation.clone(),
    );
    let formatter = AnswerFormatter::new(config.generation.max_answer_words, &templates).unwrap();
    let sessions = Arc::new(InMemorySessionStore::new(&config.memory));

    Harness {
        assistant: ManualAssistant::new(classifier, templates, retriever, generator, formatter, sessions),
        primary,
        secondary,
    }
}

/// Embedding service that is down.
#[derive(Debug)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        384
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::Retrieval("connection refused".to_string()))
    }
}

/// Embedding service that never answers.
#[derive(Debug)]
pub struct HangingEmbedder;

#[async_trait]
impl EmbeddingProvider for HangingEmbedder {
    fn provider_name(&self) -> &str {
        "hanging"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        384
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        std::future::pending().await
    }
}

/// Lines of an answer that carry citations.
pub fn source_lines(answer: &str) -> usize {
    answer.lines().filter(|l| l.starts_with("Source:")).count()
}
