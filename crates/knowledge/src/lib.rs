//! Manual knowledge base and answering pipeline.
//!
//! Ingestion turns an extracted manual into bounded chunks stored with their
//! embeddings in SQLite. Answering routes each query, retrieves a minimal
//! evidence set, generates with failover and enforces the answer contract.

pub mod chunk;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod parser;
pub mod progress;
pub mod rag;
pub mod rerank;
pub mod router;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use chunk::{Chunk, Segmentation, SkipReason, SkippedSpan};
pub use progress::{IngestPhase, ProgressEvent, ProgressReporter};
pub use rag::{AssistantReply, Citation, ManualAssistant};
pub use router::{Category, Classification, QueryClassifier};
pub use types::{BaseStats, DocumentRecord, IngestOptions, IngestReport, KnowledgeBaseConfig};

use chrono::Utc;
use chunk::Segmenter;
use futures::stream::{self, StreamExt};
use index::SqliteIndex;
use manualqa_core::{AppConfig, AppError, AppResult};
use manualqa_llm::{create_client, LlmClient};
use manualqa_prompt::{load_prompt_or_default, GuardrailTemplates, PromptDefinition, ANSWER_PROMPT_ID};
use rag::{AnswerFormatter, Generator, InMemorySessionStore, Retriever};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use vector_index::VectorIndex;

/// Embedding batches in flight during ingestion.
const EMBED_CONCURRENCY: usize = 4;

/// Ingest one document into a knowledge base.
///
/// Idempotent by content hash: the same bytes are never indexed twice. A
/// new version of an already ingested document replaces the old one.
pub async fn ingest(
    workspace: &Path,
    options: IngestOptions,
    progress: &ProgressReporter,
) -> AppResult<IngestReport> {
    let start = Instant::now();
    tracing::info!("Starting ingest for base '{}' from {:?}", options.base_name, options.path);

    let config = config::load_config(workspace, &options.base_name)?;

    let document = parser::read_document(&options.path, options.doc_name.as_deref())?;
    progress.emit(
        IngestPhase::Read,
        document.pages.len() as u64,
        None,
        format!("{} pages from {}", document.pages.len(), document.name),
    );

    let index = SqliteIndex::open(&config::get_index_path(workspace, &options.base_name))?;

    if options.reset {
        index.reset().await?;
    } else if let Some(existing) = index.find_document(&document.content_hash).await? {
        tracing::info!(
            "Document '{}' already indexed with the same content, nothing to do",
            existing.name
        );
        return Ok(IngestReport {
            base_name: options.base_name,
            document: existing.name,
            content_hash: existing.content_hash,
            pages: existing.pages,
            chunks_count: existing.chunks_count,
            already_indexed: true,
            skipped: Vec::new(),
            duration_secs: start.elapsed().as_secs_f64(),
        });
    }

    let segmenter = Segmenter::new(config.segmenter.clone())?;
    let Segmentation { chunks, manifest } = segmenter.segment(&document);
    progress.emit(
        IngestPhase::Segment,
        chunks.len() as u64,
        None,
        format!("{} chunks, {} spans skipped", chunks.len(), manifest.len()),
    );

    if chunks.is_empty() {
        tracing::warn!("Document '{}' produced no chunks", document.name);
    }

    let embedder = embeddings::create_provider(&config.embedding)?;
    let total = chunks.len() as u64;
    let mut embedded: Vec<(Chunk, Vec<f32>)> = Vec::with_capacity(chunks.len());

    let mut batches = stream::iter(chunks.chunks(config.embedding.batch_size))
        .map(|batch| {
            let embedder = Arc::clone(&embedder);
            async move {
                let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                embedder.embed_batch(&texts).await.map(|vectors| (batch, vectors))
            }
        })
        .buffered(EMBED_CONCURRENCY);

    while let Some(result) = batches.next().await {
        let (batch, vectors) = result?;
        if vectors.len() != batch.len() {
            return Err(AppError::Ingestion(format!(
                "Embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }
        embedded.extend(batch.iter().cloned().zip(vectors));
        progress.emit(
            IngestPhase::Embed,
            embedded.len() as u64,
            Some(total),
            format!("model={}", embedder.model_name()),
        );
    }

    let record = DocumentRecord {
        name: document.name.clone(),
        content_hash: document.content_hash.clone(),
        pages: document.pages.len(),
        chunks_count: embedded.len(),
        ingested_at: Utc::now(),
    };
    let replaced = index.replace_document(&record, embedded).await?;
    if replaced > 0 {
        tracing::info!("Replaced {} chunks of the previous version of '{}'", replaced, record.name);
    }
    progress.emit(IngestPhase::Index, total, Some(total), "stored in SQLite");

    config::save_config(workspace, &config)?;

    let duration = start.elapsed();
    tracing::info!(
        "Ingest completed: '{}', {} pages, {} chunks, {} skipped in {:.2}s",
        record.name,
        record.pages,
        record.chunks_count,
        manifest.len(),
        duration.as_secs_f64()
    );

    Ok(IngestReport {
        base_name: options.base_name,
        document: record.name,
        content_hash: record.content_hash,
        pages: record.pages,
        chunks_count: record.chunks_count,
        already_indexed: false,
        skipped: manifest,
        duration_secs: duration.as_secs_f64(),
    })
}

/// Get statistics for a knowledge base.
pub async fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    let index = open_existing(workspace, base_name)?;
    let documents = index.list_documents().await?;
    let chunks_count = index.count().await?;

    let index_path = config::get_index_path(workspace, base_name);
    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);
    let last_ingest_at = documents.iter().map(|d| d.ingested_at).max();

    Ok(BaseStats {
        base_name: base_name.to_string(),
        documents,
        chunks_count,
        db_size_bytes,
        last_ingest_at,
    })
}

/// Drop every document and chunk of a knowledge base.
pub async fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);
    let index = open_existing(workspace, base_name)?;
    index.reset().await
}

/// Assemble the answering pipeline for an ingested knowledge base.
///
/// Backends come from the workspace `config.yaml`; the answer prompt and
/// guardrail texts may be overridden under `.manualqa/`.
pub fn open_assistant(workspace: &Path, app: &AppConfig, base_name: &str) -> AppResult<ManualAssistant> {
    let config = config::load_config(workspace, base_name)?;
    let index: Arc<dyn VectorIndex> = Arc::new(open_existing(workspace, base_name)?);

    let primary = create_client(&app.primary_backend()?, config.generation.primary_timeout());
    let secondary = create_client(&app.secondary_backend()?, config.generation.secondary_timeout());
    let prompt = load_prompt_or_default(workspace, ANSWER_PROMPT_ID)?;
    let templates = GuardrailTemplates::load(workspace)?;

    build_assistant(&config, index, primary, secondary, prompt, templates)
}

/// Wire the pipeline from explicit parts.
pub fn build_assistant(
    config: &KnowledgeBaseConfig,
    index: Arc<dyn VectorIndex>,
    primary: Arc<dyn LlmClient>,
    secondary: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    templates: GuardrailTemplates,
) -> AppResult<ManualAssistant> {
    config.validate()?;

    let embedder = embeddings::create_provider(&config.embedding)?;
    let reranker = rerank::create_reranker(&config.reranker, config.retrieval.rerank_timeout())?;
    let classifier = Arc::new(QueryClassifier::new()?);
    let templates = Arc::new(templates);

    let retriever = Retriever::new(
        embedder,
        index,
        reranker,
        classifier.hints(),
        config.retrieval.clone(),
    )?;
    let generator = Generator::new(primary, secondary, prompt, config.generation.clone());
    let formatter = AnswerFormatter::new(config.generation.max_answer_words, &templates)?;
    let sessions = Arc::new(InMemorySessionStore::new(&config.memory));

    tracing::debug!(
        base = %config.name,
        embedder = %config.embedding.provider,
        reranker = %config.reranker.provider,
        "Assembled answering pipeline"
    );

    Ok(ManualAssistant::new(
        classifier, templates, retriever, generator, formatter, sessions,
    ))
}

fn open_existing(workspace: &Path, base_name: &str) -> AppResult<SqliteIndex> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' has no index. Run 'manualqa ingest {} <path>' first.",
            base_name, base_name
        )));
    }
    SqliteIndex::open(&index_path)
}
