//! SQLite-backed vector index and document registry.

use crate::chunk::Chunk;
use crate::types::DocumentRecord;
use crate::vector_index::{rank, ScoredChunk, VectorIndex};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use manualqa_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A knowledge base index stored in one SQLite file.
///
/// The connection is shared behind a mutex and every query runs on the
/// blocking pool.
#[derive(Clone)]
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Open or create the index database.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                pages INTEGER NOT NULL,
                chunks_count INTEGER NOT NULL,
                ingested_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source_doc TEXT NOT NULL,
                page INTEGER NOT NULL,
                section_title TEXT,
                text TEXT NOT NULL,
                word_count INTEGER NOT NULL,
                numeric_flag INTEGER NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(source_doc);
            CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Knowledge("Index connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))?
    }

    /// The document already ingested with this content hash, if any.
    pub async fn find_document(&self, content_hash: &str) -> AppResult<Option<DocumentRecord>> {
        let hash = content_hash.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT name, content_hash, pages, chunks_count, ingested_at
                 FROM documents WHERE content_hash = ?1",
                params![hash],
                row_to_document,
            )
            .optional()
            .map_err(|e| AppError::Knowledge(format!("Failed to look up document: {}", e)))
        })
        .await
    }

    /// Store a document's chunks and its registry entry, replacing any
    /// earlier version with the same name. Runs in one transaction, so a
    /// failed insert leaves the earlier version in place. Returns the number
    /// of chunks replaced.
    pub async fn replace_document(&self, record: &DocumentRecord, chunks: Vec<(Chunk, Vec<f32>)>) -> AppResult<usize> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| AppError::Knowledge(format!("Failed to start transaction: {}", e)))?;
            let removed = tx
                .execute("DELETE FROM chunks WHERE source_doc = ?1", params![record.name])
                .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;
            tx.execute("DELETE FROM documents WHERE name = ?1", params![record.name])
                .map_err(|e| AppError::Knowledge(format!("Failed to delete document: {}", e)))?;
            for (chunk, embedding) in &chunks {
                insert_chunk(&tx, chunk, embedding)?;
            }
            tx.execute(
                "INSERT INTO documents (name, content_hash, pages, chunks_count, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.name,
                    record.content_hash,
                    record.pages as i64,
                    record.chunks_count as i64,
                    record.ingested_at.to_rfc3339(),
                ],
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to insert document: {}", e)))?;
            tx.commit()
                .map_err(|e| AppError::Knowledge(format!("Failed to commit: {}", e)))?;
            Ok(removed)
        })
        .await
    }

    /// All ingested documents, by name.
    pub async fn list_documents(&self) -> AppResult<Vec<DocumentRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT name, content_hash, pages, chunks_count, ingested_at
                     FROM documents ORDER BY name",
                )
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;
            let rows = stmt
                .query_map([], row_to_document)
                .map_err(|e| AppError::Knowledge(format!("Failed to list documents: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::Knowledge(format!("Failed to read document: {}", e)))
        })
        .await
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, chunk: &Chunk, embedding: &[f32]) -> AppResult<()> {
        let chunk = chunk.clone();
        let embedding = embedding.to_vec();
        self.with_conn(move |conn| insert_chunk(conn, &chunk, &embedding))
            .await
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>> {
        let query = embedding.to_vec();
        let results = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, source_doc, page, section_title, text, word_count, numeric_flag, embedding
                         FROM chunks",
                    )
                    .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

                let rows = stmt
                    .query_map([], |row| {
                        let chunk = Chunk {
                            id: row.get(0)?,
                            source_doc: row.get(1)?,
                            page: row.get::<_, i64>(2)? as u32,
                            section_title: row.get(3)?,
                            text: row.get(4)?,
                            word_count: row.get::<_, i64>(5)? as usize,
                            numeric_flag: row.get::<_, i64>(6)? != 0,
                        };
                        let bytes: Vec<u8> = row.get(7)?;
                        Ok((chunk, bytes))
                    })
                    .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

                let mut results = Vec::new();
                for row in rows {
                    let (chunk, bytes) =
                        row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk: {}", e)))?;
                    let stored = bytes_to_embedding(&bytes)?;
                    let score = cosine_similarity(&query, &stored);
                    results.push((chunk, score));
                }

                rank(&mut results, top_k);
                Ok(results)
            })
            .await?;

        tracing::debug!("Retrieved {} chunks (requested top-{})", results.len(), top_k);
        Ok(results)
    }

    async fn count(&self) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))
        })
        .await
    }

    async fn reset(&self) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM chunks; DELETE FROM documents;")
                .map_err(|e| AppError::Knowledge(format!("Failed to reset index: {}", e)))
        })
        .await?;

        tracing::info!("Reset knowledge base index");
        Ok(())
    }
}

fn insert_chunk(conn: &Connection, chunk: &Chunk, embedding: &[f32]) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO chunks
         (id, source_doc, page, section_title, text, word_count, numeric_flag, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            chunk.id,
            chunk.source_doc,
            chunk.page as i64,
            chunk.section_title,
            chunk.text,
            chunk.word_count as i64,
            chunk.numeric_flag as i64,
            embedding_to_bytes(embedding),
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;
    Ok(())
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
    let ingested_at: String = row.get(4)?;
    let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(DocumentRecord {
        name: row.get(0)?,
        content_hash: row.get(1)?,
        pages: row.get::<_, i64>(2)? as usize,
        chunks_count: row.get::<_, i64>(3)? as usize,
        ingested_at,
    })
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge("Invalid embedding bytes length".to_string()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity between two vectors; 0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(id: &str, doc: &str, page: u32) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: "The PC-I form is prepared by the sponsoring agency.".to_string(),
            source_doc: doc.to_string(),
            page,
            section_title: Some("3 Preparation".to_string()),
            word_count: 9,
            numeric_flag: false,
        }
    }

    fn record(name: &str, hash: &str, chunks: usize) -> DocumentRecord {
        DocumentRecord {
            name: name.to_string(),
            content_hash: hash.to_string(),
            pages: 1,
            chunks_count: chunks,
            ingested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let temp = TempDir::new().unwrap();
        let index = SqliteIndex::open(&temp.path().join("index.sqlite")).unwrap();

        index
            .replace_document(
                &record("manual", "h1", 2),
                vec![
                    (chunk("c1", "manual", 1), vec![1.0, 0.0, 0.0]),
                    (chunk("c2", "manual", 2), vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, chunk("c1", "manual", 1));
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_document_registry() {
        let temp = TempDir::new().unwrap();
        let index = SqliteIndex::open(&temp.path().join("index.sqlite")).unwrap();

        index
            .replace_document(&record("manual", "h1", 1), vec![(chunk("c1", "manual", 1), vec![1.0])])
            .await
            .unwrap();
        index
            .replace_document(&record("other", "h2", 1), vec![(chunk("c2", "other", 1), vec![1.0])])
            .await
            .unwrap();

        let found = index.find_document("h1").await.unwrap().unwrap();
        assert_eq!(found.name, "manual");
        assert!(index.find_document("missing").await.unwrap().is_none());

        let replaced = index
            .replace_document(&record("manual", "h3", 1), vec![(chunk("c3", "manual", 1), vec![1.0])])
            .await
            .unwrap();
        assert_eq!(replaced, 1);
        assert_eq!(index.count().await.unwrap(), 2);
        assert!(index.find_document("h1").await.unwrap().is_none());
        let names: Vec<_> = index
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["manual", "other"]);

        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        let index = SqliteIndex::open(&path).unwrap();
        index
            .replace_document(&record("manual", "h1", 1), vec![(chunk("c1", "manual", 1), vec![1.0])])
            .await
            .unwrap();

        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_chunk BEFORE INSERT ON chunks WHEN NEW.id = 'rejected'
                 BEGIN SELECT RAISE(ABORT, 'chunk rejected'); END;",
            )
            .unwrap();

        let result = index
            .replace_document(
                &record("manual", "h2", 2),
                vec![
                    (chunk("c2", "manual", 1), vec![1.0]),
                    (chunk("rejected", "manual", 2), vec![1.0]),
                ],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.find_document("h1").await.unwrap().unwrap().name, "manual");
        assert!(index.find_document("h2").await.unwrap().is_none());
    }

    #[test]
    fn test_embedding_bytes() {
        let bytes = embedding_to_bytes(&[0.5, -1.25]);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), vec![0.5, -1.25]);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
