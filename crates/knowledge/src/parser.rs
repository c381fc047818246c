//! Source document reading.
//!
//! A manual arrives as extracted text: either one file with pages separated
//! by form feeds (as written by `pdftotext`), or a directory holding one
//! file per page.

use crate::chunk::calculate_hash;
use manualqa_core::{AppError, AppResult};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const PAGE_BREAK: u8 = 0x0c;

/// Share of control characters above which a page is treated as binary.
const MAX_CONTROL_RATIO: f32 = 0.05;

/// Text of one page, or why it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    Text(String),
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// 1-based
    pub number: u32,
    pub content: PageContent,
}

/// A document split into pages.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    /// SHA-256 of the raw bytes
    pub content_hash: String,
    pub pages: Vec<RawPage>,
}

/// Read a document from a file or a directory of page files.
///
/// `name` defaults to the file stem or directory name.
pub fn read_document(path: &Path, name: Option<&str>) -> AppResult<SourceDocument> {
    if !path.exists() {
        return Err(AppError::Ingestion(format!("Document not found: {:?}", path)));
    }

    let name = match name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        _ => path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::Ingestion(format!("Cannot derive a document name from {:?}", path)))?,
    };

    let bytes = if path.is_dir() {
        read_page_directory(path)?
    } else {
        fs::read(path).map_err(|e| AppError::Ingestion(format!("Failed to read {:?}: {}", path, e)))?
    };

    if bytes.is_empty() {
        return Err(AppError::Ingestion(format!("Document is empty: {:?}", path)));
    }

    let pages = split_pages(&bytes);
    tracing::debug!("Read {} pages from {:?}", pages.len(), path);

    Ok(SourceDocument {
        name,
        content_hash: calculate_hash(&bytes),
        pages,
    })
}

/// Concatenate page files in name order, separated by form feeds.
fn read_page_directory(dir: &Path) -> AppResult<Vec<u8>> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(AppError::Ingestion(format!("No page files in {:?}", dir)));
    }

    let mut bytes = Vec::new();
    for (i, file) in files.iter().enumerate() {
        if i > 0 {
            bytes.push(PAGE_BREAK);
        }
        let mut content =
            fs::read(file).map_err(|e| AppError::Ingestion(format!("Failed to read {:?}: {}", file, e)))?;
        content.retain(|b| *b != PAGE_BREAK);
        bytes.extend_from_slice(&content);
    }

    Ok(bytes)
}

/// Split raw bytes on form feeds and decode each page on its own, so one
/// bad page does not spoil the rest.
pub fn split_pages(bytes: &[u8]) -> Vec<RawPage> {
    let mut segments: Vec<&[u8]> = bytes.split(|b| *b == PAGE_BREAK).collect();

    // pdftotext ends every page with a form feed
    if segments.len() > 1 && segments.last().is_some_and(|s| s.iter().all(u8::is_ascii_whitespace)) {
        segments.pop();
    }

    segments
        .into_iter()
        .enumerate()
        .map(|(i, segment)| RawPage {
            number: i as u32 + 1,
            content: decode_page(segment),
        })
        .collect()
}

fn decode_page(bytes: &[u8]) -> PageContent {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return PageContent::Malformed(format!("invalid UTF-8 at byte {}", e.valid_up_to())),
    };

    if text.contains('\0') {
        return PageContent::Malformed("binary content".to_string());
    }

    let total = text.chars().count();
    let control = text
        .chars()
        .filter(|c| c.is_control() && !c.is_whitespace())
        .count();
    if total > 0 && control as f32 / total as f32 > MAX_CONTROL_RATIO {
        return PageContent::Malformed("binary content".to_string());
    }

    if text.trim().is_empty() {
        return PageContent::Malformed("empty page".to_string());
    }

    PageContent::Text(text.replace("\r\n", "\n"))
}
