//! Cross-module tests: full answering scenarios, ingestion and ranking.

pub(crate) mod support;
