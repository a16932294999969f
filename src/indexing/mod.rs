//! Batch indexers: QnA patterns from the relational store and policy
//! documents from source files, both pushed into the document store with
//! full-refresh semantics. The vector collections are a derived cache; the
//! relational store and the source files stay the system of record.

pub mod docx;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::relational::{PatternRepository, PatternRow};
use crate::storage::DocumentStoreAdapter;
use crate::types::{DocMetadata, IndexedDocument, ResponseType};

/// Relevance multiplier derived from a pattern's domain/type/priority,
/// applied on top of raw vector similarity at ranking time.
///
/// Deterministic and pure so reindex runs are exactly reproducible.
pub fn search_weight(domain: &str, pattern_type: &str, priority: i32) -> f32 {
    let mut weight = 0.5;

    let domain_factor = match domain {
        "회사" => 1.0,
        "인사" => 0.9,
        "매출" => 0.8,
        "대시보드" => 0.7,
        "ESG" => 0.8,
        "준법" => 0.8,
        _ => 0.5,
    };
    weight *= domain_factor;

    match pattern_type {
        "static" => weight *= 1.2,
        "dynamic" => weight *= 0.9,
        _ => {}
    }

    weight *= 1.0 + priority as f32 * 0.1;

    weight.clamp(0.0, 1.0)
}

/// Convert one pattern row into an indexable document whose metadata carries
/// every field the router or an intent handler needs at answer time.
pub fn pattern_to_document(row: &PatternRow) -> IndexedDocument {
    let template_variables: Option<HashMap<String, String>> = row
        .template_variables
        .as_deref()
        .and_then(|json| match serde_json::from_str(json) {
            Ok(vars) => Some(vars),
            Err(e) => {
                tracing::warn!(
                    pattern_id = row.pattern_id,
                    error = %e,
                    "ignoring malformed template_variables"
                );
                None
            }
        });

    IndexedDocument {
        id: format!("pattern_{}", row.pattern_id),
        text: row.pattern_text.clone(),
        metadata: DocMetadata {
            pattern_id: Some(row.pattern_id),
            pattern_text: Some(row.pattern_text.clone()),
            pattern_type: Some(row.pattern_type.clone()),
            priority: row.priority,
            similarity_threshold: row.similarity_threshold,
            domain: Some(row.domain.clone()),
            category: Some(row.category.clone()),
            response: Some(row.response.clone()),
            response_type: Some(ResponseType::from_str_or_text(&row.response_type)),
            response_handler: row.response_handler.clone(),
            route_code: row.route_code.clone(),
            route_type: row.route_type.clone(),
            route_name: row.route_name.clone(),
            route_path: row.route_path.clone(),
            template_variables,
            search_weight: search_weight(&row.domain, &row.pattern_type, row.priority),
            source: None,
            paragraph_index: None,
        },
    }
}

/// Rebuilds the QnA collection from the relational store.
pub struct PatternIndexer {
    adapter: Arc<DocumentStoreAdapter>,
    repository: Arc<dyn PatternRepository>,
    collection: String,
}

impl PatternIndexer {
    pub fn new(
        adapter: Arc<DocumentStoreAdapter>,
        repository: Arc<dyn PatternRepository>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            repository,
            collection: collection.into(),
        }
    }

    pub async fn reindex(&self) -> Result<usize> {
        let rows = self.repository.active_patterns().await?;
        let documents: Vec<IndexedDocument> = rows.iter().map(pattern_to_document).collect();
        let count = self.adapter.upsert(&self.collection, documents).await?;
        tracing::info!(collection = %self.collection, patterns = count, "pattern reindex complete");
        Ok(count)
    }
}

/// Rebuilds a policy collection from a paragraph-split source document.
pub struct PolicyIndexer {
    adapter: Arc<DocumentStoreAdapter>,
    collection: String,
    path: PathBuf,
}

impl PolicyIndexer {
    pub fn new(
        adapter: Arc<DocumentStoreAdapter>,
        collection: impl Into<String>,
        path: PathBuf,
    ) -> Self {
        Self {
            adapter,
            collection: collection.into(),
            path,
        }
    }

    pub async fn reindex(&self) -> Result<usize> {
        let paragraphs = load_paragraphs(&self.path)?;
        let source = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());

        let documents: Vec<IndexedDocument> = paragraphs
            .into_iter()
            .enumerate()
            .map(|(idx, text)| IndexedDocument {
                id: format!("para_{idx}"),
                text,
                metadata: DocMetadata {
                    source: Some(source.clone()),
                    paragraph_index: Some(idx),
                    ..DocMetadata::default()
                },
            })
            .collect();

        let count = self.adapter.upsert(&self.collection, documents).await?;
        tracing::info!(
            collection = %self.collection,
            source = %source,
            paragraphs = count,
            "policy reindex complete"
        );
        Ok(count)
    }
}

/// Paragraph-level text from a policy source file. DOCX goes through the
/// word/document.xml extractor; plain text and Markdown split on blank lines.
pub fn load_paragraphs(path: &Path) -> Result<Vec<String>> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "docx" => docx::extract_paragraphs(path),
        "txt" | "md" => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(split_text_paragraphs(&content))
        }
        other => anyhow::bail!("unsupported policy document format: .{other}"),
    }
}

fn split_text_paragraphs(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}
