use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response kind carried by every [`StructuredResponse`].
///
/// `None` means "the system worked but had nothing to say" and is deliberately
/// distinct from `Error` so the audit log can track the two separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Dynamic,
    Gpt,
    None,
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Dynamic => "dynamic",
            Self::Gpt => "gpt",
            Self::None => "none",
            Self::Error => "error",
        }
    }

    pub fn from_str_or_text(s: &str) -> Self {
        match s {
            "dynamic" => Self::Dynamic,
            "gpt" => Self::Gpt,
            "none" => Self::None,
            "error" => Self::Error,
            _ => Self::Text,
        }
    }
}

/// Pattern provenance attached to a resolved answer so the client UI and the
/// audit log can trace which pattern produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternTrace {
    pub domain: Option<String>,
    pub category: Option<String>,
    pub pattern_id: Option<i64>,
    pub pattern_text: Option<String>,
    pub pattern_type: Option<String>,
    pub response_handler: Option<String>,
}

/// The one canonical output contract. Every path through the router (static
/// DB answer, intent handler, GPT fallback, not-found, error) normalizes into
/// this shape. Route fields and metadata serialize as explicit nulls when not
/// applicable; the timestamp is always populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub response: String,
    pub response_type: ResponseType,
    pub route_code: Option<String>,
    pub route_type: Option<String>,
    pub route_name: Option<String>,
    pub route_path: Option<String>,
    pub metadata: Option<PatternTrace>,
    pub timestamp: DateTime<Utc>,
}

impl StructuredResponse {
    pub fn new(response: impl Into<String>, response_type: ResponseType) -> Self {
        Self {
            response: response.into(),
            response_type,
            route_code: None,
            route_type: None,
            route_name: None,
            route_path: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn text(response: impl Into<String>) -> Self {
        Self::new(response, ResponseType::Text)
    }

    pub fn gpt(response: impl Into<String>) -> Self {
        Self::new(response, ResponseType::Gpt)
    }

    pub fn not_found(response: impl Into<String>) -> Self {
        Self::new(response, ResponseType::None)
    }

    pub fn error(response: impl Into<String>) -> Self {
        Self::new(response, ResponseType::Error)
    }

    pub fn with_route(
        mut self,
        code: Option<String>,
        route_type: Option<String>,
        name: Option<String>,
        path: Option<String>,
    ) -> Self {
        self.route_code = code;
        self.route_type = route_type;
        self.route_name = name;
        self.route_path = path;
        self
    }

    pub fn with_trace(mut self, trace: PatternTrace) -> Self {
        self.metadata = Some(trace);
        self
    }
}

/// Free-form metadata stored alongside every indexed document. For QnA
/// patterns this embeds everything the router or an intent handler needs at
/// answer time; for policy paragraphs only `source`/`paragraph_index` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocMetadata {
    pub pattern_id: Option<i64>,
    pub pattern_text: Option<String>,
    pub pattern_type: Option<String>,
    pub priority: i32,
    /// Per-pattern threshold as authored in the relational store; the routing
    /// decision applies the collection-level threshold.
    pub similarity_threshold: Option<f32>,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub response: Option<String>,
    pub response_type: Option<ResponseType>,
    pub response_handler: Option<String>,
    pub route_code: Option<String>,
    pub route_type: Option<String>,
    pub route_name: Option<String>,
    pub route_path: Option<String>,
    pub template_variables: Option<HashMap<String, String>>,
    pub search_weight: f32,
    pub source: Option<String>,
    pub paragraph_index: Option<usize>,
}

impl Default for DocMetadata {
    fn default() -> Self {
        Self {
            pattern_id: None,
            pattern_text: None,
            pattern_type: None,
            priority: 0,
            similarity_threshold: None,
            domain: None,
            category: None,
            response: None,
            response_type: None,
            response_handler: None,
            route_code: None,
            route_type: None,
            route_name: None,
            route_path: None,
            template_variables: None,
            search_weight: 1.0,
            source: None,
            paragraph_index: None,
        }
    }
}

impl DocMetadata {
    pub fn trace(&self) -> PatternTrace {
        PatternTrace {
            domain: self.domain.clone(),
            category: self.category.clone(),
            pattern_id: self.pattern_id,
            pattern_text: self.pattern_text.clone(),
            pattern_type: self.pattern_type.clone(),
            response_handler: self.response_handler.clone(),
        }
    }
}

/// A (text, metadata) pair queued for indexing into a collection.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    pub metadata: DocMetadata,
}

/// One row in a vector collection.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: DocMetadata,
    pub created_at: i64,
}

/// A search hit after distance-to-similarity conversion. The collection's
/// configured threshold rides along so callers apply it, not the store.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: DocMetadata,
    pub similarity: f32,
    pub threshold: f32,
}

impl ScoredDocument {
    /// Relevance used for re-ranking within the top-k: raw vector similarity
    /// biased by the pattern's precomputed search weight.
    pub fn weighted_score(&self) -> f32 {
        self.similarity * self.metadata.search_weight
    }
}

/// One turn of prior conversation passed to `answer()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Append-only audit record written once per completed `answer()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInteraction {
    pub user_message: String,
    pub ai_response: String,
    pub intent_tag: Option<String>,
    pub route_code: Option<String>,
    pub response_source: String,
    pub response_time_ms: u64,
    pub full_response: serde_json::Value,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Employee row from the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub name: String,
    pub position: String,
    pub department: String,
    pub email: String,
    pub phone: String,
}

/// Yearly sales aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSummary {
    pub year: i32,
    pub total_sales: f64,
    pub monthly_sales: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_type_round_trips_through_serde() {
        let json = serde_json::to_string(&ResponseType::None).unwrap();
        assert_eq!(json, "\"none\"");
        let back: ResponseType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ResponseType::None);
    }

    #[test]
    fn structured_response_serializes_absent_fields_as_null() {
        let resp = StructuredResponse::text("안녕하세요");
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("route_code").unwrap().is_null());
        assert!(value.get("metadata").unwrap().is_null());
        assert!(!value.get("timestamp").unwrap().is_null());
    }

    #[test]
    fn doc_metadata_defaults_apply_for_sparse_json() {
        let meta: DocMetadata = serde_json::from_str(r#"{"domain":"인사"}"#).unwrap();
        assert_eq!(meta.domain.as_deref(), Some("인사"));
        assert_eq!(meta.priority, 0);
        assert_eq!(meta.search_weight, 1.0);
    }
}
