pub mod memory;
pub mod mysql;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ChatInteraction, Employee, SalesSummary};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// One active pattern joined with its active response (and route, when any),
/// as pulled from the relational store for reindexing. The relational store
/// is the system of record; the vector collection built from these rows is a
/// derived cache.
#[derive(Debug, Clone)]
pub struct PatternRow {
    pub pattern_id: i64,
    pub pattern_text: String,
    pub domain: String,
    pub category: String,
    pub pattern_type: String,
    pub priority: i32,
    pub similarity_threshold: Option<f32>,
    pub response_handler: Option<String>,
    pub response: String,
    pub response_type: String,
    pub route_code: Option<String>,
    pub route_type: Option<String>,
    pub route_name: Option<String>,
    pub route_path: Option<String>,
    /// JSON object of static `{var}` substitutions, when present.
    pub template_variables: Option<String>,
}

#[async_trait]
pub trait PatternRepository: Send + Sync {
    async fn active_patterns(&self) -> Result<Vec<PatternRow>>;
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Employee>>;
}

#[async_trait]
pub trait SalesLedger: Send + Sync {
    /// Total and monthly-average sales for one year, None when the year has
    /// no rows.
    async fn yearly_summary(&self, year: i32) -> Result<Option<SalesSummary>>;
}

/// Append-only audit sink. One record per completed `answer()` call.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, interaction: &ChatInteraction) -> Result<()>;

    async fn recent(&self, limit: usize) -> Result<Vec<ChatInteraction>>;

    /// Most-asked questions, most frequent first.
    async fn popular_questions(&self, limit: usize) -> Result<Vec<String>>;
}
