//! Pluggable per-intent resolvers.
//!
//! A matched pattern's `response_handler` field names a handler; the registry
//! resolves that name (or a legacy intent tag) to a compile-time-checked
//! [`IntentKind`] and dispatches. Handlers extract structured parameters from
//! free text, perform exactly one targeted relational lookup and substitute
//! the results into the pattern's response template. A missing parameter or
//! a lookup miss is a deterministic validation outcome, never an LLM call.

pub mod employee_info;
pub mod sales_status;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::types::{DocMetadata, StructuredResponse};

pub use employee_info::EmployeeInfoHandler;
pub use sales_status::SalesStatusHandler;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20[0-9]{2})년").expect("year regex is valid"));
static EMPLOYEE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([가-힣]{2,4})님").expect("employee name regex is valid"));

/// Intents with a dynamic handler. Data-driven selection (the pattern names
/// its handler) with a compile-time-checked mapping instead of runtime
/// string-based import resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    EmployeeInfo,
    SalesStatus,
}

impl IntentKind {
    /// Resolve a pattern's `response_handler` name, accepting the legacy
    /// intent tags as a fallback spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "employee_info" | "handle_employee_info" => Some(Self::EmployeeInfo),
            "sales_status" | "handle_sales_status" => Some(Self::SalesStatus),
            _ => None,
        }
    }
}

#[async_trait]
pub trait IntentHandler: Send + Sync {
    fn kind(&self) -> IntentKind;

    /// Resolve one intent against the matched pattern's metadata and response
    /// template. Errors are caught at the dispatch boundary, not here.
    async fn handle(
        &self,
        message: &str,
        metadata: &DocMetadata,
        template: &str,
    ) -> Result<StructuredResponse>;
}

/// Static registration table built once at startup and injected into the
/// router, not held in module-level singletons.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<IntentKind, Arc<dyn IntentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn IntentHandler>> {
        IntentKind::from_name(name).and_then(|kind| self.handlers.get(&kind).cloned())
    }
}

/// 4-digit year ("2024년") from free text.
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// 2–4 character Korean personal name followed by the honorific "님".
pub fn extract_employee_name(text: &str) -> Option<String> {
    EMPLOYEE_NAME_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}
