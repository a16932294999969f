//! Retrieval-and-response-routing core for a company intranet assistant.
//!
//! Inbound questions are matched against a vector collection of QnA patterns
//! sourced from a relational store; confident matches resolve to canned,
//! templated or handler-computed answers, and everything else falls back to
//! an LLM answer grounded on retrieved policy-document paragraphs. The HTTP
//! layer on top of this crate only ever sees [`StructuredResponse`].

pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod indexing;
pub mod llm;
pub mod relational;
pub mod response;
pub mod router;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use config::{AssistConfig, CollectionConfig, CollectionRole, DistanceMetric};
pub use engine::{AssistEngine, EngineDeps};
pub use error::AssistError;
pub use router::RetrievalRouter;
pub use types::{ChatInteraction, ChatTurn, ResponseType, StructuredResponse};

// Re-export common types
pub use anyhow::{Error, Result};
