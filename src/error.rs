use thiserror::Error;

/// Typed failure taxonomy for the assistant core.
///
/// Only `Configuration` is fatal (startup/reindex time). Everything else is
/// absorbed before it can cross the `answer()` boundary: the router converts
/// failures into a `StructuredResponse` with `response_type = error` and never
/// lets a raw error reach the HTTP layer.
#[derive(Debug, Error)]
pub enum AssistError {
    /// Unknown collection, unsupported model, missing config key. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding model failed to initialize after bounded retries. The
    /// in-flight request degrades; subsequent requests may retry the load.
    #[error("model load failed for '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    /// A document-store search failed or returned malformed data. Recovered
    /// locally as "no match in this collection".
    #[error("retrieval failed in collection '{collection}': {reason}")]
    Retrieval { collection: String, reason: String },

    /// An intent handler raised during extraction or lookup. Caught at the
    /// dispatch boundary and converted into a generic apology.
    #[error("intent handler '{handler}' failed: {reason}")]
    Handler { handler: String, reason: String },
}
