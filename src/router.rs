//! The retrieval router: one inbound question in, one normalized answer out.
//!
//! Pipeline per question: search the QnA pattern collection, re-rank the
//! top-k by weighted score, and resolve a confident match as a DB answer
//! (static text, template substitution or intent-handler dispatch). Without a
//! confident match, fan out across the policy collections and ground an LLM
//! answer on the retrieved paragraphs. Every path, including every failure
//! path, terminates in a [`StructuredResponse`]; nothing propagates past
//! [`RetrievalRouter::answer`].

use anyhow::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::handlers::HandlerRegistry;
use crate::llm::{prompts, ChatModel, LlmError};
use crate::response::fill_template;
use crate::storage::DocumentStoreAdapter;
use crate::types::{ChatTurn, ResponseType, ScoredDocument, StructuredResponse};

pub const NOT_UNDERSTOOD_MESSAGE: &str =
    "죄송합니다. 질문을 이해하지 못했습니다. 다른 방식으로 질문해 주시겠어요?";
pub const NOT_FOUND_MESSAGE: &str = "죄송합니다. 관련 정보를 찾지 못했습니다.";
pub const TIMEOUT_MESSAGE: &str =
    "죄송합니다. 응답 시간이 초과되었습니다. 잠시 후 다시 시도해주세요.";
pub const GENERIC_ERROR_MESSAGE: &str =
    "죄송합니다. 처리 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

/// Decision rule for the QnA match: a named handler dispatches regardless of
/// score; a plain pattern needs similarity strictly above the collection
/// threshold. At exactly the threshold the match falls through.
fn resolves_as_db_answer(has_handler: bool, similarity: f32, threshold: f32) -> bool {
    has_handler || similarity > threshold
}

pub struct RetrievalRouter {
    store: Arc<DocumentStoreAdapter>,
    handlers: Arc<HandlerRegistry>,
    llm: Arc<dyn ChatModel>,
    qna_collection: String,
    /// Policy collections in declaration order; context concatenates in this
    /// order.
    policy_collections: Vec<String>,
    qna_top_k: usize,
    policy_top_k: usize,
}

impl RetrievalRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<DocumentStoreAdapter>,
        handlers: Arc<HandlerRegistry>,
        llm: Arc<dyn ChatModel>,
        qna_collection: impl Into<String>,
        policy_collections: Vec<String>,
        qna_top_k: usize,
        policy_top_k: usize,
    ) -> Self {
        Self {
            store,
            handlers,
            llm,
            qna_collection: qna_collection.into(),
            policy_collections,
            qna_top_k,
            policy_top_k,
        }
    }

    /// Answer one question. This is the error boundary: any failure inside
    /// the pipeline degrades to an error-typed response here.
    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> StructuredResponse {
        match self.route(question, history).await {
            Ok(response) => response,
            Err(e) => {
                if matches!(e.downcast_ref::<LlmError>(), Some(LlmError::Timeout)) {
                    warn!(error = %e, "answer timed out");
                    StructuredResponse::error(TIMEOUT_MESSAGE)
                } else {
                    warn!(error = %e, "answer failed");
                    StructuredResponse::error(GENERIC_ERROR_MESSAGE)
                }
            }
        }
    }

    async fn route(&self, question: &str, history: &[ChatTurn]) -> Result<StructuredResponse> {
        let hits = self
            .store
            .search(&self.qna_collection, question, self.qna_top_k)
            .await?;

        // Re-rank the top-k by similarity biased with the pattern's search
        // weight before applying the collection threshold.
        let best = hits
            .into_iter()
            .max_by(|a, b| a.weighted_score().total_cmp(&b.weighted_score()));

        if let Some(matched) = best {
            let has_handler = matched
                .metadata
                .response_handler
                .as_deref()
                .is_some_and(|h| !h.is_empty());

            info!(
                pattern = matched.metadata.pattern_text.as_deref().unwrap_or("?"),
                similarity = matched.similarity,
                threshold = matched.threshold,
                weighted = matched.weighted_score(),
                has_handler,
                "best pattern match"
            );

            if resolves_as_db_answer(has_handler, matched.similarity, matched.threshold) {
                return self.resolve_match(question, &matched).await;
            }
        }

        self.policy_answer(question, history).await
    }

    /// Resolve a confident QnA match: dispatch to its handler when one is
    /// named, otherwise substitute template variables into the stored
    /// response text.
    async fn resolve_match(
        &self,
        question: &str,
        matched: &ScoredDocument,
    ) -> Result<StructuredResponse> {
        let meta = &matched.metadata;
        let template = meta.response.clone().unwrap_or_default();

        if let Some(handler_name) = meta.response_handler.as_deref().filter(|h| !h.is_empty()) {
            match self.handlers.resolve(handler_name) {
                Some(handler) => {
                    info!(handler = handler_name, "dispatching intent handler");
                    return match handler.handle(question, meta, &template).await {
                        Ok(response) => Ok(response),
                        Err(e) => {
                            let err = crate::error::AssistError::Handler {
                                handler: handler_name.to_string(),
                                reason: e.to_string(),
                            };
                            warn!(error = %err, "intent handler failed");
                            Ok(StructuredResponse::error(GENERIC_ERROR_MESSAGE)
                                .with_trace(meta.trace()))
                        }
                    };
                }
                None => {
                    warn!(handler = handler_name, "unknown handler name, falling back to static answer");
                }
            }
        }

        let vars: HashMap<String, String> = meta.template_variables.clone().unwrap_or_default();
        let text = fill_template(&template, &vars);
        let response_type = meta.response_type.unwrap_or(ResponseType::Text);

        Ok(StructuredResponse::new(text, response_type)
            .with_route(
                meta.route_code.clone(),
                meta.route_type.clone(),
                meta.route_name.clone(),
                meta.route_path.clone(),
            )
            .with_trace(meta.trace()))
    }

    /// Fan out across the policy collections, assemble context in collection
    /// declaration order and ground an LLM answer on it. An empty context
    /// short-circuits to a fixed not-found response without touching the LLM.
    async fn policy_answer(
        &self,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<StructuredResponse> {
        let searches = self
            .policy_collections
            .iter()
            .map(|name| self.store.search(name, question, self.policy_top_k));
        let results = join_all(searches).await;

        let mut context: Vec<String> = Vec::new();
        for hits in results {
            context.extend(hits?.into_iter().map(|hit| hit.text));
        }

        if context.is_empty() {
            info!("no policy context retrieved, skipping LLM");
            return Ok(StructuredResponse::not_found(NOT_FOUND_MESSAGE));
        }

        info!(passages = context.len(), "generating grounded answer");
        let user_prompt = prompts::build_policy_user_prompt(question, &context, history);
        let text = self
            .llm
            .complete(prompts::POLICY_SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(anyhow::Error::new)?;

        if text.trim().is_empty() {
            return Ok(StructuredResponse::not_found(NOT_UNDERSTOOD_MESSAGE));
        }

        Ok(StructuredResponse::gpt(text))
    }
}
