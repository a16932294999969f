//! Top-level assembly: one engine per process, dependencies injected at
//! construction, no module-level singletons.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{AssistConfig, CollectionRole, SourceKind};
use crate::embeddings::{EmbeddingProvider, ModelLoader};
use crate::error::AssistError;
use crate::handlers::{EmployeeInfoHandler, HandlerRegistry, SalesStatusHandler};
use crate::indexing::{PatternIndexer, PolicyIndexer};
use crate::llm::ChatModel;
use crate::relational::{EmployeeDirectory, InteractionLog, PatternRepository, SalesLedger};
use crate::router::RetrievalRouter;
use crate::storage::{DocumentStoreAdapter, VectorIndex};
use crate::types::{ChatInteraction, ChatTurn, StructuredResponse};

/// Everything the engine consumes from outside. Trait objects, so tests wire
/// in-memory fakes and production wires LanceDB, MySQL and a real LLM.
pub struct EngineDeps {
    pub index: Arc<dyn VectorIndex>,
    pub model_loader: Arc<dyn ModelLoader>,
    pub patterns: Arc<dyn PatternRepository>,
    pub employees: Arc<dyn EmployeeDirectory>,
    pub sales: Arc<dyn SalesLedger>,
    pub audit: Arc<dyn InteractionLog>,
    pub llm: Arc<dyn ChatModel>,
}

pub struct AssistEngine {
    router: RetrievalRouter,
    pattern_indexers: Vec<PatternIndexer>,
    policy_indexers: Vec<PolicyIndexer>,
    audit: Arc<dyn InteractionLog>,
}

impl AssistEngine {
    pub fn new(config: AssistConfig, deps: EngineDeps) -> Result<Self, AssistError> {
        config.validate()?;

        let qna = config
            .qna_collection()
            .ok_or_else(|| {
                AssistError::Configuration("no collection with role 'qna' configured".into())
            })?
            .name
            .clone();
        let policy_names: Vec<String> = config
            .policy_collections()
            .map(|c| c.name.clone())
            .collect();

        let embeddings = Arc::new(EmbeddingProvider::new(
            deps.model_loader,
            config.embedding.cache_size,
            config.embedding.load_attempts,
        ));
        let adapter = Arc::new(DocumentStoreAdapter::new(
            deps.index,
            embeddings,
            &config.collections,
            config.data_dir.clone(),
        ));

        let mut handlers = HandlerRegistry::new();
        handlers.register(Arc::new(EmployeeInfoHandler::new(deps.employees)));
        handlers.register(Arc::new(SalesStatusHandler::new(deps.sales)));

        let mut pattern_indexers = Vec::new();
        let mut policy_indexers = Vec::new();
        for collection in &config.collections {
            match (&collection.role, &collection.source) {
                (CollectionRole::Qna, SourceKind::Relational) => pattern_indexers.push(
                    PatternIndexer::new(adapter.clone(), deps.patterns.clone(), &collection.name),
                ),
                (CollectionRole::Policy, SourceKind::File { path }) => policy_indexers
                    .push(PolicyIndexer::new(
                        adapter.clone(),
                        &collection.name,
                        path.clone(),
                    )),
                (CollectionRole::Qna, SourceKind::File { .. }) => {
                    return Err(AssistError::Configuration(format!(
                        "qna collection '{}' must source the relational pattern store",
                        collection.name
                    )));
                }
                (CollectionRole::Policy, SourceKind::Relational) => {
                    return Err(AssistError::Configuration(format!(
                        "policy collection '{}' must name a source file",
                        collection.name
                    )));
                }
            }
        }

        let router = RetrievalRouter::new(
            adapter,
            Arc::new(handlers),
            deps.llm,
            qna,
            policy_names,
            config.search.qna_top_k,
            config.search.policy_top_k,
        );

        Ok(Self {
            router,
            pattern_indexers,
            policy_indexers,
            audit: deps.audit,
        })
    }

    /// Answer one question and append exactly one audit record. An audit
    /// write failure is logged, never surfaced to the user.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatTurn],
        user_id: Option<&str>,
    ) -> StructuredResponse {
        let request_id = uuid::Uuid::new_v4();
        let started = Instant::now();
        info!(request_id = %request_id, question_len = question.len(), "answer started");

        let response = self.router.answer(question, history).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            request_id = %request_id,
            response_type = response.response_type.as_str(),
            elapsed_ms,
            "answer produced"
        );

        let interaction = ChatInteraction {
            user_message: question.to_string(),
            ai_response: response.response.clone(),
            intent_tag: response
                .metadata
                .as_ref()
                .and_then(|m| m.response_handler.clone().or_else(|| m.pattern_type.clone())),
            route_code: response.route_code.clone(),
            response_source: response.response_type.as_str().to_string(),
            response_time_ms: elapsed_ms,
            full_response: serde_json::to_value(&response)
                .unwrap_or(serde_json::Value::Null),
            user_id: user_id.map(str::to_string),
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.audit.append(&interaction).await {
            warn!(error = %e, "failed to append interaction record");
        }

        response
    }

    /// Rebuild every configured collection from its source. Returns the total
    /// document count across collections.
    pub async fn reindex_all(&self) -> Result<usize> {
        let mut total = 0;
        for indexer in &self.pattern_indexers {
            total += indexer.reindex().await?;
        }
        for indexer in &self.policy_indexers {
            total += indexer.reindex().await?;
        }
        info!(documents = total, "full reindex complete");
        Ok(total)
    }

    pub async fn recent_interactions(&self, limit: usize) -> Result<Vec<ChatInteraction>> {
        self.audit.recent(limit).await
    }

    pub async fn popular_questions(&self, limit: usize) -> Result<Vec<String>> {
        self.audit.popular_questions(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashModelLoader;
    use crate::llm::LlmError;
    use crate::relational::MemoryStore;
    use crate::relational::PatternRow;
    use crate::storage::MemoryIndex;
    use crate::types::Employee;
    use async_trait::async_trait;

    struct NeverCalledModel;

    #[async_trait]
    impl ChatModel for NeverCalledModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Err(LlmError::Api("not expected in this test".into()))
        }
    }

    fn config() -> (AssistConfig, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = dir.path().join("policy.txt");
        std::fs::write(&policy_path, "제1조 목적\n\n이 규정은 근무기준을 정한다.").unwrap();

        let mut config = AssistConfig::default();
        config.data_dir = dir.path().join("data");
        for collection in &mut config.collections {
            if collection.role == CollectionRole::Policy {
                collection.source = SourceKind::File {
                    path: policy_path.clone(),
                };
            }
        }
        (config, dir)
    }

    fn deps(store: Arc<MemoryStore>) -> EngineDeps {
        EngineDeps {
            index: Arc::new(MemoryIndex::new()),
            model_loader: Arc::new(HashModelLoader { dimension: 384 }),
            patterns: store.clone(),
            employees: store.clone(),
            sales: store.clone(),
            audit: store,
            llm: Arc::new(NeverCalledModel),
        }
    }

    fn address_pattern() -> PatternRow {
        PatternRow {
            pattern_id: 1,
            pattern_text: "회사 주소 알려줘".into(),
            domain: "회사".into(),
            category: "일반".into(),
            pattern_type: "static".into(),
            priority: 1,
            similarity_threshold: None,
            response_handler: None,
            response: "서울특별시 강남구 테헤란로 123입니다.".into(),
            response_type: "text".into(),
            route_code: None,
            route_type: None,
            route_name: None,
            route_path: None,
            template_variables: None,
        }
    }

    #[tokio::test]
    async fn answer_appends_exactly_one_interaction() {
        let store = Arc::new(MemoryStore::new());
        store.set_patterns(vec![address_pattern()]);
        let (config, _dir) = config();
        let engine = AssistEngine::new(config, deps(store.clone())).unwrap();
        engine.reindex_all().await.unwrap();

        let resp = engine.answer("회사 주소 알려줘", &[], Some("u1")).await;
        assert_eq!(resp.response, "서울특별시 강남구 테헤란로 123입니다.");
        assert_eq!(store.interaction_count(), 1);

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent[0].user_message, "회사 주소 알려줘");
        assert_eq!(recent[0].response_source, "text");
        assert_eq!(recent[0].user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn reindex_all_counts_patterns_and_paragraphs() {
        let store = Arc::new(MemoryStore::new());
        store.set_patterns(vec![address_pattern()]);
        let (config, _dir) = config();
        let engine = AssistEngine::new(config, deps(store)).unwrap();
        // One pattern plus two policy paragraphs.
        assert_eq!(engine.reindex_all().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn audit_records_the_handler_intent_tag() {
        let store = Arc::new(MemoryStore::new());
        store.set_patterns(vec![PatternRow {
            pattern_id: 2,
            pattern_text: "직원 정보 알려줘".into(),
            domain: "인사".into(),
            category: "직원".into(),
            pattern_type: "dynamic".into(),
            priority: 1,
            similarity_threshold: None,
            response_handler: Some("employee_info".into()),
            response: "{name}님은 {department} {position}입니다.".into(),
            response_type: "dynamic".into(),
            route_code: None,
            route_type: None,
            route_name: None,
            route_path: None,
            template_variables: None,
        }]);
        store.insert_employee(Employee {
            name: "조정현".into(),
            position: "과장".into(),
            department: "개발팀".into(),
            email: "jh.cho@example.com".into(),
            phone: "010-1234-5678".into(),
        });
        let (config, _dir) = config();
        let engine = AssistEngine::new(config, deps(store.clone())).unwrap();
        engine.reindex_all().await.unwrap();

        engine.answer("조정현님 정보 알려줘", &[], None).await;
        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent[0].intent_tag.as_deref(), Some("employee_info"));
    }

    #[test]
    fn qna_collection_with_file_source_is_rejected() {
        let (mut config, _dir) = config();
        for collection in &mut config.collections {
            if collection.role == CollectionRole::Qna {
                collection.source = SourceKind::File {
                    path: "patterns.docx".into(),
                };
            }
        }
        let err = AssistEngine::new(config, deps(Arc::new(MemoryStore::new())))
            .err()
            .unwrap();
        assert!(matches!(err, AssistError::Configuration(_)));
    }

    #[test]
    fn missing_qna_collection_is_a_configuration_error() {
        let (mut config, _dir) = config();
        config.collections.clear();
        let err = AssistEngine::new(config, deps(Arc::new(MemoryStore::new())))
            .err()
            .unwrap();
        assert!(matches!(err, AssistError::Configuration(_)));
    }
}
