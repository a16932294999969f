//! Employee directory lookups ("조정현님 정보").

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::{extract_employee_name, IntentHandler, IntentKind};
use crate::relational::EmployeeDirectory;
use crate::response::fill_template;
use crate::types::{DocMetadata, ResponseType, StructuredResponse};

const MISSING_NAME: &str = "직원 이름을 입력해주세요.";

const DEFAULT_TEMPLATE: &str = "{name}님의 정보입니다.\n직급: {position}\n부서: {department}\n이메일: {email}\n연락처: {phone}";

pub struct EmployeeInfoHandler {
    directory: Arc<dyn EmployeeDirectory>,
}

impl EmployeeInfoHandler {
    pub fn new(directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl IntentHandler for EmployeeInfoHandler {
    fn kind(&self) -> IntentKind {
        IntentKind::EmployeeInfo
    }

    async fn handle(
        &self,
        message: &str,
        metadata: &DocMetadata,
        template: &str,
    ) -> Result<StructuredResponse> {
        let Some(name) = extract_employee_name(message) else {
            return Ok(StructuredResponse::text(MISSING_NAME).with_trace(metadata.trace()));
        };

        let Some(employee) = self.directory.find_by_name(&name).await? else {
            return Ok(StructuredResponse::text(format!(
                "죄송합니다. {name}님의 정보를 찾을 수 없습니다."
            ))
            .with_trace(metadata.trace()));
        };

        info!(name = %employee.name, department = %employee.department, "employee lookup hit");

        let mut vars: HashMap<String, String> =
            metadata.template_variables.clone().unwrap_or_default();
        vars.insert("name".into(), employee.name);
        vars.insert("position".into(), employee.position);
        vars.insert("department".into(), employee.department);
        vars.insert("email".into(), employee.email);
        vars.insert("phone".into(), employee.phone);

        let template = if template.trim().is_empty() {
            DEFAULT_TEMPLATE
        } else {
            template
        };

        Ok(
            StructuredResponse::new(fill_template(template, &vars), ResponseType::Dynamic)
                .with_route(
                    metadata.route_code.clone(),
                    metadata.route_type.clone(),
                    metadata.route_name.clone(),
                    metadata.route_path.clone(),
                )
                .with_trace(metadata.trace()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::MemoryStore;
    use crate::types::Employee;

    fn handler_with_cho() -> EmployeeInfoHandler {
        let store = MemoryStore::new();
        store.insert_employee(Employee {
            name: "조정현".into(),
            position: "과장".into(),
            department: "개발팀".into(),
            email: "jh.cho@example.com".into(),
            phone: "010-1234-5678".into(),
        });
        EmployeeInfoHandler::new(Arc::new(store))
    }

    #[tokio::test]
    async fn known_employee_fills_the_template() {
        let handler = handler_with_cho();
        let resp = handler
            .handle(
                "조정현님 정보 알려줘",
                &DocMetadata::default(),
                "{name}님은 {department} {position}입니다.",
            )
            .await
            .unwrap();
        assert_eq!(resp.response, "조정현님은 개발팀 과장입니다.");
        assert_eq!(resp.response_type, ResponseType::Dynamic);
    }

    #[tokio::test]
    async fn missing_name_asks_for_one() {
        let handler = handler_with_cho();
        let resp = handler
            .handle("직원 정보 알려줘", &DocMetadata::default(), "")
            .await
            .unwrap();
        assert_eq!(resp.response, MISSING_NAME);
        assert_eq!(resp.response_type, ResponseType::Text);
    }

    #[tokio::test]
    async fn unknown_employee_reports_not_found() {
        let handler = handler_with_cho();
        let resp = handler
            .handle("김철수님 정보", &DocMetadata::default(), "")
            .await
            .unwrap();
        assert_eq!(resp.response, "죄송합니다. 김철수님의 정보를 찾을 수 없습니다.");
    }
}
