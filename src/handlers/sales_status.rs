//! Yearly sales aggregates ("2024년 매출 현황").

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::{extract_year, IntentHandler, IntentKind};
use crate::relational::SalesLedger;
use crate::response::fill_template;
use crate::types::{DocMetadata, ResponseType, StructuredResponse};

const MISSING_YEAR: &str = "연도를 입력해주세요. (예: 2024년 매출 현황)";

const DEFAULT_TEMPLATE: &str = "{year}년 매출 현황입니다.\n총 매출: {total_sales}원\n월 평균: {monthly_sales}원\n전년 대비 성장률: {growth_rate}%";

pub struct SalesStatusHandler {
    ledger: Arc<dyn SalesLedger>,
}

impl SalesStatusHandler {
    pub fn new(ledger: Arc<dyn SalesLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl IntentHandler for SalesStatusHandler {
    fn kind(&self) -> IntentKind {
        IntentKind::SalesStatus
    }

    async fn handle(
        &self,
        message: &str,
        metadata: &DocMetadata,
        template: &str,
    ) -> Result<StructuredResponse> {
        let Some(year) = extract_year(message) else {
            return Ok(StructuredResponse::text(MISSING_YEAR).with_trace(metadata.trace()));
        };

        let Some(summary) = self.ledger.yearly_summary(year).await? else {
            return Ok(StructuredResponse::text(format!(
                "죄송합니다. {year}년 매출 정보를 찾을 수 없습니다."
            ))
            .with_trace(metadata.trace()));
        };

        // Growth is measured against the prior year; without a prior year
        // (or with zero prior sales) it reports 0.
        let growth_rate = match self.ledger.yearly_summary(year - 1).await? {
            Some(prev) if prev.total_sales != 0.0 => {
                (summary.total_sales - prev.total_sales) / prev.total_sales * 100.0
            }
            _ => 0.0,
        };

        info!(year, total_sales = summary.total_sales, growth_rate, "sales lookup hit");

        let mut vars: HashMap<String, String> =
            metadata.template_variables.clone().unwrap_or_default();
        vars.insert("year".into(), year.to_string());
        vars.insert("total_sales".into(), format_amount(summary.total_sales));
        vars.insert("monthly_sales".into(), format_amount(summary.monthly_sales));
        vars.insert("growth_rate".into(), format!("{growth_rate:.1}"));

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

/// Thousands-grouped rendering of a won amount, dropping the fraction.
fn format_amount(amount: f64) -> String {
    let negative = amount < 0.0;
    let digits = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::MemoryStore;

    fn ledger() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for month in 1..=12 {
            store.insert_sales(2023, month, 100_000_000.0);
            store.insert_sales(2024, month, 110_000_000.0);
        }
        store
    }

    #[tokio::test]
    async fn yearly_summary_with_growth_against_prior_year() {
        let handler = SalesStatusHandler::new(ledger());
        let resp = handler
            .handle("2024년 매출 현황", &DocMetadata::default(), "")
            .await
            .unwrap();
        assert!(resp.response.contains("2024년"));
        assert!(resp.response.contains("1,320,000,000"));
        assert!(resp.response.contains("10.0%"));
        assert_eq!(resp.response_type, ResponseType::Dynamic);
    }

    #[tokio::test]
    async fn first_recorded_year_reports_zero_growth() {
        let handler = SalesStatusHandler::new(ledger());
        let resp = handler
            .handle("2023년 매출 현황", &DocMetadata::default(), "")
            .await
            .unwrap();
        assert!(resp.response.contains("0.0%"));
    }

    #[tokio::test]
    async fn missing_year_asks_for_one() {
        let handler = SalesStatusHandler::new(ledger());
        let resp = handler
            .handle("매출 현황 알려줘", &DocMetadata::default(), "")
            .await
            .unwrap();
        assert_eq!(resp.response, MISSING_YEAR);
    }

    #[tokio::test]
    async fn unknown_year_reports_not_found() {
        let handler = SalesStatusHandler::new(ledger());
        let resp = handler
            .handle("2020년 매출 현황", &DocMetadata::default(), "")
            .await
            .unwrap();
        assert_eq!(resp.response, "죄송합니다. 2020년 매출 정보를 찾을 수 없습니다.");
    }

    #[test]
    fn amount_grouping() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(1234.0), "1,234");
        assert_eq!(format_amount(1_320_000_000.0), "1,320,000,000");
    }
}
