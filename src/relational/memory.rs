//! In-memory relational store used by tests and local development.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::types::{ChatInteraction, Employee, SalesSummary};

use super::{EmployeeDirectory, InteractionLog, PatternRepository, PatternRow, SalesLedger};

#[derive(Default)]
pub struct MemoryStore {
    patterns: RwLock<Vec<PatternRow>>,
    employees: RwLock<HashMap<String, Employee>>,
    /// (year, month, sales) rows mirroring the sales_history table.
    sales: RwLock<Vec<(i32, u32, f64)>>,
    interactions: RwLock<Vec<ChatInteraction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_patterns(&self, patterns: Vec<PatternRow>) {
        *self.patterns.write() = patterns;
    }

    pub fn insert_employee(&self, employee: Employee) {
        self.employees
            .write()
            .insert(employee.name.clone(), employee);
    }

    pub fn insert_sales(&self, year: i32, month: u32, sales: f64) {
        self.sales.write().push((year, month, sales));
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.read().len()
    }
}

#[async_trait]
impl PatternRepository for MemoryStore {
    async fn active_patterns(&self) -> Result<Vec<PatternRow>> {
        Ok(self.patterns.read().clone())
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Employee>> {
        Ok(self.employees.read().get(name).cloned())
    }
}

#[async_trait]
impl SalesLedger for MemoryStore {
    async fn yearly_summary(&self, year: i32) -> Result<Option<SalesSummary>> {
        let rows = self.sales.read();
        let year_rows: Vec<f64> = rows
            .iter()
            .filter(|(y, _, _)| *y == year)
            .map(|(_, _, s)| *s)
            .collect();
        if year_rows.is_empty() {
            return Ok(None);
        }
        let total: f64 = year_rows.iter().sum();
        Ok(Some(SalesSummary {
            year,
            total_sales: total,
            monthly_sales: total / 12.0,
        }))
    }
}

#[async_trait]
impl InteractionLog for MemoryStore {
    async fn append(&self, interaction: &ChatInteraction) -> Result<()> {
        self.interactions.write().push(interaction.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatInteraction>> {
        let interactions = self.interactions.read();
        Ok(interactions.iter().rev().take(limit).cloned().collect())
    }

    async fn popular_questions(&self, limit: usize) -> Result<Vec<String>> {
        let interactions = self.interactions.read();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in interactions.iter() {
            *counts.entry(i.user_message.as_str()).or_default() += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(q, _)| q.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn interaction(message: &str) -> ChatInteraction {
        ChatInteraction {
            user_message: message.into(),
            ai_response: "응답".into(),
            intent_tag: None,
            route_code: None,
            response_source: "text".into(),
            response_time_ms: 10,
            full_response: serde_json::json!({}),
            user_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn yearly_summary_sums_monthly_rows() {
        let store = MemoryStore::new();
        store.insert_sales(2024, 1, 100.0);
        store.insert_sales(2024, 2, 140.0);
        store.insert_sales(2023, 1, 80.0);

        let summary = store.yearly_summary(2024).await.unwrap().unwrap();
        assert_eq!(summary.total_sales, 240.0);
        assert_eq!(summary.monthly_sales, 20.0);
        assert!(store.yearly_summary(2020).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn popular_questions_ranks_by_frequency() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store.append(&interaction("연차 신청 방법")).await.unwrap();
        }
        store.append(&interaction("회사 주소")).await.unwrap();

        let popular = store.popular_questions(5).await.unwrap();
        assert_eq!(popular[0], "연차 신청 방법");
        assert_eq!(popular.len(), 2);
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let store = MemoryStore::new();
        store.append(&interaction("첫 질문")).await.unwrap();
        store.append(&interaction("둘째 질문")).await.unwrap();

        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent[0].user_message, "둘째 질문");
    }
}
