//! MySQL-backed relational store. Single-statement point reads plus the
//! append-only chat_history sink; patterns/responses/employees/sales are
//! administered elsewhere and read-only here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;

use crate::types::{ChatInteraction, Employee, SalesSummary};

use super::{EmployeeDirectory, InteractionLog, PatternRepository, PatternRow, SalesLedger};

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("Failed to connect to MySQL")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatternRepository for MySqlStore {
    async fn active_patterns(&self) -> Result<Vec<PatternRow>> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(p.id AS SIGNED) AS pattern_id,
                   p.pattern AS pattern_text,
                   p.domain,
                   p.category,
                   p.pattern_type,
                   p.priority,
                   p.similarity_threshold,
                   p.response_handler,
                   r.response,
                   r.response_type,
                   r.route_code,
                   r.template_variables,
                   rt.route_name,
                   rt.route_path,
                   rt.route_type
            FROM patterns p
            JOIN responses r ON p.response_id = r.id
            LEFT JOIN routes rt ON r.route_code = rt.route_code
            WHERE p.is_active = 1 AND r.is_active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to query active patterns")?;

        rows.iter()
            .map(|row| {
                Ok(PatternRow {
                    pattern_id: row.try_get("pattern_id")?,
                    pattern_text: row.try_get("pattern_text")?,
                    domain: row.try_get("domain")?,
                    category: row.try_get("category")?,
                    pattern_type: row.try_get("pattern_type")?,
                    priority: row.try_get("priority")?,
                    similarity_threshold: row.try_get("similarity_threshold")?,
                    response_handler: row.try_get("response_handler")?,
                    response: row.try_get("response")?,
                    response_type: row.try_get("response_type")?,
                    route_code: row.try_get("route_code")?,
                    route_type: row.try_get("route_type")?,
                    route_name: row.try_get("route_name")?,
                    route_path: row.try_get("route_path")?,
                    template_variables: row.try_get("template_variables")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl EmployeeDirectory for MySqlStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Employee>> {
        let row = sqlx::query(
            r#"
            SELECT name, position, dept_nm, email, phone
            FROM employee_info
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query employee")?;

        row.map(|row| {
            Ok(Employee {
                name: row.try_get("name")?,
                position: row.try_get("position")?,
                department: row.try_get("dept_nm")?,
                email: row.try_get("email")?,
                phone: row.try_get("phone")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl SalesLedger for MySqlStore {
    async fn yearly_summary(&self, year: i32) -> Result<Option<SalesSummary>> {
        let row = sqlx::query(
            r#"
            SELECT year,
                   CAST(SUM(sales) AS DOUBLE) AS total_sales,
                   CAST(SUM(sales) / 12 AS DOUBLE) AS monthly_sales
            FROM sales_history
            WHERE year = ?
            GROUP BY year
            "#,
        )
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query sales summary")?;

        row.map(|row| {
            Ok(SalesSummary {
                year: row.try_get("year")?,
                total_sales: row.try_get("total_sales")?,
                monthly_sales: row.try_get("monthly_sales")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl InteractionLog for MySqlStore {
    async fn append(&self, interaction: &ChatInteraction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_history
                (user_message, ai_response, intent_tag, route_code,
                 response_source, response_time_ms, full_response, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&interaction.user_message)
        .bind(&interaction.ai_response)
        .bind(&interaction.intent_tag)
        .bind(&interaction.route_code)
        .bind(&interaction.response_source)
        .bind(interaction.response_time_ms as i64)
        .bind(interaction.full_response.to_string())
        .bind(&interaction.user_id)
        .bind(interaction.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to append chat interaction")?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatInteraction>> {
        let rows = sqlx::query(
            r#"
            SELECT user_message, ai_response, intent_tag, route_code,
                   response_source, response_time_ms, full_response, user_id, created_at
            FROM chat_history
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query chat history")?;

        rows.iter()
            .map(|row| {
                let full_response: String = row.try_get("full_response")?;
                Ok(ChatInteraction {
                    user_message: row.try_get("user_message")?,
                    ai_response: row.try_get("ai_response")?,
                    intent_tag: row.try_get("intent_tag")?,
                    route_code: row.try_get("route_code")?,
                    response_source: row.try_get("response_source")?,
                    response_time_ms: row.try_get::<i64, _>("response_time_ms")? as u64,
                    full_response: serde_json::from_str(&full_response)
                        .unwrap_or(serde_json::Value::Null),
                    user_id: row.try_get("user_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn popular_questions(&self, limit: usize) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT user_message, COUNT(*) AS cnt
            FROM chat_history
            GROUP BY user_message
            ORDER BY cnt DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query popular questions")?;

        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("user_message")?))
            .collect()
    }
}
