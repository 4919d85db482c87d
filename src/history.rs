//! SQLite-backed [`QueryLog`] and the `aqa history` command.
//!
//! Each answered question becomes one row in the `queries` table. The
//! ranked contexts, completion choices, and request parameters are stored
//! as JSON columns so a record can be reproduced exactly later.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use article_qa_core::error::{QaError, Result};
use article_qa_core::models::{QueryRecord, QuerySummary};
use article_qa_core::store::QueryLog;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// SQLite implementation of the [`QueryLog`] trait.
pub struct SqliteQueryLog {
    pool: SqlitePool,
}

impl SqliteQueryLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_err(e: impl std::fmt::Display) -> QaError {
    QaError::StorageUnavailable(format!("query log: {}", e))
}

#[async_trait]
impl QueryLog for SqliteQueryLog {
    async fn append(&self, record: &QueryRecord) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let contexts = serde_json::to_string(&record.contexts).map_err(storage_err)?;
        let choices = serde_json::to_string(&record.choices).map_err(storage_err)?;
        let parameters = serde_json::to_string(&record.parameters).map_err(storage_err)?;

        sqlx::query(
            r#"
            INSERT INTO queries (id, query, response, contexts_json, choices_json,
                                 parameters_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&record.query)
        .bind(&record.response)
        .bind(&contexts)
        .bind(&choices)
        .bind(&parameters)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(id)
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<QuerySummary>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            "SELECT id, query, response FROM queries ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .iter()
            .map(|row| QuerySummary {
                id: row.get("id"),
                query: row.get("query"),
                response: row.get("response"),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<QueryRecord>> {
        let row = sqlx::query(
            "SELECT query, response, contexts_json, choices_json, parameters_json FROM queries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let contexts: String = row.get("contexts_json");
        let choices: String = row.get("choices_json");
        let parameters: String = row.get("parameters_json");

        Ok(Some(QueryRecord {
            query: row.get("query"),
            response: row.get("response"),
            contexts: serde_json::from_str(&contexts).map_err(storage_err)?,
            choices: serde_json::from_str(&choices).map_err(storage_err)?,
            parameters: serde_json::from_str(&parameters).map_err(storage_err)?,
        }))
    }
}

/// `aqa history`: print the most recent questions and answers.
pub async fn run_history(config: &Config, limit: usize) -> AnyResult<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let log = SqliteQueryLog::new(pool.clone());
    let entries = log.list(Some(limit)).await?;

    if entries.is_empty() {
        println!("No queries recorded.");
    } else {
        for entry in &entries {
            println!("{}  {}", entry.id, entry.query);
            println!("    {}", first_line(&entry.response));
        }
    }

    pool.close().await;
    Ok(())
}

/// `aqa history show <id>`: print one full record as JSON.
pub async fn run_history_show(config: &Config, id: &str) -> AnyResult<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let log = SqliteQueryLog::new(pool.clone());
    let record = log.get(id).await?;
    pool.close().await;

    match record {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!("query not found: {}", id),
    }
}

fn first_line(s: &str) -> &str {
    s.trim().lines().next().unwrap_or("")
}
