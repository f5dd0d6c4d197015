//! Log repository
//!
//! Append-only chat, system and conversion logs, plus the retention purge
//! that stands in for TTL indexes.

use crate::db::DbPool;
use crate::models::{ChatLog, ConversionLog, ConversionStatus, SystemLog};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

/// Fields of a new chat log row
#[derive(Debug, Clone)]
pub struct NewChatLog<'a> {
    pub username: &'a str,
    pub query: &'a str,
    pub response: &'a str,
    pub topic: Option<&'a str>,
}

/// Fields of a new conversion log row
#[derive(Debug, Clone)]
pub struct NewConversionLog<'a> {
    pub username: &'a str,
    pub original_file: &'a str,
    pub csv_file: Option<&'a str>,
    pub bytes: i64,
    pub status: ConversionStatus,
    pub error: Option<&'a str>,
}

/// Log repository trait
#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn insert_chat(&self, log: NewChatLog<'_>) -> Result<i64>;

    async fn insert_system(
        &self,
        action: &str,
        username: &str,
        details: &serde_json::Value,
    ) -> Result<i64>;

    async fn insert_conversion(&self, log: NewConversionLog<'_>) -> Result<i64>;

    /// Chat logs for a user, newest first
    async fn recent_chats(&self, username: &str, limit: i64) -> Result<Vec<ChatLog>>;

    /// System logs, newest first
    async fn recent_system(&self, limit: i64) -> Result<Vec<SystemLog>>;

    /// Conversion logs, newest first
    async fn recent_conversions(&self, limit: i64) -> Result<Vec<ConversionLog>>;

    async fn count_chats(&self) -> Result<i64>;

    async fn count_conversions(&self) -> Result<i64>;

    /// Delete chat logs created before `cutoff`; returns rows removed
    async fn purge_chats_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Delete system logs created before `cutoff`; returns rows removed
    async fn purge_system_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based log repository implementation
pub struct SqlxLogRepository {
    pool: DbPool,
}

impl SqlxLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn LogRepository> {
        Arc::new(Self::new(pool))
    }

    /// Insert a chat log with an explicit timestamp
    pub async fn insert_chat_at(&self, log: NewChatLog<'_>, at: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_logs (username, query, response, topic, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.username)
        .bind(log.query)
        .bind(log.response)
        .bind(log.topic)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to insert chat log")?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a system log with an explicit timestamp
    pub async fn insert_system_at(
        &self,
        action: &str,
        username: &str,
        details: &serde_json::Value,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO system_logs (action, username, details, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(action)
        .bind(username)
        .bind(details.to_string())
        .bind(at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert system log: {}", action))?;

        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl LogRepository for SqlxLogRepository {
    async fn insert_chat(&self, log: NewChatLog<'_>) -> Result<i64> {
        self.insert_chat_at(log, Utc::now()).await
    }

    async fn insert_system(
        &self,
        action: &str,
        username: &str,
        details: &serde_json::Value,
    ) -> Result<i64> {
        self.insert_system_at(action, username, details, Utc::now()).await
    }

    async fn insert_conversion(&self, log: NewConversionLog<'_>) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversion_logs (username, original_file, csv_file, bytes, status, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.username)
        .bind(log.original_file)
        .bind(log.csv_file)
        .bind(log.bytes)
        .bind(log.status.to_string())
        .bind(log.error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to insert conversion log")?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_chats(&self, username: &str, limit: i64) -> Result<Vec<ChatLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, query, response, topic, created_at
            FROM chat_logs
            WHERE username = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(username)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list chat logs")?;

        Ok(rows
            .iter()
            .map(|row| ChatLog {
                id: row.get("id"),
                username: row.get("username"),
                query: row.get("query"),
                response: row.get("response"),
                topic: row.get("topic"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn recent_system(&self, limit: i64) -> Result<Vec<SystemLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, action, username, details, created_at
            FROM system_logs
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list system logs")?;

        rows.iter()
            .map(|row| {
                let details: String = row.get("details");
                Ok(SystemLog {
                    id: row.get("id"),
                    action: row.get("action"),
                    username: row.get("username"),
                    details: serde_json::from_str(&details)
                        .context("Stored system log details are not JSON")?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    async fn recent_conversions(&self, limit: i64) -> Result<Vec<ConversionLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, original_file, csv_file, bytes, status, error, created_at
            FROM conversion_logs
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list conversion logs")?;

        Ok(rows
            .iter()
            .map(|row| {
                let status: String = row.get("status");
                ConversionLog {
                    id: row.get("id"),
                    username: row.get("username"),
                    original_file: row.get("original_file"),
                    csv_file: row.get("csv_file"),
                    bytes: row.get("bytes"),
                    status: if status == "success" {
                        ConversionStatus::Success
                    } else {
                        ConversionStatus::Failed
                    },
                    error: row.get("error"),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }

    async fn count_chats(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count chat logs")?;
        Ok(count)
    }

    async fn count_conversions(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversion_logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count conversion logs")?;
        Ok(count)
    }

    async fn purge_chats_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_logs WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to purge chat logs")?;
        Ok(result.rows_affected())
    }

    async fn purge_system_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM system_logs WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to purge system logs")?;
        Ok(result.rows_affected())
    }
}
