//! Knowledge document repository

use crate::db::DbPool;
use crate::models::KnowledgeDocument;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// A training item ready to store
#[derive(Debug, Clone)]
pub struct NewTrainingDocument {
    pub doc_key: String,
    pub text: String,
    pub category: String,
}

/// Knowledge repository trait
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Store a batch of training documents together with the system log row
    /// recording the update. Either everything is written or nothing is.
    async fn insert_training_batch(
        &self,
        docs: &[NewTrainingDocument],
        username: &str,
        details: &serde_json::Value,
    ) -> Result<usize>;

    /// All documents, oldest first
    async fn list(&self) -> Result<Vec<KnowledgeDocument>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based knowledge repository implementation
pub struct SqlxKnowledgeRepository {
    pool: DbPool,
}

impl SqlxKnowledgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn KnowledgeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl KnowledgeRepository for SqlxKnowledgeRepository {
    async fn insert_training_batch(
        &self,
        docs: &[NewTrainingDocument],
        username: &str,
        details: &serde_json::Value,
    ) -> Result<usize> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for doc in docs {
            sqlx::query(
                r#"
                INSERT INTO knowledge_documents (doc_key, text, category, source, created_at)
                VALUES (?, ?, ?, 'training', ?)
                "#,
            )
            .bind(&doc.doc_key)
            .bind(&doc.text)
            .bind(&doc.category)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert knowledge document {}", doc.doc_key))?;
        }

        sqlx::query(
            r#"
            INSERT INTO system_logs (action, username, details, created_at)
            VALUES ('chatbot_training_update', ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(details.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to log training update")?;

        tx.commit().await?;
        Ok(docs.len())
    }

    async fn list(&self) -> Result<Vec<KnowledgeDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, doc_key, text, category, source, created_at
            FROM knowledge_documents
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list knowledge documents")?;

        Ok(rows
            .iter()
            .map(|row| KnowledgeDocument {
                id: row.get("id"),
                doc_key: row.get("doc_key"),
                text: row.get("text"),
                category: row.get("category"),
                source: row.get("source"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_documents")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count knowledge documents")?;
        Ok(count)
    }
}
