//! Chatbot training
//!
//! Parses the admin training box and stores each usable item as a knowledge
//! document. Parsing happens before any write, and the documents plus the
//! system log row are written in one transaction, so a failed update applies
//! nothing.

use crate::services::knowledge::KnowledgeService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error types for training operations
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("Invalid training data: {0}")]
    InvalidJson(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// One question/answer pair. Fields are optional so incomplete items can be
/// skipped instead of failing the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingItem {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrainingPayload {
    Items(Vec<TrainingItem>),
    Wrapped { training_data: Vec<TrainingItem> },
}

/// Outcome of a training upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingReport {
    pub received: usize,
    pub added: usize,
    pub skipped: usize,
}

/// Parse the training box text.
///
/// Accepts a JSON array of items or an object with a `training_data` array.
pub fn parse_training_data(text: &str) -> Result<Vec<TrainingItem>, TrainingError> {
    match serde_json::from_str::<TrainingPayload>(text) {
        Ok(TrainingPayload::Items(items)) => Ok(items),
        Ok(TrainingPayload::Wrapped { training_data }) => Ok(training_data),
        Err(e) => Err(TrainingError::InvalidJson(e.to_string())),
    }
}

pub struct TrainingService {
    knowledge: Arc<KnowledgeService>,
}

impl TrainingService {
    pub fn new(knowledge: Arc<KnowledgeService>) -> Self {
        Self { knowledge }
    }

    /// Parse `text` and store every item with both a question and an answer
    pub async fn apply(&self, username: &str, text: &str) -> Result<TrainingReport, TrainingError> {
        let items = parse_training_data(text)?;
        let received = items.len();
        let mut accepted = Vec::with_capacity(received);

        for item in items {
            let (Some(question), Some(answer)) = (item.question, item.answer) else {
                continue;
            };
            let (question, answer) = (question.trim(), answer.trim());
            if question.is_empty() || answer.is_empty() {
                continue;
            }

            let category = item
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or("general");

            accepted.push((format!("Q: {} A: {}", question, answer), category.to_string()));
        }

        let added = accepted.len();
        let details = serde_json::json!({
            "training_items": received,
            "items_added": added,
        });
        self.knowledge.add_training(username, accepted, &details).await?;

        let report = TrainingReport {
            received,
            added,
            skipped: received - added,
        };

        tracing::info!(
            "Training update by {}: {} added, {} skipped",
            username,
            report.added,
            report.skipped
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{LogRepository, SqlxKnowledgeRepository, SqlxLogRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> (TrainingService, Arc<KnowledgeService>, Arc<dyn LogRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let knowledge = Arc::new(KnowledgeService::new(SqlxKnowledgeRepository::boxed(
            pool.clone(),
        )));
        let logs = SqlxLogRepository::boxed(pool);
        (
            TrainingService::new(knowledge.clone()),
            knowledge,
            logs,
        )
    }

    #[test]
    fn test_parse_array_and_wrapped_forms() {
        let array = parse_training_data(r#"[{"question":"q","answer":"a"}]"#).unwrap();
        assert_eq!(array.len(), 1);

        let wrapped =
            parse_training_data(r#"{"training_data":[{"question":"q","answer":"a","category":"c"}]}"#)
                .unwrap();
        assert_eq!(wrapped[0].category.as_deref(), Some("c"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in ["", "{", "not json", r#"{"items":[]}"#, "42"] {
            assert!(matches!(
                parse_training_data(text),
                Err(TrainingError::InvalidJson(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_apply_skips_incomplete_items() {
        let (service, knowledge, logs) = setup_service().await;

        let report = service
            .apply(
                "admin",
                r#"[
                    {"question": "What is a CTD?", "answer": "A conductivity, temperature and depth sensor", "category": "technical"},
                    {"question": "Missing answer"},
                    {"answer": "Missing question"},
                    {"question": "  ", "answer": "blank question"}
                ]"#,
            )
            .await
            .unwrap();

        assert_eq!(
            report,
            TrainingReport {
                received: 4,
                added: 1,
                skipped: 3
            }
        );
        assert_eq!(knowledge.count().await.unwrap(), 9);

        let system = logs.recent_system(1).await.unwrap();
        assert_eq!(system[0].action, "chatbot_training_update");
        assert_eq!(system[0].details["items_added"], 1);
    }

    #[tokio::test]
    async fn test_apply_malformed_changes_nothing() {
        let (service, knowledge, logs) = setup_service().await;

        let result = service.apply("admin", "[{\"question\": ").await;

        assert!(matches!(result, Err(TrainingError::InvalidJson(_))));
        assert_eq!(knowledge.count().await.unwrap(), 8);
        assert!(logs.recent_system(1).await.unwrap().is_empty());
    }
}
