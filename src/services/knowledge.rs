//! Knowledge store
//!
//! ARGO domain snippets and admin training items, ranked lexically against a
//! query to attach sources to chat replies. Scores are the number of shared
//! terms normalised by document length; stop words never count.

use crate::db::repositories::{KnowledgeRepository, NewTrainingDocument};
use anyhow::Result;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
        "i", "in", "is", "it", "me", "of", "on", "or", "show", "tell", "that", "the", "this", "to",
        "today", "was", "what", "when", "where", "which", "who", "why", "with", "you",
    ]
    .into_iter()
    .collect()
});

/// A ranked knowledge document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeHit {
    pub doc_key: String,
    pub text: String,
    pub category: String,
    pub score: f64,
}

/// Knowledge service backed by the `knowledge_documents` table
pub struct KnowledgeService {
    repo: Arc<dyn KnowledgeRepository>,
}

impl KnowledgeService {
    pub fn new(repo: Arc<dyn KnowledgeRepository>) -> Self {
        Self { repo }
    }

    /// Top `limit` documents sharing at least one term with `query`
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeHit>> {
        let terms = tokenize(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<KnowledgeHit> = self
            .repo
            .list()
            .await?
            .into_iter()
            .filter_map(|doc| {
                let doc_terms = tokenize(&doc.text);
                let shared = terms.intersection(&doc_terms).count();
                if shared == 0 {
                    return None;
                }
                Some(KnowledgeHit {
                    score: shared as f64 / (doc_terms.len() as f64).sqrt(),
                    doc_key: doc.doc_key,
                    text: doc.text,
                    category: doc.category,
                })
            })
            .collect();

        // stable sort keeps insertion order among equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Store training items as one batch, logged as a training update by
    /// `username`. Each item gets a generated `training_` key.
    pub async fn add_training(
        &self,
        username: &str,
        items: Vec<(String, String)>,
        details: &serde_json::Value,
    ) -> Result<usize> {
        let docs: Vec<NewTrainingDocument> = items
            .into_iter()
            .map(|(text, category)| NewTrainingDocument {
                doc_key: format!("training_{}", uuid::Uuid::new_v4().simple()),
                text,
                category,
            })
            .collect();
        self.repo.insert_training_batch(&docs, username, details).await
    }

    pub async fn count(&self) -> Result<i64> {
        self.repo.count().await
    }
}

/// Lower-cased alphanumeric terms minus stop words. Plural `s` is folded.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOP_WORDS.contains(w.as_str()))
        .map(|w| match w.strip_suffix('s') {
            Some(stem) if stem.len() > 3 => stem.to_string(),
            _ => w,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxKnowledgeRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> KnowledgeService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        KnowledgeService::new(SqlxKnowledgeRepository::boxed(pool))
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_folds_plurals() {
        let terms = tokenize("What is the Temperature of floats?");
        assert!(terms.contains("temperature"));
        assert!(terms.contains("float"));
        assert!(!terms.contains("the"));
        assert!(!terms.contains("what"));
    }

    #[tokio::test]
    async fn test_search_ranks_salinity_doc_first() {
        let service = setup_service().await;

        let hits = service.search("salinity units PSU", 3).await.unwrap();

        assert!(!hits.is_empty());
        assert_eq!(hits[0].doc_key, "salinity_units");
        assert!(hits.len() <= 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_without_overlap_is_empty() {
        let service = setup_service().await;

        assert!(service.search("xyz", 3).await.unwrap().is_empty());
        assert!(service.search("the what", 3).await.unwrap().is_empty());
        assert!(service.search("temperature", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_training_item_becomes_searchable() {
        let service = setup_service().await;

        let stored = service
            .add_training(
                "admin",
                vec![(
                    "Q: What is a glider? A: An autonomous underwater vehicle".to_string(),
                    "technical".to_string(),
                )],
                &serde_json::json!({}),
            )
            .await
            .unwrap();

        assert_eq!(stored, 1);
        let hits = service.search("glider", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].doc_key.starts_with("training_"));
        assert_eq!(hits[0].category, "technical");
        assert_eq!(service.count().await.unwrap(), 9);
    }
}
