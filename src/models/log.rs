//! Log records and knowledge documents
//!
//! These rows back the chat, system and conversion logs as well as the
//! knowledge store used to attach sources to chat replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A logged chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLog {
    pub id: i64,
    pub username: String,
    pub query: String,
    pub response: String,
    /// Resolver topic, or `None` for the fallback answer
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A logged administrative action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLog {
    pub id: i64,
    pub action: String,
    pub username: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a NetCDF conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Failed,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::Success => write!(f, "success"),
            ConversionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A logged conversion attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionLog {
    pub id: i64,
    pub username: String,
    pub original_file: String,
    pub csv_file: Option<String>,
    pub bytes: i64,
    pub status: ConversionStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A snippet of domain knowledge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: i64,
    /// Stable key for seeded documents, random for training items
    pub doc_key: String,
    pub text: String,
    pub category: String,
    /// "seed" or "training"
    pub source: String,
    pub created_at: DateTime<Utc>,
}
