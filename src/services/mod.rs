//! Services layer - Business logic
//!
//! This module contains the FloatChat services:
//! - Session/page controller and credential codec
//! - Keyword resolver and chat transcripts
//! - Float queries and admin updates
//! - Knowledge store, chatbot training and NetCDF conversion
//! - System status and log retention

pub mod chat;
pub mod conversion;
pub mod credentials;
pub mod float;
pub mod knowledge;
pub mod password;
pub mod resolver;
pub mod retention;
pub mod session;
pub mod status;
pub mod token;
pub mod training;

pub use chat::{ChatError, ChatService, PendingReply};
pub use conversion::{ConversionError, ConversionReport, ConversionService, Upload};
pub use credentials::{CredentialTable, DEFAULT_ACCOUNTS};
pub use float::{FloatService, FloatServiceError};
pub use knowledge::{KnowledgeHit, KnowledgeService};
pub use password::{hash_password, verify_password};
pub use resolver::{resolve, Resolution, Topic};
pub use retention::{RetentionService, SweepReport};
pub use session::{
    CredentialStore, MemoryCredentialStore, PageAccess, SessionController, SessionError,
};
pub use status::{RequestStats, StatusService, SystemStatus};
pub use token::{SessionCodec, TokenError};
pub use training::{TrainingError, TrainingReport, TrainingService};
