//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one table family.

pub mod float;
pub mod knowledge;
pub mod log;
pub mod profile;
pub mod user;

pub use float::{FloatRepository, SqlxFloatRepository};
pub use knowledge::{KnowledgeRepository, NewTrainingDocument, SqlxKnowledgeRepository};
pub use log::{LogRepository, NewChatLog, NewConversionLog, SqlxLogRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository, MAX_PROFILE_LIMIT};
pub use user::{SqlxUserRepository, UserRepository};
