//! Data models
//!
//! This module contains the data structures used throughout FloatChat:
//! - Session identity and accounts
//! - Page identifiers
//! - ARGO floats, profiles and audit entries
//! - Chat transcript entries
//! - Log rows and knowledge documents

mod chat;
mod float;
mod log;
mod page;
mod session;
mod user;

pub use chat::{ChatTurn, Speaker, TranscriptEntry};
pub use float::{
    ArgoFloat, CreateFloatInput, FloatAuditEntry, FloatStatus, GeoBounds, OceanProfile,
    UpdateFloatInput,
};
pub use log::{ChatLog, ConversionLog, ConversionStatus, KnowledgeDocument, SystemLog};
pub use page::PageName;
pub use session::Session;
pub use user::{Account, UserRole, UserSummary};
