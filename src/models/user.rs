//! Account model
//!
//! FloatChat has a fixed set of accounts; each carries a role that selects
//! its landing page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::page::PageName;

/// An account from the credential table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Login name (unique)
    pub username: String,
    /// Display name shown once logged in
    pub name: String,
    /// Contact address
    pub email: String,
    /// Account role
    pub role: UserRole,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl Account {
    /// Check if the account is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Stored account row as listed to administrators
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Role of an account.
///
/// - User: marine researcher, sees the float dashboard and chat
/// - Admin: additionally manages floats, training data and conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    /// Page a freshly logged-in account lands on
    pub fn landing_page(self) -> PageName {
        match self {
            UserRole::User => PageName::User,
            UserRole::Admin => PageName::Admin,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}
