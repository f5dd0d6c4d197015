//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::user::{Account, UserRole};

/// Identity carried by a stored credential.
///
/// Field names are the wire format of the credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: UserRole,
    pub name: String,
    /// Expiry as a Unix timestamp (seconds)
    pub exp: i64,
}

impl Session {
    /// Open a session for `account` that lives for `ttl` from `now`
    pub fn for_account(account: &Account, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
            name: account.name.clone(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Check if the session has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Expiry as a timestamp, if representable
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            username: "user".to_string(),
            name: "Marine Researcher".to_string(),
            email: "user@floatchat.com".to_string(),
            role: UserRole::User,
            password_hash: String::new(),
        }
    }

    #[test]
    fn test_session_for_account_sets_expiry() {
        let now = Utc::now();
        let session = Session::for_account(&account(), now, Duration::hours(1));

        assert_eq!(session.username, "user");
        assert_eq!(session.exp, (now + Duration::hours(1)).timestamp());
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::hours(2)));
    }

    #[test]
    fn test_session_wire_format() {
        let session = Session {
            username: "admin".to_string(),
            role: UserRole::Admin,
            name: "System Administrator".to_string(),
            exp: 1_700_000_000,
        };
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["username"], "admin");
        assert_eq!(json["role"], "admin");
        assert_eq!(json["name"], "System Administrator");
        assert_eq!(json["exp"], 1_700_000_000i64);
    }
}
