//! Credential table
//!
//! The fixed set of accounts FloatChat accepts. Plaintext passwords exist only
//! in the seed records; the table keeps Argon2 hashes built at start-up.

use crate::models::{Account, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::Result;

/// A seed record of the credential table
#[derive(Debug, Clone, Copy)]
pub struct AccountSeed {
    pub username: &'static str,
    pub password: &'static str,
    pub name: &'static str,
    pub email: &'static str,
    pub role: UserRole,
}

/// The accounts the application ships with
pub const DEFAULT_ACCOUNTS: &[AccountSeed] = &[
    AccountSeed {
        username: "user",
        password: "user123",
        name: "Marine Researcher",
        email: "user@floatchat.com",
        role: UserRole::User,
    },
    AccountSeed {
        username: "admin",
        password: "admin123",
        name: "System Administrator",
        email: "admin@floatchat.com",
        role: UserRole::Admin,
    },
];

/// In-memory credential table
#[derive(Debug, Clone)]
pub struct CredentialTable {
    accounts: Vec<Account>,
}

impl CredentialTable {
    /// Hash the given seeds into a table
    pub fn from_seeds(seeds: &[AccountSeed]) -> Result<Self> {
        let accounts = seeds
            .iter()
            .map(|seed| {
                Ok(Account {
                    username: seed.username.to_string(),
                    name: seed.name.to_string(),
                    email: seed.email.to_string(),
                    role: seed.role,
                    password_hash: hash_password(seed.password)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { accounts })
    }

    /// Table with the default accounts
    pub fn with_defaults() -> Result<Self> {
        Self::from_seeds(DEFAULT_ACCOUNTS)
    }

    /// Return the matching account if `username` and `password` agree
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&Account> {
        let account = self.find(username)?;
        match verify_password(password, &account.password_hash) {
            Ok(true) => Some(account),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!("Stored hash for {} is unusable: {}", username, e);
                None
            }
        }
    }

    pub fn find(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username == username)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accounts_authenticate() {
        let table = CredentialTable::with_defaults().unwrap();

        let user = table.authenticate("user", "user123").expect("user should log in");
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.name, "Marine Researcher");

        let admin = table.authenticate("admin", "admin123").expect("admin should log in");
        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(admin.name, "System Administrator");
    }

    #[test]
    fn test_wrong_pairs_rejected() {
        let table = CredentialTable::with_defaults().unwrap();

        assert!(table.authenticate("user", "admin123").is_none());
        assert!(table.authenticate("admin", "user123").is_none());
        assert!(table.authenticate("ghost", "user123").is_none());
        assert!(table.authenticate("", "").is_none());
    }

    #[test]
    fn test_hashes_not_plaintext() {
        let table = CredentialTable::with_defaults().unwrap();
        for account in table.accounts() {
            assert!(account.password_hash.starts_with("$argon2"));
        }
    }
}
