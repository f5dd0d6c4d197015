//! User repository
//!
//! Database operations for the `users` table.
//!
//! The login table is fixed in memory; this repository mirrors those accounts
//! into the database so the admin status and the seeded rows stay consistent.

use crate::db::DbPool;
use crate::models::{Account, UserRole, UserSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert the account, or refresh name/email/role/hash if it exists
    async fn upsert(&self, account: &Account) -> Result<()>;

    /// Get an account by username
    async fn get_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Record a successful login
    async fn touch_last_login(&self, username: &str, at: DateTime<Utc>) -> Result<()>;

    /// Last recorded login, if any
    async fn last_login(&self, username: &str) -> Result<Option<DateTime<Utc>>>;

    /// All accounts with their login times, by username
    async fn list(&self) -> Result<Vec<UserSummary>>;

    /// Count total users
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn upsert(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, role, full_name, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                email = excluded.email,
                password_hash = excluded.password_hash,
                role = excluded.role,
                full_name = excluded.full_name
            "#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.to_string())
        .bind(&account.name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert user {}", account.username))?;

        Ok(())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT username, email, password_hash, role, full_name
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by username")?;

        match row {
            Some(row) => {
                let role: String = row.get("role");
                let name: Option<String> = row.get("full_name");
                Ok(Some(Account {
                    username: row.get("username"),
                    name: name.unwrap_or_default(),
                    email: row.get("email"),
                    role: UserRole::from_str(&role)?,
                    password_hash: row.get("password_hash"),
                }))
            }
            None => Ok(None),
        }
    }

    async fn touch_last_login(&self, username: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE username = ?")
            .bind(at)
            .bind(username)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    async fn last_login(&self, username: &str) -> Result<Option<DateTime<Utc>>> {
        let value: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT last_login FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to read last login")?;
        Ok(value.flatten())
    }

    async fn list(&self) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT username, email, role, full_name, created_at, last_login
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter()
            .map(|row| {
                let role: String = row.get("role");
                Ok(UserSummary {
                    username: row.get("username"),
                    email: row.get("email"),
                    role: UserRole::from_str(&role)?,
                    full_name: row.get("full_name"),
                    created_at: row.get("created_at"),
                    last_login: row.get("last_login"),
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(count)
    }
}
