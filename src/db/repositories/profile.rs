//! Ocean profile repository

use crate::db::DbPool;
use crate::models::OceanProfile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Upper bound for a single profile query
pub const MAX_PROFILE_LIMIT: i64 = 100;

/// Profile repository trait
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Profiles for a float, newest first, at most `limit` rows
    async fn by_float(&self, float_id: &str, limit: i64) -> Result<Vec<OceanProfile>>;

    /// Latest profile per float, from the `latest_profiles` view
    async fn latest(&self) -> Result<Vec<OceanProfile>>;

    /// Count all profiles
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based profile repository implementation
pub struct SqlxProfileRepository {
    pool: DbPool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn by_float(&self, float_id: &str, limit: i64) -> Result<Vec<OceanProfile>> {
        let limit = limit.clamp(0, MAX_PROFILE_LIMIT);
        let rows = sqlx::query(
            r#"
            SELECT id, float_id, profile_date, latitude, longitude, depth,
                   temperature, salinity, pressure, oxygen, quality_flag
            FROM ocean_profiles
            WHERE float_id = ?
            ORDER BY profile_date DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(float_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to get profiles for float {}", float_id))?;

        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn latest(&self) -> Result<Vec<OceanProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT id, float_id, profile_date, latitude, longitude, depth,
                   temperature, salinity, pressure, oxygen, quality_flag
            FROM latest_profiles
            ORDER BY float_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to get latest profiles")?;

        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ocean_profiles")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count profiles")?;
        Ok(count)
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> OceanProfile {
    OceanProfile {
        id: row.get("id"),
        float_id: row.get("float_id"),
        profile_date: row.get("profile_date"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        depth: row.get("depth"),
        temperature: row.get("temperature"),
        salinity: row.get("salinity"),
        pressure: row.get("pressure"),
        oxygen: row.get("oxygen"),
        quality_flag: row.get("quality_flag"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxProfileRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        migrations::seed_sample_data(&pool).await.expect("Failed to seed");
        SqlxProfileRepository::new(pool)
    }

    #[tokio::test]
    async fn test_by_float_newest_first_and_limited() {
        let repo = setup_test_repo().await;

        let profiles = repo.by_float("2901623", 2).await.expect("Failed to get profiles");

        assert_eq!(profiles.len(), 2);
        assert!(profiles[0].profile_date > profiles[1].profile_date);
        assert_eq!(profiles[0].depth, Some(5.0));
        assert!(profiles.iter().all(|p| p.float_id == "2901623"));
    }

    #[tokio::test]
    async fn test_by_float_unknown_is_empty() {
        let repo = setup_test_repo().await;
        assert!(repo.by_float("nope", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_limit_returns_nothing() {
        let repo = setup_test_repo().await;
        assert!(repo.by_float("2901623", -5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_and_count() {
        let repo = setup_test_repo().await;

        let latest = repo.latest().await.unwrap();

        assert_eq!(latest.len(), 6);
        assert_eq!(latest[0].float_id, "2901623");
        assert_eq!(latest[0].temperature, Some(28.1));
        assert_eq!(repo.count().await.unwrap(), 18);
    }
}
