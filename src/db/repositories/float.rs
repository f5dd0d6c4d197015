//! Float repository
//!
//! Database operations for ARGO floats and their audit trail.
//!
//! This module provides:
//! - `FloatRepository` trait defining the interface for float data access
//! - `SqlxFloatRepository` implementing the trait for SQLite
//!
//! Status and battery updates are audited by the `trg_argo_floats_audit`
//! trigger, never by this code.

use crate::db::DbPool;
use crate::models::{ArgoFloat, CreateFloatInput, FloatAuditEntry, FloatStatus, GeoBounds, UpdateFloatInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

const FLOAT_COLUMNS: &str = "float_id, latitude, longitude, status, temperature, salinity, region, \
     battery_level, data_quality, deployment_date, last_profile";

/// Float repository trait
#[async_trait]
pub trait FloatRepository: Send + Sync {
    /// List every float ordered by id
    async fn list(&self) -> Result<Vec<ArgoFloat>>;

    /// Get a float by its WMO id
    async fn get(&self, float_id: &str) -> Result<Option<ArgoFloat>>;

    /// List floats from the `active_floats` view
    async fn list_active(&self) -> Result<Vec<ArgoFloat>>;

    /// Active floats inside a bounding box (edges inclusive)
    async fn in_region(&self, bounds: &GeoBounds) -> Result<Vec<ArgoFloat>>;

    /// Register a new float
    async fn create(&self, input: &CreateFloatInput) -> Result<ArgoFloat>;

    /// Update status and/or battery level. Returns `None` if the float is unknown.
    async fn update(&self, float_id: &str, input: &UpdateFloatInput) -> Result<Option<ArgoFloat>>;

    /// Audit rows for a float, newest first
    async fn audit_for(&self, float_id: &str) -> Result<Vec<FloatAuditEntry>>;

    /// Count all floats
    async fn count(&self) -> Result<i64>;

    /// Count active floats
    async fn count_active(&self) -> Result<i64>;
}

/// SQLx-based float repository implementation
pub struct SqlxFloatRepository {
    pool: DbPool,
}

impl SqlxFloatRepository {
    /// Create a new SQLx float repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn FloatRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FloatRepository for SqlxFloatRepository {
    async fn list(&self) -> Result<Vec<ArgoFloat>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM argo_floats ORDER BY float_id",
            FLOAT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list floats")?;

        rows.iter().map(row_to_float).collect()
    }

    async fn get(&self, float_id: &str) -> Result<Option<ArgoFloat>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM argo_floats WHERE float_id = ?",
            FLOAT_COLUMNS
        ))
        .bind(float_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get float")?;

        row.as_ref().map(row_to_float).transpose()
    }

    async fn list_active(&self) -> Result<Vec<ArgoFloat>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM active_floats ORDER BY float_id",
            FLOAT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active floats")?;

        rows.iter().map(row_to_float).collect()
    }

    async fn in_region(&self, bounds: &GeoBounds) -> Result<Vec<ArgoFloat>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM active_floats
            WHERE latitude BETWEEN ? AND ?
              AND longitude BETWEEN ? AND ?
            ORDER BY float_id
            "#,
            FLOAT_COLUMNS
        ))
        .bind(bounds.min_lat)
        .bind(bounds.max_lat)
        .bind(bounds.min_lon)
        .bind(bounds.max_lon)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query floats in region")?;

        rows.iter().map(row_to_float).collect()
    }

    async fn create(&self, input: &CreateFloatInput) -> Result<ArgoFloat> {
        sqlx::query(
            r#"
            INSERT INTO argo_floats (float_id, latitude, longitude, status, region, battery_level, data_quality, deployment_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, DATE('now'))
            "#,
        )
        .bind(&input.float_id)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.status.to_string())
        .bind(&input.region)
        .bind(input.battery_level)
        .bind(&input.data_quality)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create float {}", input.float_id))?;

        self.get(&input.float_id)
            .await?
            .context("Float not found after insert")
    }

    async fn update(&self, float_id: &str, input: &UpdateFloatInput) -> Result<Option<ArgoFloat>> {
        let result = sqlx::query(
            r#"
            UPDATE argo_floats
            SET status = COALESCE(?, status),
                battery_level = COALESCE(?, battery_level)
            WHERE float_id = ?
            "#,
        )
        .bind(input.status.map(|s| s.to_string()))
        .bind(input.battery_level)
        .bind(float_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update float {}", float_id))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(float_id).await
    }

    async fn audit_for(&self, float_id: &str) -> Result<Vec<FloatAuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, float_id, old_status, new_status, old_battery, new_battery, changed_at
            FROM float_audit
            WHERE float_id = ?
            ORDER BY id DESC
            "#,
        )
        .bind(float_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list float audit entries")?;

        Ok(rows
            .iter()
            .map(|row| FloatAuditEntry {
                id: row.get("id"),
                float_id: row.get("float_id"),
                old_status: row.get("old_status"),
                new_status: row.get("new_status"),
                old_battery: row.get("old_battery"),
                new_battery: row.get("new_battery"),
                changed_at: row.get("changed_at"),
            })
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM argo_floats")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count floats")?;
        Ok(count)
    }

    async fn count_active(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM active_floats")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count active floats")?;
        Ok(count)
    }
}

fn row_to_float(row: &SqliteRow) -> Result<ArgoFloat> {
    let status: String = row.get("status");
    Ok(ArgoFloat {
        float_id: row.get("float_id"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        status: FloatStatus::from_str(&status)?,
        temperature: row.get("temperature"),
        salinity: row.get("salinity"),
        region: row.get("region"),
        battery_level: row.get("battery_level"),
        data_quality: row.get("data_quality"),
        deployment_date: row.get("deployment_date"),
        last_profile: row.get("last_profile"),
    })
}
