//! Float service
//!
//! Validation in front of the float and profile repositories. Admin updates
//! are the only mutation of the float list.

use crate::db::repositories::{FloatRepository, ProfileRepository, MAX_PROFILE_LIMIT};
use crate::models::{ArgoFloat, CreateFloatInput, FloatAuditEntry, GeoBounds, OceanProfile, UpdateFloatInput};
use std::sync::Arc;

/// Profiles returned when the caller gives no limit
pub const DEFAULT_PROFILE_LIMIT: i64 = 50;

/// Error types for float operations
#[derive(Debug, thiserror::Error)]
pub enum FloatServiceError {
    #[error("Float not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Float already exists: {0}")]
    AlreadyExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FloatService {
    floats: Arc<dyn FloatRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl FloatService {
    pub fn new(floats: Arc<dyn FloatRepository>, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { floats, profiles }
    }

    pub async fn list(&self) -> Result<Vec<ArgoFloat>, FloatServiceError> {
        Ok(self.floats.list().await?)
    }

    pub async fn list_active(&self) -> Result<Vec<ArgoFloat>, FloatServiceError> {
        Ok(self.floats.list_active().await?)
    }

    /// Active floats inside `bounds`
    pub async fn in_region(&self, bounds: &GeoBounds) -> Result<Vec<ArgoFloat>, FloatServiceError> {
        if !bounds.is_valid() {
            return Err(FloatServiceError::ValidationError(
                "Bounding box must satisfy min <= max within valid coordinates".to_string(),
            ));
        }
        Ok(self.floats.in_region(bounds).await?)
    }

    /// Profiles of a float, newest first
    pub async fn profiles(
        &self,
        float_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<OceanProfile>, FloatServiceError> {
        let limit = limit.unwrap_or(DEFAULT_PROFILE_LIMIT);
        if !(1..=MAX_PROFILE_LIMIT).contains(&limit) {
            return Err(FloatServiceError::ValidationError(format!(
                "limit must be between 1 and {}",
                MAX_PROFILE_LIMIT
            )));
        }
        Ok(self.profiles.by_float(float_id, limit).await?)
    }

    /// Most recent profile of every float
    pub async fn latest_profiles(&self) -> Result<Vec<OceanProfile>, FloatServiceError> {
        Ok(self.profiles.latest().await?)
    }

    pub async fn create(&self, input: &CreateFloatInput) -> Result<ArgoFloat, FloatServiceError> {
        let float_id = input.float_id.trim();
        if float_id.is_empty() || float_id.len() > 20 {
            return Err(FloatServiceError::ValidationError(
                "float_id must be 1-20 characters".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&input.latitude) || !(-180.0..=180.0).contains(&input.longitude) {
            return Err(FloatServiceError::ValidationError(
                "Coordinates out of range".to_string(),
            ));
        }
        validate_battery(input.battery_level)?;

        if self.floats.get(float_id).await?.is_some() {
            return Err(FloatServiceError::AlreadyExists(float_id.to_string()));
        }

        let input = CreateFloatInput {
            float_id: float_id.to_string(),
            ..input.clone()
        };
        let created = self.floats.create(&input).await?;
        tracing::info!("Registered float {}", created.float_id);
        Ok(created)
    }

    /// Update status and/or battery; the database trigger audits the change
    pub async fn update(
        &self,
        float_id: &str,
        input: &UpdateFloatInput,
    ) -> Result<ArgoFloat, FloatServiceError> {
        if input.status.is_none() && input.battery_level.is_none() {
            return Err(FloatServiceError::ValidationError(
                "Nothing to update".to_string(),
            ));
        }
        if let Some(battery) = input.battery_level {
            validate_battery(battery)?;
        }

        let updated = self
            .floats
            .update(float_id, input)
            .await?
            .ok_or_else(|| FloatServiceError::NotFound(float_id.to_string()))?;
        tracing::info!(
            "Float {} updated: status={}, battery={}",
            updated.float_id,
            updated.status,
            updated.battery_level
        );
        Ok(updated)
    }

    pub async fn audit(&self, float_id: &str) -> Result<Vec<FloatAuditEntry>, FloatServiceError> {
        if self.floats.get(float_id).await?.is_none() {
            return Err(FloatServiceError::NotFound(float_id.to_string()));
        }
        Ok(self.floats.audit_for(float_id).await?)
    }
}

fn validate_battery(level: i64) -> Result<(), FloatServiceError> {
    if (0..=100).contains(&level) {
        Ok(())
    } else {
        Err(FloatServiceError::ValidationError(
            "battery_level must be between 0 and 100".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxFloatRepository, SqlxProfileRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::FloatStatus;

    async fn setup_service() -> FloatService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        migrations::seed_sample_data(&pool).await.unwrap();
        FloatService::new(
            SqlxFloatRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool),
        )
    }

    fn new_float(id: &str) -> CreateFloatInput {
        CreateFloatInput {
            float_id: id.to_string(),
            latitude: -20.0,
            longitude: 60.0,
            status: FloatStatus::Active,
            region: None,
            battery_level: 100,
            data_quality: "good".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_region_rejected() {
        let service = setup_service().await;
        let bounds = GeoBounds {
            min_lat: 0.0,
            max_lat: -10.0,
            min_lon: 60.0,
            max_lon: 70.0,
        };

        assert!(matches!(
            service.in_region(&bounds).await,
            Err(FloatServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_profiles_default_and_bad_limit() {
        let service = setup_service().await;

        assert_eq!(service.profiles("2901625", None).await.unwrap().len(), 3);
        assert_eq!(service.profiles("2901625", Some(1)).await.unwrap().len(), 1);
        assert!(matches!(
            service.profiles("2901625", Some(0)).await,
            Err(FloatServiceError::ValidationError(_))
        ));
        assert!(service.profiles("2901625", Some(101)).await.is_err());
    }

    #[tokio::test]
    async fn test_create_validation_and_conflict() {
        let service = setup_service().await;

        let mut bad = new_float("2902001");
        bad.latitude = 95.0;
        assert!(matches!(
            service.create(&bad).await,
            Err(FloatServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(&new_float("  ")).await,
            Err(FloatServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(&new_float("2901623")).await,
            Err(FloatServiceError::AlreadyExists(_))
        ));

        let created = service.create(&new_float(" 2902001 ")).await.unwrap();
        assert_eq!(created.float_id, "2902001");
    }

    #[tokio::test]
    async fn test_update_and_audit() {
        let service = setup_service().await;

        let updated = service
            .update(
                "2901627",
                &UpdateFloatInput {
                    status: Some(FloatStatus::Inactive),
                    battery_level: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, FloatStatus::Inactive);

        let audit = service.audit("2901627").await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].new_status, "inactive");
        assert_eq!(audit[0].old_battery, audit[0].new_battery);
    }

    #[tokio::test]
    async fn test_update_errors() {
        let service = setup_service().await;

        assert!(matches!(
            service.update("2901623", &UpdateFloatInput::default()).await,
            Err(FloatServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service
                .update(
                    "2901623",
                    &UpdateFloatInput {
                        status: None,
                        battery_level: Some(150)
                    }
                )
                .await,
            Err(FloatServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service
                .update(
                    "missing",
                    &UpdateFloatInput {
                        status: Some(FloatStatus::Active),
                        battery_level: None
                    }
                )
                .await,
            Err(FloatServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.audit("missing").await,
            Err(FloatServiceError::NotFound(_))
        ));
    }
}
