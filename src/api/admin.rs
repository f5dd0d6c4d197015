//! Admin API endpoints
//!
//! All routes here sit behind `require_auth` + `require_admin`:
//! - POST /api/admin/convert-nc - Simulated NetCDF to CSV conversion
//! - POST /api/admin/chatbot-training - Add question/answer pairs
//! - GET /api/admin/system-status - Counts and process statistics
//! - PUT /api/admin/floats/{float_id} - Update status/battery
//! - GET /api/admin/floats/{float_id}/audit - Audit trail of a float
//! - GET /api/admin/users - Stored accounts with their last login

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ArgoFloat, FloatAuditEntry, UpdateFloatInput, UserSummary};
use crate::services::{
    ConversionError, ConversionReport, SystemStatus, TrainingError, TrainingReport, Upload,
};

impl From<ConversionError> for ApiError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::NoFile
            | ConversionError::NotNetcdf
            | ConversionError::InvalidFilename => ApiError::validation_error(e.to_string()),
            ConversionError::TooLarge { size, limit } => ApiError::with_details(
                "PAYLOAD_TOO_LARGE",
                e.to_string(),
                serde_json::json!({ "size": size, "limit": limit }),
            ),
            ConversionError::Failed(_) => ApiError::new("CONVERSION_FAILED", e.to_string()),
            ConversionError::Internal(e) => {
                tracing::error!("Conversion error: {:#}", e);
                ApiError::internal_error("Conversion could not be run")
            }
        }
    }
}

impl From<TrainingError> for ApiError {
    fn from(e: TrainingError) -> Self {
        match e {
            TrainingError::InvalidJson(reason) => ApiError::with_details(
                "VALIDATION_ERROR",
                "Invalid training data format",
                serde_json::json!({ "reason": reason }),
            ),
            TrainingError::Internal(e) => {
                tracing::error!("Training update failed: {:#}", e);
                ApiError::internal_error("Training update failed")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrainingResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: TrainingReport,
}

impl From<TrainingReport> for TrainingResponse {
    fn from(report: TrainingReport) -> Self {
        Self {
            message: format!("Added {} training items to chatbot database", report.added),
            report,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: ConversionReport,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/convert-nc", post(convert_netcdf))
        .route("/chatbot-training", post(update_training))
        .route("/system-status", get(system_status))
        .route("/floats/{float_id}", put(update_float))
        .route("/floats/{float_id}/audit", get(float_audit))
        .route("/users", get(list_users))
}

/// Pull the `file` field out of a multipart body.
///
/// A missing field, or one without a file name, is `None`.
pub(crate) async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(|s| s.to_string()).unwrap_or_default();
        let data = field.bytes().await.map_err(multipart_error)?;
        if filename.is_empty() && data.is_empty() {
            return Ok(None);
        }

        return Ok(Some(Upload {
            filename,
            data: data.to_vec(),
        }));
    }

    Ok(None)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new("PAYLOAD_TOO_LARGE", "Upload exceeds the size limit")
    } else {
        ApiError::validation_error(format!("Failed to read multipart: {}", e))
    }
}

/// POST /api/admin/convert-nc
async fn convert_netcdf(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    let report = state
        .conversion_service
        .convert(&user.0.username, upload)
        .await?;

    Ok(Json(ConversionResponse {
        message: format!("Successfully converted {}", report.original_file),
        report,
    }))
}

/// POST /api/admin/chatbot-training
///
/// The body is the raw training text: a JSON array of items or an object
/// with a `training_data` array.
async fn update_training(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: String,
) -> Result<Json<TrainingResponse>, ApiError> {
    let report = state.training_service.apply(&user.0.username, &body).await?;
    Ok(Json(report.into()))
}

/// GET /api/admin/system-status
async fn system_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let status = state.status_service.snapshot().await.map_err(|e| {
        tracing::error!("Status snapshot failed: {:#}", e);
        ApiError::internal_error("Failed to collect system status")
    })?;
    Ok(Json(status))
}

/// PUT /api/admin/floats/{float_id}
async fn update_float(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(float_id): Path<String>,
    Json(input): Json<UpdateFloatInput>,
) -> Result<Json<ArgoFloat>, ApiError> {
    let updated = state.float_service.update(&float_id, &input).await?;

    let details = serde_json::json!({
        "float_id": updated.float_id,
        "status": updated.status,
        "battery_level": updated.battery_level,
    });
    if let Err(e) = state
        .log_repo
        .insert_system("float_updated", &user.0.username, &details)
        .await
    {
        tracing::warn!("Failed to log float update: {:#}", e);
    }

    Ok(Json(updated))
}

/// GET /api/admin/floats/{float_id}/audit
async fn float_audit(
    State(state): State<AppState>,
    Path(float_id): Path<String>,
) -> Result<Json<Vec<FloatAuditEntry>>, ApiError> {
    Ok(Json(state.float_service.audit(&float_id).await?))
}

/// GET /api/admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = state.user_repo.list().await.map_err(|e| {
        tracing::error!("Failed to list users: {:#}", e);
        ApiError::internal_error("Database error")
    })?;
    Ok(Json(users))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{login_token, test_server};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{json, Value};

    const HDF5_MAGIC: &[u8] = b"\x89HDF\r\n\x1a\n";

    #[tokio::test]
    async fn test_user_listing_is_admin_only() {
        let server = test_server().await;
        let user = login_token(&server, "user", "user123").await;
        let admin = login_token(&server, "admin", "admin123").await;

        server
            .get("/api/admin/users")
            .authorization_bearer(&user)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let body: Value = server
            .get("/api/admin/users")
            .authorization_bearer(&admin)
            .await
            .json();
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["username"], "admin");
        assert_eq!(users[0]["email"], "admin@floatchat.com");
        assert_eq!(users[0]["role"], "admin");
        assert!(users[0]["last_login"].is_string());
        assert!(users[1].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_admin_routes_reject_plain_user() {
        let server = test_server().await;
        let token = login_token(&server, "user", "user123").await;

        server
            .get("/api/admin/system-status")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get("/api/admin/system-status")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_system_status_counts() {
        let server = test_server().await;
        let token = login_token(&server, "admin", "admin123").await;

        let body: Value = server
            .get("/api/admin/system-status")
            .authorization_bearer(&token)
            .await
            .json();

        assert_eq!(body["database"]["total_floats"], 6);
        assert_eq!(body["database"]["active_floats"], 5);
        assert_eq!(body["database"]["total_users"], 2);
        assert_eq!(body["database"]["total_profiles"], 18);
        assert_eq!(body["logs"]["knowledge_documents"], 8);
        assert!(body["system"]["total_requests"].as_u64().unwrap() >= 1);
        assert_eq!(body["system"]["failed_requests"], 0);
        assert!(body["system"]["uptime_formatted"].is_string());
    }

    #[tokio::test]
    async fn test_training_adds_documents() {
        let server = test_server().await;
        let token = login_token(&server, "admin", "admin123").await;

        let body: Value = server
            .post("/api/admin/chatbot-training")
            .authorization_bearer(&token)
            .text(
                json!([
                    {"question": "What is a float?", "answer": "A drifting profiler.", "category": "basics"},
                    {"question": "No answer"}
                ])
                .to_string(),
            )
            .await
            .json();

        assert_eq!(body["added"], 1);
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["message"], "Added 1 training items to chatbot database");

        let status: Value = server
            .get("/api/admin/system-status")
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(status["logs"]["knowledge_documents"], 9);
    }

    #[tokio::test]
    async fn test_malformed_training_is_400() {
        let server = test_server().await;
        let token = login_token(&server, "admin", "admin123").await;

        let response = server
            .post("/api/admin/chatbot-training")
            .authorization_bearer(&token)
            .text("[{not json")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_convert_netcdf() {
        let server = test_server().await;
        let token = login_token(&server, "admin", "admin123").await;

        let mut data = HDF5_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        let form = MultipartForm::new()
            .add_part("file", Part::bytes(data).file_name("argo profile.nc"));

        let body: Value = server
            .post("/api/admin/convert-nc")
            .authorization_bearer(&token)
            .multipart(form)
            .await
            .json();

        assert_eq!(body["original_file"], "argo_profile.nc");
        assert_eq!(body["csv_file"], "argo_profile.csv");
        assert_eq!(body["bytes"], 72);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn test_convert_without_file_is_400() {
        let server = test_server().await;
        let token = login_token(&server, "admin", "admin123").await;

        let form = MultipartForm::new().add_text("note", "nothing attached");
        server
            .post("/api/admin/convert-nc")
            .authorization_bearer(&token)
            .multipart(form)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let form = MultipartForm::new()
            .add_part("file", Part::bytes(b"a,b".to_vec()).file_name("data.csv"));
        server
            .post("/api/admin/convert-nc")
            .authorization_bearer(&token)
            .multipart(form)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_float_writes_audit() {
        let server = test_server().await;
        let token = login_token(&server, "admin", "admin123").await;

        let updated: Value = server
            .put("/api/admin/floats/2901624")
            .authorization_bearer(&token)
            .json(&json!({"status": "maintenance", "battery_level": 40}))
            .await
            .json();
        assert_eq!(updated["status"], "maintenance");
        assert_eq!(updated["battery_level"], 40);

        let audit: Value = server
            .get("/api/admin/floats/2901624/audit")
            .authorization_bearer(&token)
            .await
            .json();
        let entries = audit.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["old_status"], "active");
        assert_eq!(entries[0]["new_battery"], 40);

        server
            .put("/api/admin/floats/0000000")
            .authorization_bearer(&token)
            .json(&json!({"battery_level": 10}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
