//! Float and profile API endpoints
//!
//! - GET /api/floats - All floats
//! - POST /api/floats - Register a float (admin)
//! - GET /api/floats/active - Active floats
//! - GET /api/floats/region - Active floats inside a bounding box
//! - GET /api/profiles/latest - Latest profile of every float
//! - GET /api/profiles/{float_id} - Profiles of a float, newest first

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ArgoFloat, CreateFloatInput, GeoBounds, OceanProfile};
use crate::services::FloatServiceError;

impl From<FloatServiceError> for ApiError {
    fn from(e: FloatServiceError) -> Self {
        match e {
            FloatServiceError::NotFound(id) => ApiError::not_found(format!("Float not found: {}", id)),
            FloatServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            FloatServiceError::AlreadyExists(id) => {
                ApiError::conflict(format!("Float already exists: {}", id))
            }
            FloatServiceError::InternalError(e) => {
                tracing::error!("Float query failed: {:#}", e);
                ApiError::internal_error("Database error")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FloatListResponse {
    pub floats: Vec<ArgoFloat>,
    pub count: usize,
}

impl From<Vec<ArgoFloat>> for FloatListResponse {
    fn from(floats: Vec<ArgoFloat>) -> Self {
        Self {
            count: floats.len(),
            floats,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProfileListResponse {
    pub float_id: String,
    pub profiles: Vec<OceanProfile>,
    pub count: usize,
}

/// Routes for authenticated users
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/floats", get(list_floats).post(create_float))
        .route("/floats/active", get(list_active))
        .route("/floats/region", get(floats_in_region))
        .route("/profiles/latest", get(latest_profiles))
        .route("/profiles/{float_id}", get(list_profiles))
}

/// GET /api/floats
async fn list_floats(State(state): State<AppState>) -> Result<Json<FloatListResponse>, ApiError> {
    Ok(Json(state.float_service.list().await?.into()))
}

/// POST /api/floats
async fn create_float(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateFloatInput>,
) -> Result<(StatusCode, Json<ArgoFloat>), ApiError> {
    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    let created = state.float_service.create(&input).await?;
    let details = serde_json::json!({ "float_id": created.float_id });
    if let Err(e) = state
        .log_repo
        .insert_system("float_created", &user.0.username, &details)
        .await
    {
        tracing::warn!("Failed to log float creation: {:#}", e);
    }

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/floats/active
async fn list_active(State(state): State<AppState>) -> Result<Json<FloatListResponse>, ApiError> {
    Ok(Json(state.float_service.list_active().await?.into()))
}

/// GET /api/floats/region?min_lat&max_lat&min_lon&max_lon
async fn floats_in_region(
    State(state): State<AppState>,
    Query(bounds): Query<GeoBounds>,
) -> Result<Json<FloatListResponse>, ApiError> {
    Ok(Json(state.float_service.in_region(&bounds).await?.into()))
}

/// GET /api/profiles/latest
async fn latest_profiles(State(state): State<AppState>) -> Result<Json<Vec<OceanProfile>>, ApiError> {
    Ok(Json(state.float_service.latest_profiles().await?))
}

/// GET /api/profiles/{float_id}?limit=
async fn list_profiles(
    State(state): State<AppState>,
    Path(float_id): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<ProfileListResponse>, ApiError> {
    let profiles = state.float_service.profiles(&float_id, query.limit).await?;
    Ok(Json(ProfileListResponse {
        float_id,
        count: profiles.len(),
        profiles,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{login_token, test_server};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_floats_require_login() {
        let server = test_server().await;

        server
            .get("/api/floats")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_and_active() {
        let server = test_server().await;
        let token = login_token(&server, "user", "user123").await;

        let all: Value = server.get("/api/floats").authorization_bearer(&token).await.json();
        assert_eq!(all["count"], 6);

        let active: Value = server
            .get("/api/floats/active")
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(active["count"], 5);
        assert!(active["floats"]
            .as_array()
            .unwrap()
            .iter()
            .all(|f| f["status"] == "active"));
    }

    #[tokio::test]
    async fn test_region_query() {
        let server = test_server().await;
        let token = login_token(&server, "user", "user123").await;

        let body: Value = server
            .get("/api/floats/region")
            .add_query_params(json!({"min_lat": -20, "max_lat": -10, "min_lon": 66, "max_lon": 80}))
            .authorization_bearer(&token)
            .await
            .json();

        let mut ids: Vec<&str> = body["floats"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["float_id"].as_str().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["2901623", "2901624", "2901626"]);
    }

    #[tokio::test]
    async fn test_inverted_region_is_400() {
        let server = test_server().await;
        let token = login_token(&server, "user", "user123").await;

        server
            .get("/api/floats/region")
            .add_query_params(json!({"min_lat": 10, "max_lat": -10, "min_lon": 66, "max_lon": 80}))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_profiles_newest_first_and_limited() {
        let server = test_server().await;
        let token = login_token(&server, "user", "user123").await;

        let body: Value = server
            .get("/api/profiles/2901623")
            .add_query_param("limit", 2)
            .authorization_bearer(&token)
            .await
            .json();

        assert_eq!(body["count"], 2);
        let profiles = body["profiles"].as_array().unwrap();
        assert!(profiles[0]["profile_date"].as_str() >= profiles[1]["profile_date"].as_str());

        server
            .get("/api/profiles/2901623")
            .add_query_param("limit", 0)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_latest_profiles_one_per_float() {
        let server = test_server().await;
        let token = login_token(&server, "user", "user123").await;

        let body: Value = server
            .get("/api/profiles/latest")
            .authorization_bearer(&token)
            .await
            .json();

        assert_eq!(body.as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_create_float_needs_admin() {
        let server = test_server().await;
        let user = login_token(&server, "user", "user123").await;
        let admin = login_token(&server, "admin", "admin123").await;
        let float = json!({
            "float_id": "2902001",
            "latitude": -12.5,
            "longitude": 70.0,
            "battery_level": 100
        });

        server
            .post("/api/floats")
            .authorization_bearer(&user)
            .json(&float)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = server
            .post("/api/floats")
            .authorization_bearer(&admin)
            .json(&float)
            .await;
        response.assert_status(StatusCode::CREATED);

        server
            .post("/api/floats")
            .authorization_bearer(&admin)
            .json(&float)
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}
