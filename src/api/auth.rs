//! Authentication API endpoints
//!
//! Handles HTTP requests for the session:
//! - POST /api/login - Open a session for a fixed account
//! - POST /api/logout - Close the session
//! - GET /api/session - Current session, if any
//! - POST /api/register - Closed; accounts are fixed

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{clear_cookie, ApiError, AppState};
use crate::models::{Session, UserRole};
use crate::services::{CredentialStore, SessionError};

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public part of a session
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub name: String,
    pub role: UserRole,
}

impl From<&Session> for UserResponse {
    fn from(session: &Session) -> Self {
        Self {
            username: session.username.clone(),
            name: session.name.clone(),
            role: session.role,
        }
    }
}

/// Response for successful login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Page the client should show next
    pub redirect: &'static str,
}

/// Response for the session probe
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(current_session))
        .route("/register", post(register))
}

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut controller = state.restore_session(&headers);

    let session = controller
        .login(body.username.trim(), &body.password)
        .map_err(|e| match e {
            SessionError::InvalidCredentials => {
                tracing::info!("Rejected login for {:?}", body.username);
                ApiError::unauthorized(e.to_string())
            }
            SessionError::Token(e) => ApiError::internal_error(format!("Failed to issue credential: {}", e)),
        })?
        .clone();

    if let Err(e) = state.user_repo.touch_last_login(&session.username, Utc::now()).await {
        tracing::warn!("Failed to record login for {}: {:#}", session.username, e);
    }

    let page = controller.current_page();
    let store = controller.into_store();
    let token = store
        .load()
        .ok_or_else(|| ApiError::internal_error("Credential was not stored"))?;

    let mut response_headers = HeaderMap::new();
    if let Some(cookie) = state.cookie_header(&store) {
        response_headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((
        response_headers,
        Json(AuthResponse {
            user: UserResponse::from(&session),
            token,
            expires_at: session.expires_at(),
            redirect: page.path(),
        }),
    ))
}

/// POST /api/logout
///
/// Always succeeds; a missing session is already logged out.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let mut controller = state.restore_session(&headers);
    state.end_session(&mut controller).await;

    (
        [(header::SET_COOKIE, clear_cookie(&state.session_cookie))],
        Json(serde_json::json!({ "message": "Logged out" })),
    )
}

/// GET /api/session
async fn current_session(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let controller = state.restore_session(&headers);

    let body = match controller.session() {
        Some(session) => {
            let account = state
                .user_repo
                .get_by_username(&session.username)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Failed to load account {}: {:#}", session.username, e);
                    None
                });
            let last_login = state
                .user_repo
                .last_login(&session.username)
                .await
                .unwrap_or_default();
            SessionResponse {
                authenticated: true,
                user: Some(UserResponse::from(session)),
                expires_at: session.expires_at(),
                email: account.map(|a| a.email),
                last_login,
            }
        }
        None => SessionResponse {
            authenticated: false,
            user: None,
            expires_at: None,
            email: None,
            last_login: None,
        },
    };

    let mut response_headers = HeaderMap::new();
    if let Some(cookie) = state.cookie_header(controller.store()) {
        response_headers.insert(header::SET_COOKIE, cookie);
    }
    (response_headers, Json(body))
}

/// POST /api/register
async fn register() -> ApiError {
    ApiError::forbidden("Registration is closed")
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{login_token, test_server};
    use axum::http::{header, HeaderValue, StatusCode};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_login_user_sets_cookie() {
        let server = test_server().await;

        let response = server
            .post("/api/login")
            .json(&json!({"username": "user", "password": "user123"}))
            .await;

        response.assert_status_ok();
        let cookie = response.header(header::SET_COOKIE);
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("floatchat_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));

        let body: Value = response.json();
        assert_eq!(body["user"]["role"], "user");
        assert_eq!(body["user"]["name"], "Marine Researcher");
        assert_eq!(body["redirect"], "/user");
    }

    #[tokio::test]
    async fn test_login_admin_redirects_to_admin() {
        let server = test_server().await;

        let body: Value = server
            .post("/api/login")
            .json(&json!({"username": "admin", "password": "admin123"}))
            .await
            .json();

        assert_eq!(body["redirect"], "/admin");
        assert_eq!(body["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn test_bad_login_is_401_without_cookie() {
        let server = test_server().await;

        let response = server
            .post("/api/login")
            .json(&json!({"username": "user", "password": "admin123"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.maybe_header(header::SET_COOKIE).is_none());
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_session_with_bearer_token() {
        let server = test_server().await;
        let login: Value = server
            .post("/api/login")
            .json(&json!({"username": "user", "password": "user123"}))
            .await
            .json();
        let token = login["token"].as_str().unwrap();

        let body: Value = server
            .get("/api/session")
            .authorization_bearer(token)
            .await
            .json();
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["user"]["username"], "user");
        assert_eq!(body["email"], "user@floatchat.com");
        assert!(body["last_login"].is_string());

        let anonymous: Value = server.get("/api/session").await.json();
        assert_eq!(anonymous["authenticated"], false);
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_cleared() {
        let server = test_server().await;

        let response = server
            .get("/api/session")
            .add_header(
                header::COOKIE,
                HeaderValue::from_static("floatchat_session=not-a-credential"),
            )
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["authenticated"], false);
        let cookie = response.header(header::SET_COOKIE);
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let server = test_server().await;

        let response = server.post("/api/logout").await;

        response.assert_status_ok();
        assert!(response
            .header(header::SET_COOKIE)
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_logout_drops_chat_transcript() {
        let server = test_server().await;
        let token = login_token(&server, "user", "user123").await;

        server
            .post("/api/chat")
            .authorization_bearer(&token)
            .json(&json!({"query": "temperature"}))
            .await
            .assert_status_ok();
        server
            .post("/api/logout")
            .authorization_bearer(&token)
            .await
            .assert_status_ok();

        let token = login_token(&server, "user", "user123").await;
        let body: Value = server
            .get("/api/chat/history")
            .authorization_bearer(&token)
            .await
            .json();

        assert!(body["transcript"].as_array().unwrap().is_empty());
        assert!(body["history"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_is_closed() {
        let server = test_server().await;

        server
            .post("/api/register")
            .json(&json!({"username": "new", "password": "x"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
