//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The `ApiError` envelope returned by every JSON endpoint
//! - Authentication (stored credential validation) and admin authorization
//! - The cookie-backed credential slot used by the session controller
//! - Request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::db::repositories::{
    LogRepository, SqlxFloatRepository, SqlxKnowledgeRepository, SqlxLogRepository,
    SqlxProfileRepository, SqlxUserRepository, UserRepository,
};
use crate::db::DbPool;
use crate::models::Session;
use crate::services::{
    ChatService, ConversionService, CredentialStore, CredentialTable, FloatService,
    KnowledgeService, RequestStats, SessionCodec, SessionController, StatusService,
    TrainingService,
};
use crate::views::ViewEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub codec: Arc<SessionCodec>,
    pub credentials: Arc<CredentialTable>,
    pub user_repo: Arc<dyn UserRepository>,
    pub log_repo: Arc<dyn LogRepository>,
    pub float_service: Arc<FloatService>,
    pub chat_service: ChatService,
    pub knowledge_service: Arc<KnowledgeService>,
    pub training_service: Arc<TrainingService>,
    pub conversion_service: Arc<ConversionService>,
    pub status_service: Arc<StatusService>,
    pub views: Arc<ViewEngine>,
    pub request_stats: Arc<RequestStats>,
    pub session_cookie: Arc<str>,
    pub session_ttl: chrono::Duration,
    pub max_sources: usize,
}

impl AppState {
    /// Wire repositories and services over `pool`.
    ///
    /// The fixed accounts are written to the `users` table so that status
    /// counts and last-login stamps have rows to work with.
    pub async fn initialize(config: &Config, pool: DbPool) -> anyhow::Result<Self> {
        let credentials = Arc::new(CredentialTable::with_defaults()?);
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        for account in credentials.accounts() {
            user_repo.upsert(account).await?;
        }

        let float_repo = SqlxFloatRepository::boxed(pool.clone());
        let profile_repo = SqlxProfileRepository::boxed(pool.clone());
        let log_repo = SqlxLogRepository::boxed(pool.clone());
        let knowledge_repo = SqlxKnowledgeRepository::boxed(pool.clone());
        let request_stats = Arc::new(RequestStats::new());

        let knowledge_service = Arc::new(KnowledgeService::new(knowledge_repo.clone()));
        let views = ViewEngine::new()?;

        Ok(Self {
            codec: Arc::new(SessionCodec::from_config(config.session.secret.as_deref())),
            credentials,
            float_service: Arc::new(FloatService::new(float_repo.clone(), profile_repo.clone())),
            chat_service: ChatService::new(config.chat.reply_delay()),
            training_service: Arc::new(TrainingService::new(knowledge_service.clone())),
            conversion_service: Arc::new(ConversionService::new(&config.upload, log_repo.clone())),
            status_service: Arc::new(StatusService::new(
                float_repo,
                profile_repo,
                user_repo.clone(),
                log_repo.clone(),
                knowledge_repo,
                request_stats.clone(),
            )),
            knowledge_service,
            views: Arc::new(views),
            request_stats,
            session_cookie: Arc::from(config.session.cookie_name.as_str()),
            session_ttl: chrono::Duration::minutes(config.session.ttl_minutes),
            max_sources: config.chat.max_sources,
            user_repo,
            log_repo,
            pool,
        })
    }

    /// A session controller over the credential carried by `headers`, with
    /// the stored session already restored
    pub fn restore_session(&self, headers: &HeaderMap) -> SessionController<CookieCredentialStore> {
        let store = CookieCredentialStore::from_headers(headers, &self.session_cookie);
        let mut controller = SessionController::new(
            self.codec.clone(),
            self.credentials.clone(),
            self.session_ttl,
            store,
        );
        controller.restore_session();
        controller
    }

    /// Log the controller out and drop the user's chat transcript
    pub async fn end_session(&self, controller: &mut SessionController<CookieCredentialStore>) {
        if let Some(username) = controller.session().map(|s| s.username.clone()) {
            self.chat_service.clear(&username).await;
        }
        controller.logout();
    }

    /// `Set-Cookie` value for whatever the controller did to its slot
    pub fn cookie_header(&self, store: &CookieCredentialStore) -> Option<HeaderValue> {
        store.set_cookie(&self.session_cookie, self.session_ttl.num_seconds())
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Session);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "CONVERSION_FAILED" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Extract the stored credential from request headers.
///
/// The `Authorization: Bearer` header wins over the session cookie.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    cookie_value(headers, cookie_name)
}

fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            let Some((name, value)) = cookie.trim().split_once('=') else {
                continue;
            };
            if name == cookie_name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// What the controller did to the credential slot during a request
#[derive(Debug, Clone, PartialEq, Eq)]
enum CookieChange {
    Set(String),
    Clear,
}

/// Credential slot backed by the session cookie.
///
/// Reads come from the request; writes are turned into a `Set-Cookie`
/// header on the response.
#[derive(Debug, Clone, Default)]
pub struct CookieCredentialStore {
    current: Option<String>,
    from_cookie: bool,
    change: Option<CookieChange>,
}

impl CookieCredentialStore {
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        let current = extract_session_token(headers, cookie_name);
        let from_cookie = current.is_some() && current == cookie_value(headers, cookie_name);
        Self {
            current,
            from_cookie,
            change: None,
        }
    }

    /// `Set-Cookie` header value, if the slot changed.
    ///
    /// Clearing a credential that came from a bearer header leaves the
    /// cookie alone.
    pub fn set_cookie(&self, cookie_name: &str, max_age_secs: i64) -> Option<HeaderValue> {
        let cookie = match self.change.as_ref()? {
            CookieChange::Set(token) => format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                cookie_name, token, max_age_secs
            ),
            CookieChange::Clear if self.from_cookie => clear_cookie(cookie_name),
            CookieChange::Clear => return None,
        };
        HeaderValue::from_str(&cookie).ok()
    }
}

impl CredentialStore for CookieCredentialStore {
    fn load(&self) -> Option<String> {
        self.current.clone()
    }

    fn store(&mut self, credential: String) {
        self.current = Some(credential.clone());
        self.from_cookie = true;
        self.change = Some(CookieChange::Set(credential));
    }

    fn clear(&mut self) {
        self.current = None;
        self.change = Some(CookieChange::Clear);
    }
}

/// Cookie string that removes the session cookie
pub fn clear_cookie(cookie_name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", cookie_name)
}

/// Authentication middleware
///
/// A credential that fails to decode or has expired answers 401 and clears
/// the cookie it came from.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let controller = state.restore_session(request.headers());

    let Some(session) = controller.session().cloned() else {
        let message = if extract_session_token(request.headers(), &state.session_cookie).is_some() {
            "Invalid or expired session"
        } else {
            "Missing authentication token"
        };
        let mut response = ApiError::unauthorized(message).into_response();
        if let Some(cookie) = state.cookie_header(controller.store()) {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
        return response;
    };

    request.extensions_mut().insert(AuthenticatedUser(session));
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Feeds every request's latency and outcome into the status counters
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let response = next.run(request).await;

    state
        .request_stats
        .record(start.elapsed(), response.status().is_server_error());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};

    const COOKIE: &str = "floatchat_session";

    fn headers_of(request: Request<Body>) -> HeaderMap {
        request.headers().clone()
    }

    fn create_request_with_auth(token: &str) -> HeaderMap {
        headers_of(
            Request::builder()
                .uri("/test")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
    }

    fn create_request_with_cookie(token: &str) -> HeaderMap {
        headers_of(
            Request::builder()
                .uri("/test")
                .header(header::COOKIE, format!("theme=dark; {}={}", COOKIE, token))
                .body(Body::empty())
                .unwrap(),
        )
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let headers = create_request_with_auth("test-token-123");
        assert_eq!(
            extract_session_token(&headers, COOKIE),
            Some("test-token-123".to_string())
        );
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let headers = create_request_with_cookie("abc+/=.sig");
        assert_eq!(
            extract_session_token(&headers, COOKIE),
            Some("abc+/=.sig".to_string())
        );
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let headers = headers_of(
            Request::builder()
                .uri("/test")
                .header(header::AUTHORIZATION, "Bearer bearer-token")
                .header(header::COOKIE, format!("{}=cookie-token", COOKIE))
                .body(Body::empty())
                .unwrap(),
        );
        assert_eq!(
            extract_session_token(&headers, COOKIE),
            Some("bearer-token".to_string())
        );
    }

    #[test]
    fn test_extract_session_token_none() {
        let headers = headers_of(
            Request::builder()
                .uri("/test")
                .header(header::AUTHORIZATION, "Basic invalid")
                .header(header::COOKIE, "session=other")
                .body(Body::empty())
                .unwrap(),
        );
        assert!(extract_session_token(&headers, COOKIE).is_none());
    }

    #[test]
    fn test_cookie_store_set_and_clear() {
        let mut store = CookieCredentialStore::default();
        assert!(store.set_cookie(COOKIE, 3600).is_none());

        store.store("tok".to_string());
        let header = store.set_cookie(COOKIE, 3600).unwrap();
        assert_eq!(
            header.to_str().unwrap(),
            "floatchat_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );

        store.clear();
        assert_eq!(store.load(), None);
        assert!(store
            .set_cookie(COOKIE, 3600)
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("Max-Age=0"));
    }

    #[test]
    fn test_clearing_bearer_credential_leaves_cookie_alone() {
        let mut store = CookieCredentialStore::from_headers(&create_request_with_auth("bad"), COOKIE);
        assert_eq!(store.load().as_deref(), Some("bad"));

        store.clear();
        assert!(store.set_cookie(COOKIE, 3600).is_none());
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::internal_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({"field": "limit"});
        let error = ApiError::with_details("VALIDATION_ERROR", "Invalid", details.clone());
        assert_eq!(error.error.details, Some(details));
    }
}
