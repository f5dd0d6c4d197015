//! Server-rendered pages
//!
//! Each request runs the session controller over the cookie slot:
//! - GET / and GET /{page} navigate; unknown pages answer 204
//! - `user` needs a session and `admin` an admin session, otherwise the
//!   viewer is sent to the login page
//! - Form posts for login, logout, chat, training and conversion re-render
//!   the page with an inline result

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::admin::read_upload;
use crate::api::chat::exchange;
use crate::api::middleware::{ApiError, AppState, CookieCredentialStore};
use crate::models::{PageName, Session};
use crate::services::{PageAccess, SessionController, SessionError};

type Controller = SessionController<CookieCredentialStore>;

/// Rows of recent activity shown on the dashboards
const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainingForm {
    #[serde(default)]
    pub training_data: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(no_content).post(logout_submit))
        .route("/chat", get(no_content).post(chat_submit))
        .route("/admin/training", post(training_submit))
        .route("/admin/convert", post(convert_submit))
        .route("/{page}", get(show_page))
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /
async fn home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    navigate(&state, &headers, PageName::Home.as_str()).await
}

/// GET /login
async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    navigate(&state, &headers, PageName::Login.as_str()).await
}

/// GET /{page}
async fn show_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(page): Path<String>,
) -> Response {
    navigate(&state, &headers, &page).await
}

async fn navigate(state: &AppState, headers: &HeaderMap, page: &str) -> Response {
    let mut controller = state.restore_session(headers);
    match controller.navigate(page) {
        Some(page) => render(state, &controller, page, TeraContext::new(), StatusCode::OK).await,
        // the browser stays on the page it has
        None => with_cookie(state, &controller, StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /login
async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let mut controller = state.restore_session(&headers);
    controller.navigate(PageName::Login.as_str());

    let username = form.username.trim().to_string();
    let error = match controller.login(&username, &form.password) {
        Ok(session) => {
            let username = session.username.clone();
            if let Err(e) = state.user_repo.touch_last_login(&username, Utc::now()).await {
                tracing::warn!("Failed to record login for {}: {:#}", username, e);
            }
            let landing = controller.current_page();
            return with_cookie(&state, &controller, Redirect::to(landing.path()).into_response());
        }
        Err(SessionError::InvalidCredentials) => {
            (StatusCode::UNAUTHORIZED, "Invalid username or password".to_string())
        }
        Err(e) => {
            tracing::error!("Login failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Login failed, please try again".to_string())
        }
    };

    let mut context = TeraContext::new();
    context.insert("error", &error.1);
    context.insert("username", &username);
    render(&state, &controller, PageName::Login, context, error.0).await
}

/// POST /logout
async fn logout_submit(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut controller = state.restore_session(&headers);
    state.end_session(&mut controller).await;
    with_cookie(&state, &controller, Redirect::to(controller.current_page().path()).into_response())
}

/// POST /chat
async fn chat_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Response {
    let mut controller = state.restore_session(&headers);
    controller.navigate(PageName::User.as_str());
    let Some(session) = allowed(&controller, PageName::User) else {
        return render(&state, &controller, PageName::User, TeraContext::new(), StatusCode::OK).await;
    };

    let mut context = TeraContext::new();
    match exchange(&state, &session.username, &form.query).await {
        Ok(reply) => context.insert("sources", &reply.sources),
        Err(e) => context.insert("chat_error", &e.error.message),
    }
    render(&state, &controller, PageName::User, context, StatusCode::OK).await
}

/// POST /admin/training
async fn training_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TrainingForm>,
) -> Response {
    let mut controller = state.restore_session(&headers);
    controller.navigate(PageName::Admin.as_str());
    let Some(session) = allowed(&controller, PageName::Admin) else {
        return render(&state, &controller, PageName::Admin, TeraContext::new(), StatusCode::OK).await;
    };

    let mut context = TeraContext::new();
    match state
        .training_service
        .apply(&session.username, &form.training_data)
        .await
    {
        Ok(report) => context.insert("training", &report),
        Err(e) => context.insert("training_error", &ApiError::from(e).error.message),
    }
    render(&state, &controller, PageName::Admin, context, StatusCode::OK).await
}

/// POST /admin/convert
async fn convert_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut controller = state.restore_session(&headers);
    controller.navigate(PageName::Admin.as_str());
    let Some(session) = allowed(&controller, PageName::Admin) else {
        return render(&state, &controller, PageName::Admin, TeraContext::new(), StatusCode::OK).await;
    };

    let mut context = TeraContext::new();
    let result = match read_upload(&mut multipart).await {
        Ok(upload) => state
            .conversion_service
            .convert(&session.username, upload)
            .await
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };
    match result {
        Ok(report) => context.insert("conversion", &report),
        Err(e) => context.insert("conversion_error", &e.error.message),
    }
    render(&state, &controller, PageName::Admin, context, StatusCode::OK).await
}

/// The session, if it may see `page`
fn allowed(controller: &Controller, page: PageName) -> Option<Session> {
    match controller.access(page) {
        PageAccess::Allowed => controller.session().cloned(),
        PageAccess::LoginRequired => None,
    }
}

/// Render `page` for the controller's viewer, or send them to the login
/// page when they may not see it
async fn render(
    state: &AppState,
    controller: &Controller,
    page: PageName,
    mut context: TeraContext,
    status: StatusCode,
) -> Response {
    let response = match controller.access(page) {
        PageAccess::LoginRequired => Redirect::to(PageName::Login.path()).into_response(),
        PageAccess::Allowed => {
            let session = controller.session();
            if let Err(e) = load_page_data(state, page, session, &mut context).await {
                tracing::warn!("Failed to load data for page '{}': {:#}", page, e);
            }
            let html = state.views.render_page_with_fallback(page, session, &context);
            (status, Html(html)).into_response()
        }
    };

    with_cookie(state, controller, response)
}

/// Data the user and admin dashboards display
async fn load_page_data(
    state: &AppState,
    page: PageName,
    session: Option<&Session>,
    context: &mut TeraContext,
) -> anyhow::Result<()> {
    let Some(session) = session else {
        return Ok(());
    };

    match page {
        PageName::User => {
            context.insert("transcript", &state.chat_service.transcript(&session.username).await);
            context.insert("floats", &state.float_service.list_active().await?);
            context.insert(
                "recent_questions",
                &state.log_repo.recent_chats(&session.username, RECENT_LIMIT).await?,
            );
        }
        PageName::Admin => {
            context.insert("status", &state.status_service.snapshot().await?);
            context.insert("floats", &state.float_service.list().await?);
            context.insert("conversions", &state.log_repo.recent_conversions(RECENT_LIMIT).await?);
            context.insert("activity", &state.log_repo.recent_system(RECENT_LIMIT).await?);
        }
        _ => {}
    }
    Ok(())
}

fn with_cookie(state: &AppState, controller: &Controller, mut response: Response) -> Response {
    if let Some(cookie) = state.cookie_header(controller.store()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}
