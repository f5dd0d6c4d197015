//! Shared fixtures for the HTTP tests

use axum_test::TestServer;
use serde_json::{json, Value};

use crate::api::{build_router, AppState};
use crate::config::Config;
use crate::db::{create_test_pool, migrations};

/// Config with no artificial delays and a private upload directory
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.chat.reply_delay_ms = 0;
    config.upload.conversion_delay_ms = 0;
    config.upload.path =
        std::env::temp_dir().join(format!("floatchat-test-{}", uuid::Uuid::new_v4().simple()));
    config
}

pub async fn test_state() -> AppState {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    migrations::seed_sample_data(&pool).await.unwrap();
    AppState::initialize(&test_config(), pool).await.unwrap()
}

pub async fn test_server() -> TestServer {
    let state = test_state().await;
    let cors_origin = Config::default().server.cors_origin;
    TestServer::new(build_router(state, &cors_origin).unwrap()).unwrap()
}

/// Log in through the JSON API and return the bearer token
pub async fn login_token(server: &TestServer, username: &str, password: &str) -> String {
    let body: Value = server
        .post("/api/login")
        .json(&json!({"username": username, "password": password}))
        .await
        .json();
    body["token"].as_str().unwrap().to_string()
}
