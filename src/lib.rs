//! FloatChat ARGO - chat and dashboards over ARGO float sample data
//!
//! This library provides the session/page controller, the keyword chat
//! resolver, the SQLite fixture store and the HTTP layer of FloatChat.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod views;
