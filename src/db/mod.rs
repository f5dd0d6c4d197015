//! Database layer
//!
//! A single SQLite database holds both halves of the FloatChat fixture store:
//! - the relational fixtures (users, floats, profiles, views, audit trigger)
//! - the log collections (chat, system, conversion) and knowledge documents
//!
//! # Usage
//!
//! ```ignore
//! use floatchat::config::DatabaseConfig;
//! use floatchat::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! floatchat::db::ping(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, ping, DbPool};
