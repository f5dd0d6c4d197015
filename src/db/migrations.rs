//! Database migrations module
//!
//! Code-embedded SQLite migrations for FloatChat. The relational fixtures
//! (users, floats, profiles, derived views, audit trigger) and the log
//! collections (chat, system, conversion, knowledge) all live in one database.
//!
//! # Usage
//!
//! ```ignore
//! use floatchat::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! migrations::seed_sample_data(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::DbPool;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements, separated by `;`
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(80) NOT NULL UNIQUE,
                email VARCHAR(120) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                full_name VARCHAR(100),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                last_login TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_argo_floats",
        up: r#"
            CREATE TABLE IF NOT EXISTS argo_floats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                float_id VARCHAR(20) NOT NULL UNIQUE,
                latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
                longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
                deployment_date DATE,
                status VARCHAR(20) NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'maintenance', 'inactive')),
                last_profile DATE,
                profiles_count INTEGER NOT NULL DEFAULT 0,
                region VARCHAR(50),
                battery_level INTEGER NOT NULL DEFAULT 100 CHECK (battery_level BETWEEN 0 AND 100),
                next_maintenance DATE,
                data_quality VARCHAR(20) NOT NULL DEFAULT 'good',
                temperature REAL,
                salinity REAL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_argo_floats_status ON argo_floats(status);
            CREATE INDEX IF NOT EXISTS idx_argo_floats_position ON argo_floats(latitude, longitude);
        "#,
    },
    Migration {
        version: 3,
        name: "create_ocean_profiles",
        up: r#"
            CREATE TABLE IF NOT EXISTS ocean_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                float_id VARCHAR(20) NOT NULL,
                profile_date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                latitude REAL,
                longitude REAL,
                depth REAL,
                temperature REAL,
                salinity REAL,
                pressure REAL,
                oxygen REAL,
                quality_flag VARCHAR(5),
                FOREIGN KEY (float_id) REFERENCES argo_floats(float_id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_ocean_profiles_float_date ON ocean_profiles(float_id, profile_date);
        "#,
    },
    Migration {
        version: 4,
        name: "create_float_views",
        up: r#"
            CREATE VIEW IF NOT EXISTS active_floats AS
                SELECT * FROM argo_floats WHERE status = 'active';
            CREATE VIEW IF NOT EXISTS latest_profiles AS
                SELECT p.* FROM ocean_profiles p
                WHERE p.profile_date = (
                    SELECT MAX(p2.profile_date) FROM ocean_profiles p2
                    WHERE p2.float_id = p.float_id
                );
        "#,
    },
    Migration {
        version: 5,
        name: "create_float_audit",
        up: r#"
            CREATE TABLE IF NOT EXISTS float_audit (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                float_id VARCHAR(20) NOT NULL,
                old_status VARCHAR(20) NOT NULL,
                new_status VARCHAR(20) NOT NULL,
                old_battery INTEGER NOT NULL,
                new_battery INTEGER NOT NULL,
                changed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_float_audit_float_id ON float_audit(float_id);
            CREATE TRIGGER IF NOT EXISTS trg_argo_floats_audit
            AFTER UPDATE OF status, battery_level ON argo_floats
            FOR EACH ROW
            BEGIN
                INSERT INTO float_audit (float_id, old_status, new_status, old_battery, new_battery)
                VALUES (OLD.float_id, OLD.status, NEW.status, OLD.battery_level, NEW.battery_level);
            END;
        "#,
    },
    Migration {
        version: 6,
        name: "create_log_collections",
        up: r#"
            CREATE TABLE IF NOT EXISTS chat_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(80) NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                topic VARCHAR(20),
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_logs_username ON chat_logs(username);
            CREATE INDEX IF NOT EXISTS idx_chat_logs_created_at ON chat_logs(created_at);
            CREATE TABLE IF NOT EXISTS system_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action VARCHAR(50) NOT NULL,
                username VARCHAR(80) NOT NULL,
                details TEXT NOT NULL DEFAULT '{}',
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_system_logs_action ON system_logs(action);
            CREATE INDEX IF NOT EXISTS idx_system_logs_created_at ON system_logs(created_at);
            CREATE TABLE IF NOT EXISTS conversion_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(80) NOT NULL,
                original_file VARCHAR(255) NOT NULL,
                csv_file VARCHAR(255),
                bytes INTEGER NOT NULL DEFAULT 0,
                status VARCHAR(10) NOT NULL CHECK (status IN ('success', 'failed')),
                error TEXT,
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_conversion_logs_status ON conversion_logs(status);
        "#,
    },
    Migration {
        version: 7,
        name: "create_knowledge_documents",
        up: r#"
            CREATE TABLE IF NOT EXISTS knowledge_documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_key VARCHAR(64) NOT NULL UNIQUE,
                text TEXT NOT NULL,
                category VARCHAR(50) NOT NULL DEFAULT 'general',
                source VARCHAR(10) NOT NULL CHECK (source IN ('seed', 'training')),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            INSERT OR IGNORE INTO knowledge_documents (doc_key, text, category, source) VALUES
                ('argo_overview', 'ARGO floats are autonomous profiling instruments that measure temperature and salinity from the ocean surface down to 2000 m every 10 days', 'introduction', 'seed'),
                ('temperature_structure', 'Ocean temperature profiles show a warm surface mixed layer, a sharp thermocline and cold deep water', 'temperature', 'seed'),
                ('salinity_units', 'Salinity is the salt content of seawater, reported in Practical Salinity Units (PSU) and typically between 34 and 37 PSU in the open ocean', 'salinity', 'seed'),
                ('float_cycle', 'Each float cycles every 10 days, sinking to 2000 m and profiling temperature and salinity on the way back to the surface', 'process', 'seed'),
                ('indian_ocean', 'The Indian Ocean ARGO network monitors monsoon effects, upwelling and thermohaline circulation', 'regional', 'seed'),
                ('data_quality', 'ARGO data passes quality control with flags marking good, questionable or bad measurements', 'data_quality', 'seed'),
                ('float_lifecycle', 'Floats have a 4 to 7 year mission life and drift with the currents while profiling', 'technical', 'seed'),
                ('global_coverage', 'The global ARGO array keeps about 4000 active floats delivering near real time ocean observations', 'network', 'seed');
        "#,
    },
];

/// Sample floats and profiles for the dashboards. Idempotent.
const SAMPLE_DATA: &str = r#"
    INSERT OR IGNORE INTO argo_floats
        (float_id, latitude, longitude, deployment_date, status, last_profile, profiles_count, region, battery_level, data_quality, temperature, salinity)
    VALUES
        ('2901623', -10.5, 67.8, '2021-03-14', 'active', '2024-09-20', 3, 'Indian Ocean', 87, 'good', 28.1, 35.1),
        ('2901624', -15.2, 72.1, '2021-05-02', 'active', '2024-09-18', 3, 'Indian Ocean', 92, 'good', 27.4, 35.2),
        ('2901625', -8.7, 65.3, '2021-07-21', 'active', '2024-09-19', 3, 'Indian Ocean', 78, 'good', 28.6, 34.9),
        ('2901626', -12.8, 70.5, '2022-01-09', 'active', '2024-09-17', 3, 'Indian Ocean', 95, 'good', 27.9, 35.3),
        ('2901627', -6.2, 68.9, '2022-04-30', 'active', '2024-09-21', 3, 'Indian Ocean', 71, 'good', 29.0, 35.0),
        ('2901628', -18.4, 75.6, '2020-11-11', 'maintenance', '2024-06-02', 3, 'Indian Ocean', 23, 'questionable', 26.2, 35.4);
    INSERT INTO ocean_profiles (float_id, profile_date, latitude, longitude, depth, temperature, salinity, pressure, oxygen, quality_flag)
    SELECT v.* FROM (
        SELECT '2901623' AS float_id, '2024-09-20 06:00:00' AS profile_date, -10.5 AS latitude, 67.8 AS longitude, 5.0 AS depth, 28.1 AS temperature, 35.1 AS salinity, 5.0 AS pressure, 205.0 AS oxygen, 'A' AS quality_flag
        UNION ALL SELECT '2901623', '2024-09-10 06:00:00', -10.4, 67.6, 100.0, 21.3, 35.2, 101.0, 180.0, 'A'
        UNION ALL SELECT '2901623', '2024-08-31 06:00:00', -10.2, 67.5, 2000.0, 2.4, 34.7, 2030.0, 160.0, 'A'
        UNION ALL SELECT '2901624', '2024-09-18 06:00:00', -15.2, 72.1, 5.0, 27.4, 35.2, 5.0, 210.0, 'A'
        UNION ALL SELECT '2901624', '2024-09-08 06:00:00', -15.1, 72.0, 120.0, 19.8, 35.3, 121.0, 175.0, 'A'
        UNION ALL SELECT '2901624', '2024-08-29 06:00:00', -15.0, 71.8, 2000.0, 2.2, 34.7, 2030.0, 158.0, 'B'
        UNION ALL SELECT '2901625', '2024-09-19 06:00:00', -8.7, 65.3, 5.0, 28.6, 34.9, 5.0, 202.0, 'A'
        UNION ALL SELECT '2901625', '2024-09-09 06:00:00', -8.6, 65.2, 80.0, 24.0, 35.0, 81.0, 190.0, 'A'
        UNION ALL SELECT '2901625', '2024-08-30 06:00:00', -8.5, 65.0, 2000.0, 2.6, 34.7, 2030.0, 162.0, 'A'
        UNION ALL SELECT '2901626', '2024-09-17 06:00:00', -12.8, 70.5, 5.0, 27.9, 35.3, 5.0, 207.0, 'A'
        UNION ALL SELECT '2901626', '2024-09-07 06:00:00', -12.7, 70.3, 110.0, 20.5, 35.3, 111.0, 178.0, 'A'
        UNION ALL SELECT '2901626', '2024-08-28 06:00:00', -12.6, 70.2, 2000.0, 2.3, 34.7, 2030.0, 159.0, 'A'
        UNION ALL SELECT '2901627', '2024-09-21 06:00:00', -6.2, 68.9, 5.0, 29.0, 35.0, 5.0, 200.0, 'A'
        UNION ALL SELECT '2901627', '2024-09-11 06:00:00', -6.1, 68.8, 90.0, 23.1, 35.1, 91.0, 185.0, 'A'
        UNION ALL SELECT '2901627', '2024-09-01 06:00:00', -6.0, 68.6, 2000.0, 2.5, 34.7, 2030.0, 161.0, 'A'
        UNION ALL SELECT '2901628', '2024-06-02 06:00:00', -18.4, 75.6, 5.0, 26.2, 35.4, 5.0, 212.0, 'B'
        UNION ALL SELECT '2901628', '2024-05-23 06:00:00', -18.3, 75.5, 100.0, 18.9, 35.4, 101.0, 170.0, 'B'
        UNION ALL SELECT '2901628', '2024-05-13 06:00:00', -18.2, 75.4, 2000.0, 2.1, 34.7, 2030.0, 155.0, 'C'
    ) AS v
    WHERE NOT EXISTS (SELECT 1 FROM ocean_profiles);
"#;

/// Run all pending migrations.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DbPool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Insert the sample floats and profiles if they are missing
pub async fn seed_sample_data(pool: &DbPool) -> Result<()> {
    for statement in split_sql_statements(SAMPLE_DATA) {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to seed: {}", truncate_sql(&statement)))?;
    }
    tracing::debug!("Sample floats and profiles seeded");
    Ok(())
}

async fn create_migrations_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;
    Ok(())
}

/// Get list of already applied migrations
pub async fn get_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DbPool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in split_sql_statements(migration.up) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(&statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into statements on `;`, keeping `CREATE TRIGGER ... END` bodies whole.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for chunk in sql.split(';') {
        if !current.is_empty() {
            current.push(';');
        }
        current.push_str(chunk);

        let trimmed = current.trim();
        if trimmed.is_empty() {
            current.clear();
            continue;
        }

        let upper = trimmed.to_uppercase();
        let open_trigger = upper.contains("CREATE TRIGGER") && !upper.ends_with("END");
        if open_trigger {
            continue;
        }

        statements.push(trimmed.to_string());
        current.clear();
    }

    let rest = current.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }

    statements
}
