//! SQLite-backed settings store.  Values are stored as plain strings, the
//! same way the dashboard kept them in browser storage, and parsed by the
//! caller.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

impl Db {
    /// db_url examples:
    /// - "sqlite:/var/lib/plant-monitor/settings.db"
    /// - "sqlite::memory:" (tests)
    pub async fn connect(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("invalid sqlite connection string: {db_url}"))?
            .journal_mode(SqliteJournalMode::Wal);

        // Every in-memory connection is its own database.
        let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to sqlite db: {db_url}"))?;

        Ok(Self { pool })
    }

    /// Runs SQLx migrations from ./migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("get_setting failed key={key}"))?;
        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("set_setting failed key={key}"))?;
        Ok(())
    }

    /// Upsert several settings in one transaction: either all land or none.
    pub async fn set_settings(&self, pairs: &[(String, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("set_settings: begin failed")?;
        for (key, value) in pairs {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value=excluded.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("set_settings failed key={key}"))?;
        }
        tx.commit().await.context("set_settings: commit failed")?;
        Ok(())
    }

    /// Returns every setting whose key starts with `prefix`.
    pub async fn settings_with_prefix(&self, prefix: &str) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT key, value FROM settings
            WHERE substr(key, 1, length(?)) = ?
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("settings_with_prefix failed prefix={prefix}"))?;

        Ok(rows.into_iter().collect())
    }

    /// Deletes every setting whose key starts with `prefix`.  Returns the
    /// number of rows removed.
    pub async fn remove_with_prefix(&self, prefix: &str) -> Result<u64> {
        let done = sqlx::query("DELETE FROM settings WHERE substr(key, 1, length(?)) = ?")
            .bind(prefix)
            .bind(prefix)
            .execute(&self.pool)
            .await
            .with_context(|| format!("remove_with_prefix failed prefix={prefix}"))?;
        Ok(done.rows_affected())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
