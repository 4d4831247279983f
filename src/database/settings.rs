use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgPool;

use crate::errors::{AppError, AppResult};
use crate::models::Settings;

const SYSTEM_KEY: &str = "system";
const PRESETS_KEY: &str = "encoding_presets";

/// Key/value JSON store for system-wide settings.
///
/// Two keys exist: `system` (the defaults document the supervisor reads
/// when building encoder arguments) and `encoding_presets` (named preset
/// profiles, advisory only).
#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_system(&self) -> AppResult<Settings> {
        let value = self.get_value(SYSTEM_KEY).await?;
        match value {
            Some(doc) => Ok(Settings::from_value(&doc)),
            None => Err(AppError::not_found("settings", SYSTEM_KEY)),
        }
    }

    pub async fn update_system(&self, settings: &Settings) -> AppResult<()> {
        self.upsert(SYSTEM_KEY, &settings.to_value()).await
    }

    /// Overwrite both settings documents with the built-in defaults.
    /// Invoked on every supervisor boot.
    pub async fn seed_defaults(&self) -> AppResult<()> {
        self.upsert(SYSTEM_KEY, &Settings::default().to_value())
            .await?;
        self.upsert(PRESETS_KEY, &Settings::default_encoding_presets())
            .await
    }

    async fn get_value(&self, key: &str) -> AppResult<Option<Value>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<Value, _>("value")))
    }

    async fn upsert(&self, key: &str, value: &Value) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
