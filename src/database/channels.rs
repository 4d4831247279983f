use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{Channel, ChannelStatus, LogoConfig, OutputConfig};

/// Durable mapping from channel id to declarative channel state.
///
/// Oblivious to the supervisor's process table; the persisted status is
/// advisory and the supervisor alone decides whether "running" is true.
#[derive(Clone)]
pub struct ChannelRepository {
    pool: PgPool,
}

impl ChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, channel: &Channel) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO channels (id, name, source_url, logo, output_config, status, auto_restart, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(channel.id)
        .bind(&channel.name)
        .bind(&channel.source_url)
        .bind(channel.logo.as_ref().map(serde_json::to_value).transpose()?)
        .bind(
            channel
                .output_config
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(channel.status.as_str())
        .bind(channel.auto_restart)
        .bind(channel.created_at)
        .bind(channel.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Option<Channel>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, source_url, logo, output_config, status, auto_restart, created_at, updated_at
            FROM channels WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(channel_from_row).transpose()
    }

    /// All channels, newest first
    pub async fn list(&self) -> AppResult<Vec<Channel>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, source_url, logo, output_config, status, auto_restart, created_at, updated_at
            FROM channels ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(channel_from_row).collect()
    }

    pub async fn update(&self, channel: &Channel) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE channels
            SET name = $1, source_url = $2, logo = $3, output_config = $4, auto_restart = $5
            WHERE id = $6
            "#,
        )
        .bind(&channel.name)
        .bind(&channel.source_url)
        .bind(channel.logo.as_ref().map(serde_json::to_value).transpose()?)
        .bind(
            channel
                .output_config
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(channel.auto_restart)
        .bind(channel.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Status-only fast path, used on every lifecycle transition
    pub async fn update_status(&self, id: Uuid, status: ChannelStatus) -> AppResult<()> {
        sqlx::query("UPDATE channels SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn channel_from_row(row: PgRow) -> AppResult<Channel> {
    let logo: Option<Value> = row.try_get("logo")?;
    let output_config: Option<Value> = row.try_get("output_config")?;
    let status: String = row.try_get("status")?;

    Ok(Channel {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        source_url: row.try_get("source_url")?,
        output_url: None,
        logo: logo
            .map(serde_json::from_value::<Option<LogoConfig>>)
            .transpose()?
            .flatten(),
        output_config: output_config
            .map(serde_json::from_value::<Option<OutputConfig>>)
            .transpose()?
            .flatten(),
        status: status.parse().unwrap_or(ChannelStatus::Stopped),
        auto_restart: row.try_get("auto_restart")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
