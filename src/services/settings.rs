//! Settings service
//!
//! Reads merge the stored document over the built-in defaults. Writes are
//! partial updates, validated field by field, and are rejected outright
//! while any channel is running: encoder parameters must not change under
//! live children.

use serde::Deserialize;
use tracing::info;

use crate::database::{ChannelRepository, SettingsRepository};
use crate::errors::{AppError, AppResult};
use crate::models::{ChannelStatus, Settings};

const VALID_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

const VALID_PROFILES: &[&str] = &["baseline", "main", "high"];

/// Partial settings update; absent fields keep their current values
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub max_channels: Option<i64>,
    pub segment_time: Option<i64>,
    pub playlist_size: Option<i64>,
    pub log_retention: Option<i64>,
    pub default_preset: Option<String>,
    pub default_bitrate: Option<String>,
    pub default_resolution: Option<String>,
    pub default_profile: Option<String>,
    pub default_crf: Option<i64>,
    pub default_maxrate: Option<String>,
    pub default_bufsize: Option<String>,
    pub threads_per_process: Option<i64>,
}

pub struct SettingsService {
    settings: SettingsRepository,
    channels: ChannelRepository,
}

impl SettingsService {
    pub fn new(settings: SettingsRepository, channels: ChannelRepository) -> Self {
        Self { settings, channels }
    }

    pub async fn get(&self) -> AppResult<Settings> {
        self.settings.get_system().await
    }

    pub async fn update(&self, update: SettingsUpdate) -> AppResult<Settings> {
        self.ensure_no_running_channels().await?;

        let mut current = self.settings.get_system().await?;
        apply_update(&mut current, update)?;

        self.settings.update_system(&current).await?;
        info!("updated system settings");
        Ok(current)
    }

    /// Any persisted `running` status blocks a settings write
    async fn ensure_no_running_channels(&self) -> AppResult<()> {
        let channels = self.channels.list().await?;
        if channels
            .iter()
            .any(|c| c.status == ChannelStatus::Running)
        {
            return Err(AppError::conflict(
                "settings cannot be updated while channels are running",
            ));
        }
        Ok(())
    }
}

fn apply_update(current: &mut Settings, update: SettingsUpdate) -> AppResult<()> {
    if let Some(max_channels) = update.max_channels {
        if !(1..=1000).contains(&max_channels) {
            return Err(AppError::validation("max_channels must be between 1 and 1000"));
        }
        current.max_channels = max_channels;
    }
    if let Some(segment_time) = update.segment_time {
        if !(1..=30).contains(&segment_time) {
            return Err(AppError::validation(
                "segment_time must be between 1 and 30 seconds",
            ));
        }
        current.segment_time = segment_time;
    }
    if let Some(playlist_size) = update.playlist_size {
        if !(1..=100).contains(&playlist_size) {
            return Err(AppError::validation("playlist_size must be between 1 and 100"));
        }
        current.playlist_size = playlist_size;
    }
    if let Some(log_retention) = update.log_retention {
        if !(1..=365).contains(&log_retention) {
            return Err(AppError::validation(
                "log_retention must be between 1 and 365 days",
            ));
        }
        current.log_retention = log_retention;
    }
    if let Some(preset) = update.default_preset {
        if !VALID_PRESETS.contains(&preset.as_str()) {
            return Err(AppError::validation(format!("invalid preset: {preset}")));
        }
        current.default_preset = preset;
    }
    if let Some(bitrate) = update.default_bitrate {
        current.default_bitrate = bitrate;
    }
    if let Some(resolution) = update.default_resolution {
        current.default_resolution = resolution;
    }
    if let Some(profile) = update.default_profile {
        if !VALID_PROFILES.contains(&profile.as_str()) {
            return Err(AppError::validation(format!("invalid profile: {profile}")));
        }
        current.default_profile = profile;
    }
    if let Some(crf) = update.default_crf {
        if !(0..=51).contains(&crf) {
            return Err(AppError::validation("default_crf must be between 0 and 51"));
        }
        current.default_crf = crf;
    }
    if let Some(maxrate) = update.default_maxrate {
        current.default_maxrate = maxrate;
    }
    if let Some(bufsize) = update.default_bufsize {
        current.default_bufsize = bufsize;
    }
    if let Some(threads) = update.threads_per_process {
        current.threads_per_process = threads;
    }

    Ok(())
}
