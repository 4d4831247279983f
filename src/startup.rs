//! Startup reconciler
//!
//! Runs once on supervisor boot, before the web server accepts requests.
//! The supervisor never inherits liveness across restarts: persisted
//! running/starting statuses are lies after a restart and are forced back
//! to stopped, and stale HLS output is wiped.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{ChannelRepository, SettingsRepository, UserRepository};
use crate::models::{ChannelStatus, OutputConfig, UserRole};
use crate::services::AuthService;

pub async fn reconcile(
    channels: &ChannelRepository,
    settings: &SettingsRepository,
    users: &UserRepository,
    auth: &AuthService,
    config: &Config,
) -> Result<()> {
    info!("running startup reconciliation");

    clean_hls_root(&config.storage.hls_path).await;

    // Settings are reset to the built-in defaults on every boot
    settings.seed_defaults().await?;

    reset_channels(channels).await?;

    ensure_default_admin(users, auth, config).await;

    Ok(())
}

/// Wipe the contents of the HLS root, keeping the root itself
async fn clean_hls_root(hls_path: &Path) {
    if let Err(e) = tokio::fs::create_dir_all(hls_path).await {
        warn!(hls_path = %hls_path.display(), error = %e, "failed to create HLS root");
        return;
    }

    let mut entries = match tokio::fs::read_dir(hls_path).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(hls_path = %hls_path.display(), error = %e, "failed to read HLS root");
            return;
        }
    };

    let mut removed = 0usize;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let result = if path.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale HLS entry"),
        }
    }

    if removed > 0 {
        info!(removed, "cleaned stale HLS output");
    }
}

/// Force running/starting statuses back to stopped and reset every
/// channel's output config to the defaults.
async fn reset_channels(channels: &ChannelRepository) -> Result<()> {
    let all = channels.list().await?;
    let mut stopped = 0usize;

    for mut channel in all {
        channel.output_config = Some(OutputConfig::default());
        if let Err(e) = channels.update(&channel).await {
            warn!(channel_id = %channel.id, error = %e, "failed to reset channel output config");
        }

        if matches!(
            channel.status,
            ChannelStatus::Running | ChannelStatus::Starting
        ) {
            match channels
                .update_status(channel.id, ChannelStatus::Stopped)
                .await
            {
                Ok(()) => {
                    stopped += 1;
                    info!(channel_id = %channel.id, channel_name = %channel.name, "stopped channel on startup");
                }
                Err(e) => {
                    warn!(channel_id = %channel.id, error = %e, "failed to stop channel on startup");
                }
            }
        }
    }

    if stopped > 0 {
        info!(stopped, "forced running channels back to stopped");
    }

    Ok(())
}

async fn ensure_default_admin(users: &UserRepository, auth: &AuthService, config: &Config) {
    match users.get_by_email(&config.jwt.admin_email).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            match auth
                .create_user(
                    &config.jwt.admin_email,
                    &config.jwt.admin_password,
                    "Admin",
                    UserRole::Admin,
                )
                .await
            {
                Ok(_) => info!(email = %config.jwt.admin_email, "created default admin user"),
                Err(e) => warn!(error = %e, "failed to create default admin user"),
            }
        }
        Err(e) => warn!(error = %e, "failed to look up default admin user"),
    }
}
