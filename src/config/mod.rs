use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub mod defaults;

use defaults::*;

/// Application configuration, loaded from a TOML file with
/// `STREAMCAST_`-prefixed environment variable overrides
/// (`STREAMCAST_SERVER__PORT=9090` overrides `server.port`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default = "default_expiration_hours")]
    pub expiration_hours: i64,
    #[serde(default = "default_refresh_hours")]
    pub refresh_hours: i64,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

/// Encoder invocation defaults. Database settings override these at spawn
/// time; channel output configs override both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    #[serde(default = "default_ffmpeg_command")]
    pub ffmpeg_command: String,
    #[serde(default = "default_numactl_command")]
    pub numactl_command: String,
    #[serde(default = "default_nvidia_smi_command")]
    pub nvidia_smi_command: String,
    #[serde(default = "default_segment_time")]
    pub segment_time: i64,
    #[serde(default = "default_playlist_size")]
    pub playlist_size: i64,
    #[serde(default = "default_preset")]
    pub default_preset: String,
    #[serde(default = "default_bitrate")]
    pub default_bitrate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// HLS output root; one subdirectory per channel id. Expected to live
    /// on a RAM-backed filesystem in production.
    #[serde(default = "default_hls_path")]
    pub hls_path: PathBuf,
    #[serde(default = "default_logo_path")]
    pub logo_path: PathBuf,
    #[serde(default = "default_upload_path")]
    pub upload_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            expiration_hours: default_expiration_hours(),
            refresh_hours: default_refresh_hours(),
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
        }
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_command: default_ffmpeg_command(),
            numactl_command: default_numactl_command(),
            nvidia_smi_command: default_nvidia_smi_command(),
            segment_time: default_segment_time(),
            playlist_size: default_playlist_size(),
            default_preset: default_preset(),
            default_bitrate: default_bitrate(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            hls_path: default_hls_path(),
            logo_path: default_logo_path(),
            upload_path: default_upload_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            transcoder: TranscoderConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file merged with environment overrides.
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("STREAMCAST_").split("__"));

        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.transcoder.ffmpeg_command, "ffmpeg");
        assert_eq!(config.transcoder.segment_time, 6);
        assert!(config.storage.hls_path.is_absolute());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from_file("/nonexistent/streamcast.toml").unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n\n[transcoder]\nsegment_time = 4\n")
            .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.transcoder.segment_time, 4);
        // Untouched sections keep defaults
        assert_eq!(config.transcoder.playlist_size, 10);
    }
}
