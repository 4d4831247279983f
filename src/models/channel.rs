use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current lifecycle state of a channel as persisted in the channel store.
///
/// The persisted status is advisory: the supervisor's in-memory process
/// table is the authority on whether a child is actually alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Stopped,
    Starting,
    Running,
    Error,
    Stopping,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Stopped => "stopped",
            ChannelStatus::Starting => "starting",
            ChannelStatus::Running => "running",
            ChannelStatus::Error => "error",
            ChannelStatus::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(ChannelStatus::Stopped),
            "starting" => Ok(ChannelStatus::Starting),
            "running" => Ok(ChannelStatus::Running),
            "error" => Ok(ChannelStatus::Error),
            "stopping" => Ok(ChannelStatus::Stopping),
            other => Err(format!("unknown channel status: {other}")),
        }
    }
}

/// Logo overlay configuration
///
/// `path` is resolved against the logo root unless absolute. Opacity is in
/// [0, 1]; position and size are output-resolution pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoConfig {
    pub path: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub opacity: f64,
}

/// Per-channel encoding output configuration, overriding settings defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub codec: String,
    pub bitrate: String,
    pub resolution: String,
    pub preset: String,
    pub profile: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            bitrate: "3500k".to_string(),
            resolution: "1920x1080".to_string(),
            preset: "veryfast".to_string(),
            profile: "high".to_string(),
        }
    }
}

/// A declarative channel: one input stream plus its desired output shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<LogoConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_config: Option<OutputConfig>,
    pub status: ChannelStatus,
    pub auto_restart: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Create a new channel with default output configuration
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source_url: source_url.into(),
            output_url: None,
            logo: None,
            output_config: Some(OutputConfig::default()),
            status: ChannelStatus::Stopped,
            auto_restart: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ChannelStatus::Stopped,
            ChannelStatus::Starting,
            ChannelStatus::Running,
            ChannelStatus::Error,
            ChannelStatus::Stopping,
        ] {
            assert_eq!(status.as_str().parse::<ChannelStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ChannelStatus>().is_err());
    }

    #[test]
    fn new_channel_has_sane_defaults() {
        let channel = Channel::new("demo", "http://src/a.m3u8");
        assert_eq!(channel.status, ChannelStatus::Stopped);
        assert!(channel.auto_restart);
        assert!(channel.logo.is_none());
        assert_eq!(
            channel.output_config.as_ref().unwrap().codec,
            "libx264"
        );
    }
}
