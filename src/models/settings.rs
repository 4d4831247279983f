use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// System-wide defaults stored as a single JSON document under the
/// `system` key of the settings store.
///
/// JSON has no integer type in transit, so numeric fields are extracted
/// accepting both integer and floating-point representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub max_channels: i64,
    /// HLS segment duration in seconds
    pub segment_time: i64,
    /// Sliding playlist window in segments
    pub playlist_size: i64,
    /// Log retention in days, advisory only
    pub log_retention: i64,
    pub default_preset: String,
    pub default_bitrate: String,
    pub default_resolution: String,
    pub default_profile: String,
    pub default_crf: i64,
    pub default_maxrate: String,
    pub default_bufsize: String,
    pub threads_per_process: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_channels: 80,
            segment_time: 3,
            playlist_size: 6,
            log_retention: 1,
            default_preset: "veryfast".to_string(),
            default_bitrate: "3500k".to_string(),
            default_resolution: "1920x1080".to_string(),
            default_profile: "high".to_string(),
            default_crf: 23,
            default_maxrate: "3800k".to_string(),
            default_bufsize: "7600k".to_string(),
            threads_per_process: 1,
        }
    }
}

impl Settings {
    /// Overlay the defaults with whatever fields the stored document carries
    pub fn from_value(value: &Value) -> Self {
        let mut settings = Settings::default();
        settings.max_channels = int_field(value, "max_channels", settings.max_channels);
        settings.segment_time = int_field(value, "segment_time", settings.segment_time);
        settings.playlist_size = int_field(value, "playlist_size", settings.playlist_size);
        settings.log_retention = int_field(value, "log_retention", settings.log_retention);
        settings.default_preset = str_field(value, "default_preset", settings.default_preset);
        settings.default_bitrate = str_field(value, "default_bitrate", settings.default_bitrate);
        settings.default_resolution =
            str_field(value, "default_resolution", settings.default_resolution);
        settings.default_profile = str_field(value, "default_profile", settings.default_profile);
        settings.default_crf = int_field(value, "default_crf", settings.default_crf);
        settings.default_maxrate = str_field(value, "default_maxrate", settings.default_maxrate);
        settings.default_bufsize = str_field(value, "default_bufsize", settings.default_bufsize);
        settings.threads_per_process =
            int_field(value, "threads_per_process", settings.threads_per_process);
        settings
    }

    pub fn to_value(&self) -> Value {
        json!({
            "max_channels": self.max_channels,
            "segment_time": self.segment_time,
            "playlist_size": self.playlist_size,
            "log_retention": self.log_retention,
            "default_preset": self.default_preset,
            "default_bitrate": self.default_bitrate,
            "default_resolution": self.default_resolution,
            "default_profile": self.default_profile,
            "default_crf": self.default_crf,
            "default_maxrate": self.default_maxrate,
            "default_bufsize": self.default_bufsize,
            "threads_per_process": self.threads_per_process,
        })
    }

    /// Named preset profiles stored under the `encoding_presets` key.
    /// Advisory for UI consumption, not consumed by the supervisor.
    pub fn default_encoding_presets() -> Value {
        json!([
            {"name": "High Quality", "preset": "slow", "bitrate": "6000k", "resolution": "1920x1080"},
            {"name": "Standard", "preset": "veryfast", "bitrate": "4000k", "resolution": "1920x1080"},
            {"name": "Low Bandwidth", "preset": "veryfast", "bitrate": "2000k", "resolution": "1280x720"},
        ])
    }
}

fn int_field(value: &Value, key: &str, fallback: i64) -> i64 {
    match value.get(key) {
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .unwrap_or(fallback),
        None => fallback,
    }
}

fn str_field(value: &Value, key: &str, fallback: String) -> String {
    match value.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_value_accepts_integer_and_float_numbers() {
        let doc = json!({"segment_time": 4.0, "playlist_size": 8, "default_preset": "fast"});
        let settings = Settings::from_value(&doc);
        assert_eq!(settings.segment_time, 4);
        assert_eq!(settings.playlist_size, 8);
        assert_eq!(settings.default_preset, "fast");
        // Untouched fields keep their defaults
        assert_eq!(settings.default_crf, 23);
        assert_eq!(settings.default_bitrate, "3500k");
    }

    #[test]
    fn from_value_ignores_empty_strings() {
        let doc = json!({"default_bitrate": ""});
        let settings = Settings::from_value(&doc);
        assert_eq!(settings.default_bitrate, "3500k");
    }

    #[test]
    fn round_trip_through_json_document() {
        let settings = Settings::default();
        let restored = Settings::from_value(&settings.to_value());
        assert_eq!(settings, restored);
    }
}
