use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metrics snapshot for one running encoder child, derived on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderMetrics {
    pub channel_id: Uuid,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    /// Percent of one logical CPU divided by total logical CPUs
    pub cpu_usage: f64,
    /// Resident set size in bytes
    pub memory_usage: i64,
    /// Input side statistics are not reported by the encoder progress stream
    pub input_bitrate: i64,
    /// Output bitrate in kbps, parsed from encoder progress
    pub output_bitrate: i64,
    pub dropped_frames: i64,
    pub fps: f64,
    /// Encoding speed relative to wallclock, 1.0 = realtime
    pub speed: f64,
    pub uptime: i64,
}

/// Raw progress values parsed from the encoder's diagnostic stream
#[derive(Debug, Clone, Default)]
pub struct ProgressMetrics {
    pub frame: i64,
    pub fps: f64,
    pub bitrate: String,
    pub speed: String,
    pub drop_frames: i64,
}

impl ProgressMetrics {
    /// Parse the bitrate string ("3500k", "2511.2kbits/s") into kbps
    pub fn output_bitrate_kbps(&self) -> i64 {
        parse_leading_number(&self.bitrate) as i64
    }

    /// Parse the speed string ("1.02x") into a float
    pub fn speed_factor(&self) -> f64 {
        parse_leading_number(&self.speed)
    }
}

fn parse_leading_number(s: &str) -> f64 {
    let end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    s[..end].parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_parses_plain_and_suffixed_values() {
        let mut metrics = ProgressMetrics::default();
        metrics.bitrate = "3500k".to_string();
        assert_eq!(metrics.output_bitrate_kbps(), 3500);

        metrics.bitrate = "2511.2kbits/s".to_string();
        assert_eq!(metrics.output_bitrate_kbps(), 2511);

        metrics.bitrate = String::new();
        assert_eq!(metrics.output_bitrate_kbps(), 0);
    }

    #[test]
    fn speed_parses_x_suffix() {
        let mut metrics = ProgressMetrics::default();
        metrics.speed = "1.02x".to_string();
        assert!((metrics.speed_factor() - 1.02).abs() < f64::EPSILON);

        metrics.speed = String::new();
        assert_eq!(metrics.speed_factor(), 0.0);
    }
}
