//! Per-process monitor
//!
//! One monitor task per live encoder child, attached to its stderr. Every
//! line lands in the bounded log ring; error-tagged lines are re-emitted at
//! warn level; progress metrics are parsed on a sampling cadence to bound
//! parsing cost. The task ends when the stream closes; reacting to the
//! exit itself is the watcher's job.
//!
//! A separate sampler reads per-PID CPU and RSS from the shared host
//! process table, invoked lazily when metrics are requested.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::sync::RwLock;
use tracing::warn;

use super::process::LiveProcess;
use crate::models::ProgressMetrics;

/// Parse metrics only on every Nth line; error lines are always parsed so
/// counters stay current on failure.
const PARSE_INTERVAL: usize = 3;

static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").unwrap());
static FPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"fps=\s*([\d.]+)").unwrap());
static BITRATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"bitrate=\s*([\d.]+\w+)").unwrap());
static SPEED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"speed=\s*([\d.]+x)").unwrap());
static DROP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"drop=\s*(\d+)").unwrap());
static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(error|failed|cannot|unable|invalid)").unwrap());

pub fn is_error_line(line: &str) -> bool {
    ERROR_RE.is_match(line)
}

/// Apply whatever progress fields the line carries
pub fn parse_progress(line: &str, metrics: &mut ProgressMetrics) {
    if let Some(captures) = FRAME_RE.captures(line) {
        metrics.frame = captures[1].parse().unwrap_or(metrics.frame);
    }
    if let Some(captures) = FPS_RE.captures(line) {
        metrics.fps = captures[1].parse().unwrap_or(metrics.fps);
    }
    if let Some(captures) = BITRATE_RE.captures(line) {
        metrics.bitrate = captures[1].to_string();
    }
    if let Some(captures) = SPEED_RE.captures(line) {
        metrics.speed = captures[1].to_string();
    }
    if let Some(captures) = DROP_RE.captures(line) {
        metrics.drop_frames = captures[1].parse().unwrap_or(metrics.drop_frames);
    }
}

/// Read the child's stderr until it closes
pub async fn run(live: Arc<LiveProcess>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    let mut line_count = 0usize;

    while let Ok(Some(line)) = lines.next_line().await {
        line_count += 1;
        live.push_log(&line);

        let is_error = is_error_line(&line);
        if is_error {
            warn!(channel_id = %live.channel_id, line = %line, "encoder reported a problem");
        }

        if line_count % PARSE_INTERVAL == 0 || is_error {
            let mut metrics = live.metrics.lock().unwrap();
            parse_progress(&line, &mut metrics);
        }
    }
}

/// CPU percent (of one logical CPU divided by total CPUs) and RSS bytes
/// for one child, read from the shared host process table.
///
/// The first refresh for a process only establishes its accounting
/// baseline, so the first call reports 0 CPU. A process that has already
/// exited reports zeroes.
pub async fn sample_stats(system: &RwLock<System>, pid: u32, logical_cpus: usize) -> (f64, i64) {
    let pid = Pid::from_u32(pid);
    let mut system = system.write().await;
    system.refresh_process(pid);

    match system.process(pid) {
        Some(process) => (
            process.cpu_usage() as f64 / logical_cpus.max(1) as f64,
            process.memory() as i64,
        ),
        None => (0.0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_extracts_all_fields() {
        let line = "frame= 1234 fps= 29.97 q=23.0 size=  10240KiB time=00:00:41.20 bitrate=2034.6kbits/s drop=7 speed=1.01x";
        let mut metrics = ProgressMetrics::default();
        parse_progress(line, &mut metrics);

        assert_eq!(metrics.frame, 1234);
        assert!((metrics.fps - 29.97).abs() < 1e-9);
        assert_eq!(metrics.bitrate, "2034.6kbits");
        assert_eq!(metrics.speed, "1.01x");
        assert_eq!(metrics.drop_frames, 7);
    }

    #[test]
    fn partial_lines_keep_previous_values() {
        let mut metrics = ProgressMetrics::default();
        parse_progress("frame= 100 fps= 25.0", &mut metrics);
        parse_progress("speed=0.99x", &mut metrics);

        assert_eq!(metrics.frame, 100);
        assert_eq!(metrics.speed, "0.99x");
        assert!((metrics.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn error_pattern_is_case_insensitive() {
        assert!(is_error_line("[http] Connection ERROR: timeout"));
        assert!(is_error_line("Failed to open input"));
        assert!(is_error_line("cannot allocate memory"));
        assert!(is_error_line("Unable to find a suitable output format"));
        assert!(is_error_line("Invalid data found when processing input"));
        assert!(!is_error_line("frame= 100 fps= 25.0 speed=1.0x"));
    }

    #[tokio::test]
    async fn first_sample_reports_zero_cpu() {
        let system = RwLock::new(System::new());
        // Sample our own pid; the baseline refresh must report 0 CPU
        let (cpu, rss) = sample_stats(&system, std::process::id(), 4).await;
        assert_eq!(cpu, 0.0);
        assert!(rss > 0);
    }

    #[tokio::test]
    async fn dead_processes_report_zeroes() {
        let system = RwLock::new(System::new());
        // A pid far outside any plausible live range
        let (cpu, rss) = sample_stats(&system, 999_999_999, 4).await;
        assert_eq!(cpu, 0.0);
        assert_eq!(rss, 0);
    }
}
