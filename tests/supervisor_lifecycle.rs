//! End-to-end lifecycle tests against stub encoder binaries.
//!
//! These exercise the supervisor through its public API without a real
//! encoder: a shell script stands in for ffmpeg, emitting progress lines
//! on stderr and then sleeping like a healthy child would.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use streamcast::config::TranscoderConfig;
use streamcast::errors::{AppResult, TranscoderError};
use streamcast::models::{Channel, ChannelStatus, Settings};
use streamcast::system::SystemProbe;
use streamcast::transcoder::{ProcessManager, SettingsProvider, StatusWriter};

struct StubSettings;

#[async_trait]
impl SettingsProvider for StubSettings {
    async fn system_settings(&self) -> AppResult<Settings> {
        Ok(Settings::default())
    }
}

#[derive(Default)]
struct RecordingStatusWriter {
    statuses: std::sync::Mutex<Vec<(Uuid, ChannelStatus)>>,
}

#[async_trait]
impl StatusWriter for RecordingStatusWriter {
    async fn write_status(&self, channel_id: Uuid, status: ChannelStatus) -> AppResult<()> {
        self.statuses.lock().unwrap().push((channel_id, status));
        Ok(())
    }
}

fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn make_manager(root: &Path, encoder: &Path) -> Arc<ProcessManager> {
    let config = TranscoderConfig {
        ffmpeg_command: encoder.to_string_lossy().into_owned(),
        numactl_command: "/nonexistent/numactl".to_string(),
        nvidia_smi_command: "/nonexistent/nvidia-smi".to_string(),
        ..TranscoderConfig::default()
    };
    let probe = Arc::new(SystemProbe::new(
        "/nonexistent/nvidia-smi",
        "/nonexistent/numactl",
    ));
    let manager = Arc::new(
        ProcessManager::new(
            config,
            root.join("hls"),
            root.join("logos"),
            Arc::new(StubSettings),
            probe,
        )
        .await,
    );
    manager.set_status_writer(Arc::new(RecordingStatusWriter::default()));
    manager
}

#[tokio::test]
async fn monitor_collects_logs_and_progress() {
    let root = TempDir::new().unwrap();
    let encoder = write_script(
        root.path(),
        "chatty-encoder.sh",
        "#!/bin/sh\n\
         echo 'Input #0, hls, from source' >&2\n\
         echo 'Output #0, hls, to sink' >&2\n\
         echo 'frame=  100 fps= 25.0 bitrate=2000.0kbits/s drop=3 speed=1.0x' >&2\n\
         echo 'Error while decoding stream: corrupt packet' >&2\n\
         exec sleep 30\n",
    );
    let manager = make_manager(root.path(), &encoder).await;

    let channel = Channel::new("chatty", "http://src/a.m3u8");
    manager.start(&channel).await.unwrap();

    // Give the monitor a moment to drain stderr
    tokio::time::sleep(Duration::from_millis(500)).await;

    let logs = manager.get_logs(channel.id).await.unwrap();
    assert_eq!(logs.len(), 4);
    assert!(logs[3].contains("Error while decoding"));

    let metrics = manager.get_process(channel.id).await.unwrap();
    // The third line lands on the sampling cadence and carries progress
    assert_eq!(metrics.output_bitrate, 2000);
    assert_eq!(metrics.dropped_frames, 3);
    assert!((metrics.fps - 25.0).abs() < 1e-9);
    assert!((metrics.speed - 1.0).abs() < 1e-9);
    assert_eq!(metrics.input_bitrate, 0);

    manager.stop(channel.id).await.unwrap();

    let err = manager.get_logs(channel.id).await.unwrap_err();
    assert!(matches!(err, TranscoderError::NotRunning(_)));
}

#[tokio::test]
async fn stop_removes_output_directory_and_process() {
    let root = TempDir::new().unwrap();
    let encoder = write_script(root.path(), "encoder.sh", "#!/bin/sh\nexec sleep 30\n");
    let manager = make_manager(root.path(), &encoder).await;

    let channel = Channel::new("demo", "http://src/a.m3u8");
    manager.start(&channel).await.unwrap();

    let output_dir = manager.output_dir(channel.id);
    assert!(output_dir.exists());

    manager.stop(channel.id).await.unwrap();
    assert!(!output_dir.exists());
    assert!(!manager.is_running(channel.id).await);
}

#[tokio::test]
async fn only_one_live_process_per_channel() {
    let root = TempDir::new().unwrap();
    let encoder = write_script(root.path(), "encoder.sh", "#!/bin/sh\nexec sleep 30\n");
    let manager = make_manager(root.path(), &encoder).await;

    let channel = Channel::new("demo", "http://src/a.m3u8");

    // Concurrent starts race on the supervisor lock; exactly one wins
    let (a, b) = tokio::join!(manager.start(&channel), manager.start(&channel));
    assert!(a.is_ok() != b.is_ok());

    assert_eq!(manager.get_all_processes().await.len(), 1);
    manager.stop(channel.id).await.unwrap();
}

#[tokio::test]
async fn metrics_list_covers_running_channels_only() {
    let root = TempDir::new().unwrap();
    let encoder = write_script(root.path(), "encoder.sh", "#!/bin/sh\nexec sleep 30\n");
    let manager = make_manager(root.path(), &encoder).await;

    let first = Channel::new("first", "http://src/a.m3u8");
    let second = Channel::new("second", "http://src/b.m3u8");
    manager.start(&first).await.unwrap();
    manager.start(&second).await.unwrap();

    let all = manager.get_all_processes().await;
    assert_eq!(all.len(), 2);

    manager.stop(first.id).await.unwrap();
    let all = manager.get_all_processes().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].channel_id, second.id);

    manager.stop(second.id).await.unwrap();
    assert!(manager.get_all_processes().await.is_empty());
}
