//! Process lifecycle controller
//!
//! Spawns encoder children in their own process groups, terminates them
//! gracefully-then-forcefully, classifies early exits, implements bounded
//! auto-restart and guarantees output-directory cleanup on every terminal
//! transition.
//!
//! Locking pattern: the process table is mutated under the supervisor lock,
//! blocking work (kill-with-timeout, sleeps) happens after release. For a
//! single channel, operations linearise on lock acquisition order; two
//! LiveProcesses can never coexist for the same channel.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use sysinfo::{System, SystemExt};
use tokio::process::{Child, Command};
use tokio::sync::{RwLock, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::command::{self, EncoderSettings};
use super::monitor;
use crate::config::TranscoderConfig;
use crate::database::{ChannelRepository, SettingsRepository};
use crate::errors::{AppResult, TranscoderError};
use crate::models::{Channel, ChannelStatus, ProgressMetrics, Settings, TranscoderMetrics};
use crate::system::SystemProbe;

/// Children exiting before this ran long enough to be a real stream;
/// classify as failed-to-start and never auto-restart.
const FAILED_START_THRESHOLD: Duration = Duration::from_secs(10);
/// Pause between a crash and the restart attempt
const RESTART_DELAY: Duration = Duration::from_secs(2);
const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(3);
const FORCED_STOP_TIMEOUT: Duration = Duration::from_secs(2);
const LOG_CAPACITY: usize = 500;

/// Persists channel status transitions the supervisor decides on its own
/// (failed-to-start, auto-restart failure). Handed to the supervisor after
/// construction; late binding is safe behind the lock.
#[async_trait]
pub trait StatusWriter: Send + Sync {
    async fn write_status(&self, channel_id: Uuid, status: ChannelStatus) -> AppResult<()>;
}

/// Source of the system settings document read at spawn time
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn system_settings(&self) -> AppResult<Settings>;
}

#[async_trait]
impl StatusWriter for ChannelRepository {
    async fn write_status(&self, channel_id: Uuid, status: ChannelStatus) -> AppResult<()> {
        self.update_status(channel_id, status).await
    }
}

#[async_trait]
impl SettingsProvider for SettingsRepository {
    async fn system_settings(&self) -> AppResult<Settings> {
        self.get_system().await
    }
}

/// In-memory record of one running encoder child.
///
/// Exists iff the supervisor currently owns a child for the channel, and is
/// removed from the table exactly once: by an explicit stop or by the
/// watcher observing exit.
pub struct LiveProcess {
    pub channel_id: Uuid,
    /// Channel snapshot at spawn time; auto-restart re-uses it
    pub channel: Channel,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    started: Instant,
    cancel: CancellationToken,
    exited: watch::Receiver<bool>,
    pub(crate) metrics: StdMutex<ProgressMetrics>,
    logs: StdMutex<VecDeque<String>>,
}

impl LiveProcess {
    pub(crate) fn push_log(&self, line: &str) {
        let mut logs = self.logs.lock().unwrap();
        if logs.len() == LOG_CAPACITY {
            logs.pop_front();
        }
        logs.push_back(line.to_string());
    }

    /// Snapshot copy of the tail buffer
    pub fn tail_logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().iter().cloned().collect()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Manages encoder child processes with automatic lifecycle handling
pub struct ProcessManager {
    processes: RwLock<HashMap<Uuid, Arc<LiveProcess>>>,
    /// Channels armed for auto-restart; a Stop during the restart pause
    /// clears the marker and the watcher backs off.
    restart_pending: StdMutex<HashSet<Uuid>>,
    config: TranscoderConfig,
    hls_root: PathBuf,
    logo_root: PathBuf,
    settings: Arc<dyn SettingsProvider>,
    status_writer: StdMutex<Option<Arc<dyn StatusWriter>>>,
    probe: Arc<SystemProbe>,
    /// Shared host process table used for per-child CPU/RSS sampling
    system: RwLock<System>,
    numa_nodes: usize,
    numa_counter: StdMutex<usize>,
}

impl ProcessManager {
    pub async fn new(
        config: TranscoderConfig,
        hls_root: PathBuf,
        logo_root: PathBuf,
        settings: Arc<dyn SettingsProvider>,
        probe: Arc<SystemProbe>,
    ) -> Self {
        let numa_nodes = probe.numa_nodes().await.max(1);
        if numa_nodes > 1 {
            info!(numa_nodes, "detected multiple NUMA nodes");
        }

        Self {
            processes: RwLock::new(HashMap::new()),
            restart_pending: StdMutex::new(HashSet::new()),
            config,
            hls_root,
            logo_root,
            settings,
            status_writer: StdMutex::new(None),
            probe,
            system: RwLock::new(System::new()),
            numa_nodes,
            numa_counter: StdMutex::new(0),
        }
    }

    /// Bind the status writer; called once the channel store exists
    pub fn set_status_writer(&self, writer: Arc<dyn StatusWriter>) {
        *self.status_writer.lock().unwrap() = Some(writer);
    }

    pub fn output_dir(&self, channel_id: Uuid) -> PathBuf {
        self.hls_root.join(channel_id.to_string())
    }

    pub async fn is_running(&self, channel_id: Uuid) -> bool {
        self.processes.read().await.contains_key(&channel_id)
    }

    /// Start transcoding for a channel. Returns as soon as the child is
    /// spawned, before it has produced its first segment.
    pub async fn start(self: &Arc<Self>, channel: &Channel) -> Result<(), TranscoderError> {
        let mut processes = self.processes.write().await;

        if processes.contains_key(&channel.id) {
            return Err(TranscoderError::AlreadyRunning(channel.id));
        }

        let active_processes = processes.len();
        let output_dir = self.output_dir(channel.id);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| TranscoderError::OutputDir {
                dir: output_dir.display().to_string(),
                message: e.to_string(),
            })?;

        let settings = match self.settings.system_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "settings store unavailable, using defaults");
                Settings::default()
            }
        };
        let effective = EncoderSettings::resolve(&self.config, &settings, channel);
        let use_gpu = self.probe.gpu_available().await;
        if use_gpu {
            debug!(channel_id = %channel.id, "GPU detected, encoding with h264_nvenc");
        }

        let args = command::build_args(channel, &effective, &self.logo_root, use_gpu, &output_dir)?;

        let mut cmd = if self.numa_nodes > 1 && self.probe.numactl_available().await {
            let node = self.next_numa_node();
            debug!(channel_id = %channel.id, numa_node = node, "binding encoder to NUMA node");
            let mut cmd = Command::new(&self.config.numactl_command);
            cmd.arg(format!("--cpunodebind={node}"))
                .arg(format!("--membind={node}"))
                .arg(&self.config.ffmpeg_command)
                .args(&args);
            cmd
        } else {
            let mut cmd = Command::new(&self.config.ffmpeg_command);
            cmd.args(&args);
            cmd
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Children get their own process group so the encoder and any
        // helpers it forks can be signalled together.
        unsafe {
            cmd.pre_exec(|| {
                if nix::libc::setpgid(0, 0) == 0 {
                    Ok(())
                } else {
                    Err(std::io::Error::last_os_error())
                }
            });
        }

        let mut child = cmd.spawn().map_err(TranscoderError::Spawn)?;
        let pid = child.id().unwrap_or_default();

        let nice = nice_for_host(self.probe.logical_cpus());
        if let Err(e) = set_priority(pid, nice) {
            warn!(channel_id = %channel.id, pid, nice, error = %e, "failed to set encoder priority");
        }

        let stderr = child.stderr.take();
        let (exit_tx, exit_rx) = watch::channel(false);
        let live = Arc::new(LiveProcess {
            channel_id: channel.id,
            channel: channel.clone(),
            pid,
            started_at: Utc::now(),
            started: Instant::now(),
            cancel: CancellationToken::new(),
            exited: exit_rx,
            metrics: StdMutex::new(ProgressMetrics::default()),
            logs: StdMutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
        });

        processes.insert(channel.id, live.clone());
        drop(processes);

        if let Some(stderr) = stderr {
            tokio::spawn(monitor::run(live.clone(), stderr));
        }
        tokio::spawn(self.clone().watch(child, live, exit_tx));

        info!(
            channel_id = %channel.id,
            channel_name = %channel.name,
            source_url = %channel.source_url,
            pid,
            active_processes,
            output_dir = %output_dir.display(),
            "started encoder process"
        );

        Ok(())
    }

    /// Stop transcoding for a channel. Idempotent: a channel without a
    /// LiveProcess still gets its stale output directory swept.
    pub async fn stop(&self, channel_id: Uuid) -> Result<(), TranscoderError> {
        let live = {
            let mut processes = self.processes.write().await;
            self.restart_pending.lock().unwrap().remove(&channel_id);
            processes.remove(&channel_id)
        };
        let output_dir = self.output_dir(channel_id);

        let Some(live) = live else {
            self.wipe_output_dir(&output_dir).await;
            return Ok(());
        };

        info!(channel_id = %channel_id, pid = live.pid, "stopping encoder process");

        live.cancel.cancel();
        signal_group(live.pid, Signal::SIGTERM);

        let mut exited = live.exited.clone();
        if timeout(GRACEFUL_STOP_TIMEOUT, exited.wait_for(|done| *done))
            .await
            .is_err()
        {
            warn!(channel_id = %channel_id, pid = live.pid, "graceful stop timed out, sending SIGKILL");
            signal_group(live.pid, Signal::SIGKILL);
            if timeout(FORCED_STOP_TIMEOUT, exited.wait_for(|done| *done))
                .await
                .is_err()
            {
                error!(channel_id = %channel_id, pid = live.pid, "process survived SIGKILL, possible zombie");
            }
        }

        self.wipe_output_dir(&output_dir).await;
        Ok(())
    }

    /// Live metrics for one channel
    pub async fn get_process(&self, channel_id: Uuid) -> Result<TranscoderMetrics, TranscoderError> {
        let live = self
            .processes
            .read()
            .await
            .get(&channel_id)
            .cloned()
            .ok_or(TranscoderError::NotRunning(channel_id))?;

        Ok(self.build_metrics(&live).await)
    }

    /// Live metrics for every running channel
    pub async fn get_all_processes(&self) -> Vec<TranscoderMetrics> {
        let snapshot: Vec<Arc<LiveProcess>> =
            self.processes.read().await.values().cloned().collect();

        let mut metrics = Vec::with_capacity(snapshot.len());
        for live in &snapshot {
            metrics.push(self.build_metrics(live).await);
        }
        metrics
    }

    /// Tail of the encoder log ring for one channel
    pub async fn get_logs(&self, channel_id: Uuid) -> Result<Vec<String>, TranscoderError> {
        let live = self
            .processes
            .read()
            .await
            .get(&channel_id)
            .cloned()
            .ok_or(TranscoderError::NotRunning(channel_id))?;

        Ok(live.tail_logs())
    }

    async fn build_metrics(&self, live: &LiveProcess) -> TranscoderMetrics {
        let (cpu_usage, memory_usage) =
            monitor::sample_stats(&self.system, live.pid, self.probe.logical_cpus()).await;
        let progress = live.metrics.lock().unwrap().clone();

        TranscoderMetrics {
            channel_id: live.channel_id,
            pid: live.pid,
            started_at: live.started_at,
            cpu_usage,
            memory_usage,
            input_bitrate: 0,
            output_bitrate: progress.output_bitrate_kbps(),
            dropped_frames: progress.drop_frames,
            fps: progress.fps,
            speed: progress.speed_factor(),
            uptime: live.uptime().as_secs() as i64,
        }
    }

    /// Waits on child exit and decides the terminal transition:
    /// failed-to-start, explicit stop, crash, or crash-with-restart.
    ///
    /// Returns a type-erased boxed future (rather than `async fn`) to break
    /// the Send-auto-trait cycle between `start` (which spawns `watch`) and
    /// `watch` (which calls back into `start` on auto-restart).
    fn watch(
        self: Arc<Self>,
        mut child: Child,
        live: Arc<LiveProcess>,
        exit_tx: watch::Sender<bool>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
        let status = child.wait().await;
        let _ = exit_tx.send(true);
        let uptime = live.uptime();

        match &status {
            Ok(status) => live.push_log(&format!(
                "[info] process exited with {status} (uptime {uptime:?})"
            )),
            Err(e) => live.push_log(&format!(
                "[error] failed to reap process: {e} (uptime {uptime:?})"
            )),
        }

        // Remove our own entry; an explicit stop already removed it, and a
        // newer process may own the slot by the time this runs.
        let was_in_table = {
            let mut processes = self.processes.write().await;
            match processes.get(&live.channel_id) {
                Some(current) if Arc::ptr_eq(current, &live) => {
                    processes.remove(&live.channel_id);
                    true
                }
                _ => false,
            }
        };
        let output_dir = self.output_dir(live.channel_id);

        if uptime < FAILED_START_THRESHOLD {
            warn!(
                channel_id = %live.channel_id,
                uptime_secs = uptime.as_secs(),
                "encoder exited too quickly, treating as failed start"
            );
            self.wipe_output_dir(&output_dir).await;
            self.write_status(live.channel_id, ChannelStatus::Stopped)
                .await;
            return;
        }

        if !was_in_table {
            info!(channel_id = %live.channel_id, "process was stopped explicitly, cleaning up");
            self.wipe_output_dir(&output_dir).await;
            return;
        }

        info!(
            channel_id = %live.channel_id,
            uptime_secs = uptime.as_secs(),
            auto_restart = live.channel.auto_restart,
            "encoder process exited"
        );

        if !live.channel.auto_restart {
            self.wipe_output_dir(&output_dir).await;
            return;
        }

        // Removal and cleanup precede any restart attempt
        self.wipe_output_dir(&output_dir).await;
        self.restart_pending
            .lock()
            .unwrap()
            .insert(live.channel_id);

        info!(channel_id = %live.channel_id, "auto-restart armed, restarting in 2s");
        tokio::time::sleep(RESTART_DELAY).await;

        let still_armed = self
            .restart_pending
            .lock()
            .unwrap()
            .remove(&live.channel_id);
        if !still_armed {
            info!(channel_id = %live.channel_id, "channel was stopped during restart pause, skipping");
            self.wipe_output_dir(&output_dir).await;
            return;
        }
        if self.is_running(live.channel_id).await {
            return;
        }

        // Boxed to break the async type cycle between start and watch
        if let Err(e) = Box::pin(self.start(&live.channel)).await {
            error!(channel_id = %live.channel_id, error = %e, "auto-restart failed");
            self.wipe_output_dir(&output_dir).await;
            self.write_status(live.channel_id, ChannelStatus::Error)
                .await;
        }
        })
    }

    async fn write_status(&self, channel_id: Uuid, status: ChannelStatus) {
        let writer = self.status_writer.lock().unwrap().clone();
        if let Some(writer) = writer
            && let Err(e) = writer.write_status(channel_id, status).await
        {
            error!(channel_id = %channel_id, status = %status, error = %e, "failed to persist channel status");
        }
    }

    async fn wipe_output_dir(&self, dir: &Path) {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!(output_dir = %dir.display(), "removed output directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(output_dir = %dir.display(), error = %e, "failed to remove output directory");
            }
        }
    }

    fn next_numa_node(&self) -> usize {
        let mut counter = self.numa_counter.lock().unwrap();
        let node = *counter % self.numa_nodes;
        *counter += 1;
        node
    }
}

/// Normal priority on big hosts, progressively nicer on small ones
fn nice_for_host(logical_cpus: usize) -> i32 {
    if logical_cpus >= 64 {
        0
    } else if logical_cpus >= 16 {
        2
    } else {
        5
    }
}

fn set_priority(pid: u32, nice: i32) -> std::io::Result<()> {
    if pid == 0 {
        return Ok(());
    }
    let result = unsafe { nix::libc::setpriority(nix::libc::PRIO_PROCESS as _, pid as _, nice) };
    if result == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Signal the child's whole process group; fall back to the single PID
/// when the group lookup fails.
fn signal_group(pid: u32, sig: Signal) {
    if pid == 0 {
        return;
    }
    let pid = Pid::from_raw(pid as i32);
    match nix::unistd::getpgid(Some(pid)) {
        Ok(pgid) => {
            if let Err(e) = signal::killpg(pgid, sig) {
                debug!(%pid, %pgid, signal = ?sig, error = %e, "killpg failed");
            }
        }
        Err(e) => {
            debug!(%pid, signal = ?sig, error = %e, "process group lookup failed, signalling pid");
            let _ = signal::kill(pid, sig);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct StubSettings;

    #[async_trait]
    impl SettingsProvider for StubSettings {
        async fn system_settings(&self) -> AppResult<Settings> {
            Ok(Settings::default())
        }
    }

    #[derive(Default)]
    struct RecordingStatusWriter {
        statuses: StdMutex<Vec<(Uuid, ChannelStatus)>>,
    }

    #[async_trait]
    impl StatusWriter for RecordingStatusWriter {
        async fn write_status(&self, channel_id: Uuid, status: ChannelStatus) -> AppResult<()> {
            self.statuses.lock().unwrap().push((channel_id, status));
            Ok(())
        }
    }

    async fn make_manager(
        hls_root: &Path,
        encoder_command: &str,
    ) -> (Arc<ProcessManager>, Arc<RecordingStatusWriter>) {
        let config = TranscoderConfig {
            ffmpeg_command: encoder_command.to_string(),
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
                hls_root.to_path_buf(),
                hls_root.join("logos"),
                Arc::new(StubSettings),
                probe,
            )
            .await,
        );
        let writer = Arc::new(RecordingStatusWriter::default());
        manager.set_status_writer(writer.clone());
        (manager, writer)
    }

    /// A stand-in encoder that ignores its arguments and stays alive
    fn write_stub_encoder(dir: &Path) -> PathBuf {
        let path = dir.join("fake-encoder.sh");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn start_spawns_and_rejects_duplicates() {
        let dir = TempDir::new().unwrap();
        let encoder = write_stub_encoder(dir.path());
        let (manager, _) = make_manager(dir.path(), encoder.to_str().unwrap()).await;

        let channel = Channel::new("demo", "http://src/a.m3u8");
        manager.start(&channel).await.unwrap();
        assert!(manager.is_running(channel.id).await);
        assert!(manager.output_dir(channel.id).exists());

        let err = manager.start(&channel).await.unwrap_err();
        assert!(matches!(err, TranscoderError::AlreadyRunning(id) if id == channel.id));

        manager.stop(channel.id).await.unwrap();
    }

    #[tokio::test]
    async fn stop_kills_child_and_removes_directory() {
        let dir = TempDir::new().unwrap();
        let encoder = write_stub_encoder(dir.path());
        let (manager, _) = make_manager(dir.path(), encoder.to_str().unwrap()).await;

        let channel = Channel::new("demo", "http://src/a.m3u8");
        manager.start(&channel).await.unwrap();
        let metrics = manager.get_process(channel.id).await.unwrap();
        assert!(metrics.pid > 0);

        manager.stop(channel.id).await.unwrap();
        assert!(!manager.is_running(channel.id).await);
        assert!(!manager.output_dir(channel.id).exists());

        // The child is gone, not reparented
        assert!(signal::kill(Pid::from_raw(metrics.pid as i32), None::<Signal>).is_err());
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_sweeps_stale_directories() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = make_manager(dir.path(), "/bin/false").await;

        let channel_id = Uuid::new_v4();
        let stale = manager.output_dir(channel_id);
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("segment_00001.ts"), b"stale").unwrap();

        manager.stop(channel_id).await.unwrap();
        assert!(!stale.exists());

        // A second stop on the same channel still succeeds
        manager.stop(channel_id).await.unwrap();
    }

    #[tokio::test]
    async fn early_exit_is_failed_to_start_and_never_restarts() {
        let dir = TempDir::new().unwrap();
        let (manager, writer) = make_manager(dir.path(), "/bin/false").await;

        let mut channel = Channel::new("broken", "invalid://broken");
        channel.auto_restart = true;
        manager.start(&channel).await.unwrap();

        // The child exits immediately; give the watcher a moment
        for _ in 0..50 {
            if !manager.is_running(channel.id).await
                && !writer.statuses.lock().unwrap().is_empty()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert!(!manager.is_running(channel.id).await);
        assert!(!manager.output_dir(channel.id).exists());

        let statuses = writer.statuses.lock().unwrap().clone();
        assert_eq!(statuses, vec![(channel.id, ChannelStatus::Stopped)]);

        // No restart was scheduled despite the auto-restart flag
        tokio::time::sleep(RESTART_DELAY + Duration::from_millis(500)).await;
        assert!(!manager.is_running(channel.id).await);
    }

    #[tokio::test]
    async fn logs_are_unavailable_without_a_live_process() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = make_manager(dir.path(), "/bin/false").await;

        let err = manager.get_logs(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TranscoderError::NotRunning(_)));
    }

    #[tokio::test]
    async fn metrics_uptime_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let encoder = write_stub_encoder(dir.path());
        let (manager, _) = make_manager(dir.path(), encoder.to_str().unwrap()).await;

        let channel = Channel::new("demo", "http://src/a.m3u8");
        manager.start(&channel).await.unwrap();

        let first = manager.get_process(channel.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let second = manager.get_process(channel.id).await.unwrap();
        assert!(second.uptime >= first.uptime);
        assert_eq!(first.started_at, second.started_at);

        manager.stop(channel.id).await.unwrap();
    }

    #[test]
    fn nice_scales_with_host_size() {
        assert_eq!(nice_for_host(256), 0);
        assert_eq!(nice_for_host(64), 0);
        assert_eq!(nice_for_host(32), 2);
        assert_eq!(nice_for_host(8), 5);
    }

    #[test]
    fn log_ring_is_bounded() {
        let (_, exit_rx) = watch::channel(false);
        let live = LiveProcess {
            channel_id: Uuid::new_v4(),
            channel: Channel::new("demo", "http://src/a.m3u8"),
            pid: 0,
            started_at: Utc::now(),
            started: Instant::now(),
            cancel: CancellationToken::new(),
            exited: exit_rx,
            metrics: StdMutex::new(ProgressMetrics::default()),
            logs: StdMutex::new(VecDeque::new()),
        };

        for i in 0..LOG_CAPACITY + 100 {
            live.push_log(&format!("line {i}"));
        }

        let logs = live.tail_logs();
        assert_eq!(logs.len(), LOG_CAPACITY);
        assert_eq!(logs.first().unwrap(), "line 100");
        assert_eq!(logs.last().unwrap(), &format!("line {}", LOG_CAPACITY + 99));
    }
}
