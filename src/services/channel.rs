//! Channel control facade and batch coordinator
//!
//! Single-channel operations read the channel store, write the status fast
//! path and call through to the lifecycle controller. Batch operations fan
//! ids into a bounded worker pool with inter-batch pacing; per-id results
//! come back in completion order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::ChannelRepository;
use crate::errors::{AppError, AppResult};
use crate::models::{Channel, ChannelStatus, LogoConfig, OutputConfig, TranscoderMetrics};
use crate::transcoder::ProcessManager;

/// Delay between stop and start when restarting a single channel
const RESTART_PAUSE: Duration = Duration::from_millis(1000);
/// Grace period for the best-effort stop during delete
const DELETE_STOP_GRACE: Duration = Duration::from_millis(200);

const BATCH_CONCURRENCY: usize = 5;
const BATCH_DELAY: Duration = Duration::from_millis(100);
/// Restart is the heaviest operation: stop, pause and spawn per id
const RESTART_CONCURRENCY: usize = 3;
const RESTART_BATCH_DELAY: Duration = Duration::from_millis(200);

/// Outcome of a fan-out operation. Per-id results are never reordered to
/// match the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: Vec<Uuid>,
    pub failed: Vec<BatchError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    pub channel_id: Uuid,
    pub error: String,
}

pub struct ChannelService {
    repo: ChannelRepository,
    transcoder: Arc<ProcessManager>,
}

impl ChannelService {
    pub fn new(repo: ChannelRepository, transcoder: Arc<ProcessManager>) -> Self {
        Self { repo, transcoder }
    }

    pub async fn create(
        &self,
        name: String,
        source_url: String,
        logo: Option<LogoConfig>,
        output_config: Option<OutputConfig>,
    ) -> AppResult<Channel> {
        if name.is_empty() || source_url.is_empty() {
            return Err(AppError::validation("name and source_url are required"));
        }

        let mut channel = Channel::new(name, source_url);
        if logo.is_some() {
            channel.logo = logo;
        }
        if output_config.is_some() {
            channel.output_config = output_config;
        }

        self.repo.create(&channel).await?;
        info!(channel_id = %channel.id, channel_name = %channel.name, "created channel");
        Ok(channel)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Channel> {
        let mut channel = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("channel", id.to_string()))?;
        channel.output_url = Some(output_url(id));
        Ok(channel)
    }

    pub async fn list(&self) -> AppResult<Vec<Channel>> {
        let mut channels = self.repo.list().await?;
        for channel in &mut channels {
            channel.output_url = Some(output_url(channel.id));
        }
        Ok(channels)
    }

    /// Update the declarative channel record. Rejected while a child is
    /// alive; stop the channel first.
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<String>,
        source_url: Option<String>,
        logo: Option<LogoConfig>,
        output_config: Option<OutputConfig>,
    ) -> AppResult<Channel> {
        let mut channel = self.get(id).await?;

        if self.transcoder.is_running(id).await {
            return Err(AppError::conflict("cannot update a running channel"));
        }

        if let Some(name) = name.filter(|n| !n.is_empty()) {
            channel.name = name;
        }
        if let Some(source_url) = source_url.filter(|u| !u.is_empty()) {
            channel.source_url = source_url;
        }
        // An explicit null removes the logo overlay
        channel.logo = logo;
        if output_config.is_some() {
            channel.output_config = output_config;
        }

        self.repo.update(&channel).await?;
        self.get(id).await
    }

    /// Best-effort stop, short grace, then remove the row. A slow-to-die
    /// encoder does not block the delete.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.get(id).await?;

        if self.transcoder.is_running(id).await {
            let _ = self.transcoder.stop(id).await;
            tokio::time::sleep(DELETE_STOP_GRACE).await;
        }

        self.repo.delete(id).await?;
        info!(channel_id = %id, "deleted channel");
        Ok(())
    }

    /// Start transcoding. Idempotent: an already-running channel just gets
    /// its persisted status re-asserted.
    pub async fn start(&self, id: Uuid) -> AppResult<()> {
        let channel = self.get(id).await?;

        if self.transcoder.is_running(id).await {
            self.repo.update_status(id, ChannelStatus::Running).await?;
            return Ok(());
        }

        self.repo.update_status(id, ChannelStatus::Starting).await?;

        if let Err(e) = self.transcoder.start(&channel).await {
            self.repo.update_status(id, ChannelStatus::Error).await?;
            return Err(e.into());
        }

        self.repo.update_status(id, ChannelStatus::Running).await
    }

    /// Stop transcoding. Idempotent: a stopped channel just gets its
    /// persisted status re-asserted.
    pub async fn stop(&self, id: Uuid) -> AppResult<()> {
        self.get(id).await?;

        if !self.transcoder.is_running(id).await {
            self.repo.update_status(id, ChannelStatus::Stopped).await?;
            return Ok(());
        }

        self.repo.update_status(id, ChannelStatus::Stopping).await?;

        if let Err(e) = self.transcoder.stop(id).await {
            self.repo.update_status(id, ChannelStatus::Error).await?;
            return Err(e.into());
        }

        self.repo.update_status(id, ChannelStatus::Stopped).await
    }

    /// Stop then start with a pause in between; degenerates to a plain
    /// start when the channel is not running.
    pub async fn restart(&self, id: Uuid) -> AppResult<()> {
        self.get(id).await?;

        if self.transcoder.is_running(id).await {
            self.stop(id).await?;
            tokio::time::sleep(RESTART_PAUSE).await;
        }

        self.start(id).await
    }

    pub async fn metrics(&self, id: Uuid) -> AppResult<TranscoderMetrics> {
        Ok(self.transcoder.get_process(id).await?)
    }

    pub async fn all_metrics(&self) -> Vec<TranscoderMetrics> {
        self.transcoder.get_all_processes().await
    }

    pub async fn logs(&self, id: Uuid) -> AppResult<Vec<String>> {
        Ok(self.transcoder.get_logs(id).await?)
    }

    pub async fn batch_start(&self, ids: Vec<Uuid>) -> BatchResult {
        run_batch(ids, BATCH_CONCURRENCY, BATCH_DELAY, |id| self.start(id)).await
    }

    pub async fn batch_stop(&self, ids: Vec<Uuid>) -> BatchResult {
        run_batch(ids, BATCH_CONCURRENCY, BATCH_DELAY, |id| self.stop(id)).await
    }

    pub async fn batch_restart(&self, ids: Vec<Uuid>) -> BatchResult {
        run_batch(ids, RESTART_CONCURRENCY, RESTART_BATCH_DELAY, |id| {
            self.restart(id)
        })
        .await
    }

    pub async fn batch_delete(&self, ids: Vec<Uuid>) -> BatchResult {
        run_batch(ids, BATCH_CONCURRENCY, BATCH_DELAY, |id| self.delete(id)).await
    }
}

fn output_url(id: Uuid) -> String {
    format!("/streams/{id}/index.m3u8")
}

/// Fan ids into a bounded worker pool. Sleeps `delay` every `concurrency`
/// completions to smooth load on the host.
pub(crate) async fn run_batch<F, Fut>(
    ids: Vec<Uuid>,
    concurrency: usize,
    delay: Duration,
    op: F,
) -> BatchResult
where
    F: Fn(Uuid) -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    let total = ids.len();
    let mut result = BatchResult {
        success: Vec::with_capacity(total),
        failed: Vec::new(),
    };

    let mut outcomes = futures::stream::iter(ids.into_iter().map(|id| {
        let fut = op(id);
        async move { (id, fut.await) }
    }))
    .buffer_unordered(concurrency.max(1));

    let mut completed = 0usize;
    while let Some((id, outcome)) = outcomes.next().await {
        match outcome {
            Ok(()) => result.success.push(id),
            Err(e) => result.failed.push(BatchError {
                channel_id: id,
                error: e.to_string(),
            }),
        }

        completed += 1;
        if completed < total && completed % concurrency.max(1) == 0 {
            tokio::time::sleep(delay).await;
        }
    }

    result
}
