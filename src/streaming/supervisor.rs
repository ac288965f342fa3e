//! Encoder process supervision.
//!
//! A [`TranscodeSupervisor`] launches one encoder per session and drives the
//! session's lifecycle signals: `Ready` once the manifest shows up, `Failed`
//! if the process ends first, and `exited` when the process is gone. The
//! streaming service releases the session from the registry on `exited`, so
//! supervisors never touch the registry themselves.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;

use cactustv_av::{format_command_line, EncoderPlan, HlsOutput, MANIFEST_NAME};
use cactustv_common::Result;

use super::registry::{Session, KILLED_REASON};

/// Number of stderr lines kept for failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Everything needed to run one encode.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub plan: EncoderPlan,
    /// Source media file.
    pub source: PathBuf,
    /// Session directory; must already exist.
    pub output_dir: PathBuf,
    /// Catalog title, for logs.
    pub title: String,
}

impl TranscodeJob {
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_NAME)
    }
}

#[async_trait]
pub trait TranscodeSupervisor: Send + Sync {
    /// Launch the encoder for `session` and return once it is running.
    ///
    /// Implementations must eventually resolve the session's readiness and
    /// call [`Session::mark_exited`] when the process is gone.
    async fn start(&self, session: Arc<Session>, job: TranscodeJob) -> Result<()>;

    /// Forcibly stop the encoder behind `session`.
    fn kill(&self, session: &Session) {
        session.request_kill();
    }
}

/// Runs ffmpeg as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegSupervisor {
    ffmpeg: PathBuf,
    hls: HlsOutput,
    poll_interval: Duration,
}

impl FfmpegSupervisor {
    pub fn new(ffmpeg: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            hls: HlsOutput::default(),
            poll_interval,
        }
    }

    pub fn with_hls_output(mut self, hls: HlsOutput) -> Self {
        self.hls = hls;
        self
    }

    fn command_args(&self, job: &TranscodeJob) -> Vec<String> {
        self.hls
            .command_args(&job.plan, &job.source, &job.output_dir)
    }
}

#[async_trait]
impl TranscodeSupervisor for FfmpegSupervisor {
    async fn start(&self, session: Arc<Session>, job: TranscodeJob) -> Result<()> {
        let args = self.command_args(&job);
        let key = session.key();

        tracing::info!(
            media_id = %key.media_id,
            quality = %key.quality,
            mode = %job.plan.mode,
            title = %job.title,
            session_id = %session.id(),
            "Starting transcode"
        );
        tracing::debug!(
            command = %format_command_line(&self.ffmpeg, &args),
            "Encoder command"
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| cactustv_av::Error::tool_failed("ffmpeg", format!("failed to spawn: {e}")))?;

        let stderr = child.stderr.take().map(|s| tokio::spawn(stderr_tail(s)));

        tokio::spawn(monitor(
            session,
            child,
            stderr,
            job.manifest_path(),
            self.poll_interval,
        ));

        Ok(())
    }

    fn kill(&self, session: &Session) {
        if !session.has_exited() {
            tracing::info!(
                media_id = %session.key().media_id,
                quality = %session.key().quality,
                session_id = %session.id(),
                "Killing transcode"
            );
        }
        session.request_kill();
    }
}

/// Watch one encoder until it exits.
async fn monitor(
    session: Arc<Session>,
    mut child: Child,
    stderr: Option<JoinHandle<String>>,
    manifest: PathBuf,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = session.killed() => {
                // SIGKILL; the encoder gets no chance to flush.
                let _ = child.start_kill();
                break child.wait().await;
            }
            _ = ticker.tick(), if !session.is_ready() => {
                if manifest_exists(&manifest).await && session.mark_ready() {
                    tracing::info!(
                        media_id = %session.key().media_id,
                        quality = %session.key().quality,
                        "Stream ready"
                    );
                }
            }
        }
    };

    let tail = match stderr {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    let key = session.key();
    if session.is_killed() {
        session.mark_failed(KILLED_REASON);
        tracing::info!(media_id = %key.media_id, quality = %key.quality, "Transcode stopped");
    } else {
        match status {
            Ok(status) if status.success() => {
                if manifest_exists(&manifest).await {
                    session.mark_ready();
                    tracing::info!(
                        media_id = %key.media_id,
                        quality = %key.quality,
                        "Transcode finished"
                    );
                } else if session.mark_failed("encoder exited without producing a manifest") {
                    tracing::error!(
                        media_id = %key.media_id,
                        quality = %key.quality,
                        "Encoder exited without producing a manifest"
                    );
                }
            }
            Ok(status) => {
                let reason = failure_reason(status, &tail);
                tracing::error!(
                    media_id = %key.media_id,
                    quality = %key.quality,
                    error = %reason,
                    "Transcode failed"
                );
                session.mark_failed(reason);
            }
            Err(e) => {
                tracing::error!(
                    media_id = %key.media_id,
                    quality = %key.quality,
                    error = %e,
                    "Failed to wait for encoder"
                );
                session.mark_failed(format!("failed to wait for encoder: {e}"));
            }
        }
    }

    session.mark_exited();
}

async fn manifest_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn failure_reason(status: ExitStatus, stderr_tail: &str) -> String {
    let tail = stderr_tail.trim();
    if tail.is_empty() {
        format!("encoder exited with {status}")
    } else {
        format!("encoder exited with {status}: {tail}")
    }
}

/// Collect the last [`STDERR_TAIL_LINES`] lines of the encoder's stderr.
async fn stderr_tail(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}
