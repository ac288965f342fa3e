//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] on a temp
//! directory with an in-memory catalog and a [`FakeSupervisor`] that never
//! spawns a process.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;

use cactustv::catalog::MemoryCatalog;
use cactustv::config::Config;
use cactustv::server::{create_router, AppContext};
use cactustv::settings::SettingsStore;
use cactustv::streaming::{Session, StreamingService, TranscodeJob, TranscodeSupervisor};
use cactustv_av::MANIFEST_NAME;
use cactustv_common::{AccelerationMode, MediaId, MediaItem, Result};

/// What the fake encoder does after it is started.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Write a manifest and one segment after the given delay.
    Produce(Duration),
    /// Run forever without writing anything.
    Stall,
    /// Exit with an error right away.
    Fail,
}

/// Supervisor double: counts starts and simulates the encoder with a task.
pub struct FakeSupervisor {
    behavior: Mutex<Behavior>,
    starts: AtomicUsize,
    kills: AtomicUsize,
    jobs: Mutex<Vec<TranscodeJob>>,
    /// How long a killed encoder keeps running before it exits.
    exit_delay: Mutex<Duration>,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
}

impl FakeSupervisor {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            starts: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
            jobs: Mutex::new(Vec::new()),
            exit_delay: Mutex::new(Duration::ZERO),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn set_exit_delay(&self, delay: Duration) {
        *self.exit_delay.lock() = delay;
    }

    /// Most encoders that were ever running at the same time.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<AccelerationMode> {
        self.jobs.lock().iter().map(|j| j.plan.mode).collect()
    }
}

#[async_trait]
impl TranscodeSupervisor for FakeSupervisor {
    async fn start(&self, session: Arc<Session>, job: TranscodeJob) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().push(job.clone());
        let behavior = *self.behavior.lock();
        let exit_delay = *self.exit_delay.lock();
        let live = self.live.clone();
        let running = live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(running, Ordering::SeqCst);

        tokio::spawn(async move {
            match behavior {
                Behavior::Produce(delay) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            let _ = std::fs::write(job.output_dir.join("seg_000.ts"), b"\x47segment");
                            let _ = std::fs::write(
                                job.manifest_path(),
                                "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXTINF:4.0,\nseg_000.ts\n",
                            );
                            session.mark_ready();
                            // Keep "running" until killed, like a live encode.
                            session.killed().await;
                        }
                        _ = session.killed() => {}
                    }
                    session.mark_failed("killed");
                }
                Behavior::Stall => {
                    session.killed().await;
                    session.mark_failed("killed");
                }
                Behavior::Fail => {
                    session.mark_failed("Could not write header for output file");
                }
            }
            if session.is_killed() && !exit_delay.is_zero() {
                // A slow exit still flushes output into the stream directory.
                tokio::time::sleep(exit_delay).await;
                let _ = std::fs::write(job.output_dir.join("seg_999.ts"), b"\x47late");
            }
            live.fetch_sub(1, Ordering::SeqCst);
            session.mark_exited();
        });

        Ok(())
    }

    fn kill(&self, session: &Session) {
        self.kills.fetch_add(1, Ordering::SeqCst);
        session.request_kill();
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub catalog: Arc<MemoryCatalog>,
    pub supervisor: Arc<FakeSupervisor>,
    pub temp: tempfile::TempDir,
}

impl TestHarness {
    /// Harness whose encoder produces a manifest after 50ms.
    pub fn new() -> Self {
        Self::with_behavior(Behavior::Produce(Duration::from_millis(50)))
    }

    pub fn with_behavior(behavior: Behavior) -> Self {
        let mut config = Config::default();
        config.streaming.ready_timeout_secs = 2;
        config.streaming.poll_interval_ms = 20;
        Self::with_config(config, behavior)
    }

    /// Build a harness; `temp_dir` and `library` paths are redirected into a
    /// fresh temp directory.
    pub fn with_config(mut config: Config, behavior: Behavior) -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        config.streaming.temp_dir = temp.path().join("temp");
        config.library.catalog_path = temp.path().join("db.json");
        config.library.settings_path = Some(temp.path().join("settings.json"));

        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert(media("m1", "Movie One"));
        catalog.insert(media("m2", "Movie Two"));

        let supervisor = FakeSupervisor::new(behavior);
        let settings = Arc::new(SettingsStore::load(temp.path().join("settings.json")));
        let streaming = StreamingService::from_config(
            &config.streaming,
            supervisor.clone(),
            catalog.clone(),
            settings.clone(),
        );

        let ctx = AppContext {
            config: Arc::new(config),
            streaming: Arc::new(streaming),
            catalog: catalog.clone(),
            settings,
        };

        Self {
            ctx,
            catalog,
            supervisor,
            temp,
        }
    }

    pub fn service(&self) -> &StreamingService {
        &self.ctx.streaming
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone(), None)
    }

    /// `<temp_dir>/<media_id>`
    pub fn media_dir(&self, media_id: &str) -> PathBuf {
        self.ctx.config.streaming.temp_dir.join(media_id)
    }

    pub fn manifest(&self, media_id: &str, quality: &str) -> PathBuf {
        self.media_dir(media_id).join(quality).join(MANIFEST_NAME)
    }
}

pub fn id(s: &str) -> MediaId {
    MediaId::parse(s).expect("valid media id")
}

pub fn media(id_str: &str, title: &str) -> MediaItem {
    MediaItem {
        id: id(id_str),
        path: PathBuf::from(format!("/media/{id_str}.mkv")),
        title: title.to_string(),
        duration: Some(5400.0),
    }
}

/// Poll `cond` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
