//! Public entry points of the streaming engine.
//!
//! Per stream key the service moves through `Absent -> Starting -> Ready`.
//! A play request for a key whose manifest already exists returns at once.
//! Otherwise it joins the registered session, or registers one and starts
//! the encoder, and waits on the session's shared readiness signal.
//!
//! A stopped session holds its key until its encoder has exited (and, after
//! [`StreamingService::kill_stream`], until the media directory is gone).
//! Requests arriving meanwhile wait for the release within their own ready
//! timeout, then start a fresh session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use cactustv_av::{profiles, PlanBuilder, MANIFEST_NAME};
use cactustv_common::{AccelerationMode, Error, MediaId, MediaItem, Result, StreamKey};

use super::registry::{Acquired, Session, SessionInfo, SessionRegistry};
use super::store::SegmentStore;
use super::supervisor::{TranscodeJob, TranscodeSupervisor};
use crate::catalog::Catalog;
use crate::config::StreamingConfig;
use crate::settings::SettingsProvider;

/// Upper bound on waiting for killed encoders to exit before reclaiming.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Tunables of [`StreamingService`].
#[derive(Debug, Clone)]
pub struct StreamingOptions {
    /// Process-wide acceleration mode, used when the user allows it.
    pub hwaccel: AccelerationMode,
    /// Bound on each play request's wait for the manifest.
    pub ready_timeout: Duration,
    /// Kill a session whose waiter timed out.
    pub kill_on_timeout: bool,
    /// URL prefix of returned stream paths.
    pub stream_base: String,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self::from(&StreamingConfig::default())
    }
}

impl From<&StreamingConfig> for StreamingOptions {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            hwaccel: config.hwaccel,
            ready_timeout: config.ready_timeout(),
            kill_on_timeout: config.kill_on_timeout,
            stream_base: config.stream_base.clone(),
        }
    }
}

/// The streaming engine.
pub struct StreamingService {
    store: SegmentStore,
    registry: Arc<SessionRegistry>,
    supervisor: Arc<dyn TranscodeSupervisor>,
    catalog: Arc<dyn Catalog>,
    settings: Arc<dyn SettingsProvider>,
    planner: PlanBuilder,
    options: StreamingOptions,
}

impl StreamingService {
    pub fn new(
        store: SegmentStore,
        supervisor: Arc<dyn TranscodeSupervisor>,
        catalog: Arc<dyn Catalog>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            store,
            registry: Arc::new(SessionRegistry::new()),
            supervisor,
            catalog,
            settings,
            planner: PlanBuilder::new(),
            options: StreamingOptions::default(),
        }
    }

    /// Build a service from the `[streaming]` config section.
    pub fn from_config(
        config: &StreamingConfig,
        supervisor: Arc<dyn TranscodeSupervisor>,
        catalog: Arc<dyn Catalog>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self::new(
            SegmentStore::new(&config.temp_dir),
            supervisor,
            catalog,
            settings,
        )
        .with_options(StreamingOptions::from(config))
        .with_planner(PlanBuilder::new().with_vaapi_device(&config.vaapi_device))
    }

    pub fn with_options(mut self, options: StreamingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_planner(mut self, planner: PlanBuilder) -> Self {
        self.planner = planner;
        self
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn options(&self) -> &StreamingOptions {
        &self.options
    }

    /// Stream key for a request. Unknown qualities share the default
    /// profile's session.
    pub fn stream_key(media_id: &MediaId, quality: &str) -> StreamKey {
        StreamKey::new(media_id.clone(), profiles::resolve(quality).label)
    }

    /// URL of the manifest for `key`.
    pub fn stream_path(&self, key: &StreamKey) -> String {
        format!(
            "{}/{}/{}/{}",
            self.options.stream_base.trim_end_matches('/'),
            key.media_id,
            key.quality,
            MANIFEST_NAME
        )
    }

    /// Make sure a playable manifest exists for `(media_id, quality)` and
    /// return its stream path.
    ///
    /// An existing manifest is served without consulting the catalog.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the catalog does not know `media_id`.
    /// - `Timeout` if the manifest does not appear within the ready timeout.
    /// - `EncodeFailed` if the encoder ends (or is killed) first.
    pub async fn prepare_stream(&self, media_id: &MediaId, quality: &str) -> Result<String> {
        let key = Self::stream_key(media_id, quality);
        let deadline = Instant::now() + self.options.ready_timeout;
        let mut item: Option<MediaItem> = None;

        let session = loop {
            if let Some(session) = self.registry.find(&key) {
                if !session.is_joinable() {
                    self.await_released(&session, deadline).await?;
                    continue;
                }
            }

            if self.store.exists(&self.store.manifest_path(&key)).await {
                tracing::debug!(media_id = %key.media_id, quality = %key.quality, "Stream already prepared");
                return Ok(self.stream_path(&key));
            }

            let media = match item.take() {
                Some(media) => media,
                None => self
                    .catalog
                    .lookup(media_id)
                    .await?
                    .ok_or_else(|| Error::not_found("media", media_id))?,
            };

            match self
                .registry
                .try_acquire(key.clone(), self.store.quality_dir(&key))
            {
                Acquired::Started(session) => {
                    if let Err(e) = self.launch(&session, &media).await {
                        tracing::error!(
                            media_id = %key.media_id,
                            quality = %key.quality,
                            error = %e,
                            "Failed to start transcode"
                        );
                        session.mark_failed(e.to_string());
                        session.mark_exited();
                        self.registry.release(&session);
                    }
                    break session;
                }
                Acquired::Joined(session) => {
                    tracing::debug!(
                        media_id = %key.media_id,
                        quality = %key.quality,
                        session_id = %session.id(),
                        "Joining running transcode"
                    );
                    break session;
                }
                Acquired::Draining(session) => {
                    item = Some(media);
                    self.await_released(&session, deadline).await?;
                }
            }
        };

        self.await_ready(&session, deadline).await?;
        Ok(self.stream_path(&key))
    }

    async fn launch(&self, session: &Arc<Session>, item: &MediaItem) -> Result<()> {
        let key = session.key();
        let settings = self.settings.playback_settings();
        let mode = AccelerationMode::effective(self.options.hwaccel, &settings);
        let plan = self
            .planner
            .build(mode, profiles::resolve(&key.quality));
        let output_dir = self.store.output_dir(key).await?;

        let job = TranscodeJob {
            plan,
            source: item.path.clone(),
            output_dir,
            title: item.title.clone(),
        };
        self.supervisor.start(session.clone(), job).await?;

        let registry = self.registry.clone();
        let session = session.clone();
        tokio::spawn(async move {
            session.wait_exited().await;
            registry.release(&session);
        });

        Ok(())
    }

    /// Wait until a stopped session gives up its key.
    async fn await_released(&self, session: &Session, deadline: Instant) -> Result<()> {
        tracing::debug!(
            media_id = %session.key().media_id,
            quality = %session.key().quality,
            session_id = %session.id(),
            "Waiting for stopped transcode to exit"
        );
        tokio::time::timeout_at(deadline, session.wait_released())
            .await
            .map_err(|_| self.timed_out(session.key()))
    }

    async fn await_ready(&self, session: &Arc<Session>, deadline: Instant) -> Result<()> {
        match tokio::time::timeout_at(deadline, session.wait_ready()).await {
            Ok(result) => result,
            Err(_) => {
                // The session stays registered until its encoder exits.
                if self.options.kill_on_timeout {
                    self.supervisor.kill(session);
                }
                Err(self.timed_out(session.key()))
            }
        }
    }

    fn timed_out(&self, key: &StreamKey) -> Error {
        let bound = self.options.ready_timeout;
        tracing::warn!(
            media_id = %key.media_id,
            quality = %key.quality,
            timeout_secs = bound.as_secs(),
            "Timed out waiting for manifest"
        );
        Error::timeout(format!("stream {key}"), bound)
    }

    /// Path of a file inside a stream directory. Existence is not checked.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `name` is not a single path component.
    pub fn segment_path(&self, media_id: &MediaId, quality: &str, name: &str) -> Result<PathBuf> {
        self.store
            .segment_path(&Self::stream_key(media_id, quality), name)
    }

    /// Stop every session of `media_id` and reclaim its directory.
    ///
    /// Never fails. Pending waiters are woken at once. Reclaiming happens in
    /// the background once the killed encoders have exited (or
    /// [`KILL_GRACE`] has passed); every quality of the media stays blocked
    /// until then. The returned handle completes when it is done.
    pub fn kill_stream(&self, media_id: &MediaId) -> JoinHandle<()> {
        let stopped = self
            .registry
            .stop_media(media_id, profiles::labels(), |key| self.store.quality_dir(key));
        for session in &stopped.killed {
            self.supervisor.kill(session);
        }
        tracing::info!(media_id = %media_id, sessions = stopped.killed.len(), "Stream killed");

        let store = self.store.clone();
        let registry = self.registry.clone();
        let media_id = media_id.clone();
        tokio::spawn(async move {
            wait_all_exited(&stopped.displaced).await;
            store.reclaim(&media_id).await;
            for held in &stopped.held {
                registry.release(held);
            }
        })
    }

    /// Snapshot of the running sessions.
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.registry.snapshot()
    }

    /// Kill every session and wait (bounded) for the encoders to exit.
    pub async fn shutdown(&self) {
        let sessions = self.registry.all();
        if sessions.is_empty() {
            return;
        }
        tracing::info!(sessions = sessions.len(), "Stopping all transcodes");
        for session in &sessions {
            self.supervisor.kill(session);
        }
        wait_all_exited(&sessions).await;
    }
}

async fn wait_all_exited(sessions: &[Arc<Session>]) {
    let exits = futures::future::join_all(sessions.iter().map(|s| s.wait_exited()));
    if tokio::time::timeout(KILL_GRACE, exits).await.is_err() {
        tracing::warn!("Encoders did not exit within {:?}", KILL_GRACE);
    }
}
