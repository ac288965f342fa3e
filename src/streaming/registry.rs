//! In-flight transcoding sessions.
//!
//! A [`Session`] is one encoder run for one [`StreamKey`]. Its readiness is a
//! `watch` channel written once by whoever supervises the process and read by
//! every request that joined the session, so the originator and the joiners
//! observe exactly the same outcome.
//!
//! The [`SessionRegistry`] is the single source of truth for "is a process
//! running for this key". The acquire-or-join decision goes through the
//! `DashMap` entry API, which holds the shard lock for the whole decision.
//! A stopped or failed session keeps its key until it is released, so a new
//! generation never starts while the previous encoder may still be writing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cactustv_common::{Error, MediaId, Result, StreamKey};

/// Reason recorded when a session is stopped before its manifest appeared.
pub const KILLED_REASON: &str = "stream was stopped";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The encoder is running but no manifest exists yet.
    Pending,
    /// The manifest exists. Final.
    Ready,
    /// The encoder ended before producing a manifest. Final.
    Failed(String),
}

/// One active transcode.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    key: StreamKey,
    output_dir: PathBuf,
    created_at: DateTime<Utc>,
    readiness: watch::Sender<Readiness>,
    kill: CancellationToken,
    exited: CancellationToken,
    released: CancellationToken,
}

impl Session {
    pub fn new(key: StreamKey, output_dir: impl Into<PathBuf>) -> Self {
        let (readiness, _) = watch::channel(Readiness::Pending);
        Self {
            id: Uuid::new_v4(),
            key,
            output_dir: output_dir.into(),
            created_at: Utc::now(),
            readiness,
            kill: CancellationToken::new(),
            exited: CancellationToken::new(),
            released: CancellationToken::new(),
        }
    }

    /// A session that is already stopped. Holds a key while its media is
    /// being reclaimed.
    fn stopped(key: StreamKey, output_dir: impl Into<PathBuf>) -> Self {
        let session = Self::new(key, output_dir);
        session.request_kill();
        session.mark_failed(KILLED_REASON);
        session.mark_exited();
        session
    }

    /// Generation id, unique per session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.readiness.borrow(), Readiness::Ready)
    }

    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Move `Pending -> Ready`. Returns false if the state was already final.
    pub fn mark_ready(&self) -> bool {
        self.resolve(Readiness::Ready)
    }

    /// Move `Pending -> Failed`. Returns false if the state was already final.
    pub fn mark_failed(&self, reason: impl Into<String>) -> bool {
        self.resolve(Readiness::Failed(reason.into()))
    }

    fn resolve(&self, outcome: Readiness) -> bool {
        self.readiness.send_if_modified(|state| {
            if *state == Readiness::Pending {
                *state = outcome;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the session is ready.
    ///
    /// Fails with `EncodeFailed` when the encoder ended first or the session
    /// was killed while still pending. Not bounded; callers apply their own
    /// timeout.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.subscribe();
        let outcome = tokio::select! {
            biased;
            state = rx.wait_for(|s| *s != Readiness::Pending) => {
                state.map(|s| (*s).clone()).map_err(|_| {
                    Error::internal(format!("readiness channel closed for {}", self.key))
                })?
            }
            _ = self.kill.cancelled() => Readiness::Failed(KILLED_REASON.to_string()),
        };

        match outcome {
            Readiness::Ready => Ok(()),
            Readiness::Failed(reason) => Err(Error::encode_failed(&self.key, reason)),
            Readiness::Pending => Err(Error::internal("readiness resolved to pending")),
        }
    }

    /// Ask whoever runs the encoder to stop it.
    pub fn request_kill(&self) {
        self.kill.cancel();
    }

    pub fn is_killed(&self) -> bool {
        self.kill.is_cancelled()
    }

    /// Resolves once [`Session::request_kill`] has been called.
    pub async fn killed(&self) {
        self.kill.cancelled().await
    }

    /// Record that the encoder process is gone.
    pub fn mark_exited(&self) {
        self.exited.cancel();
    }

    pub fn has_exited(&self) -> bool {
        self.exited.is_cancelled()
    }

    pub async fn wait_exited(&self) {
        self.exited.cancelled().await
    }

    /// Whether a new request may join this session. Killed and failed
    /// sessions cannot be joined and hold their key until released.
    pub fn is_joinable(&self) -> bool {
        !self.is_killed() && !matches!(*self.readiness.borrow(), Readiness::Failed(_))
    }

    fn mark_released(&self) {
        self.released.cancel();
    }

    /// Whether the registry has dropped this session.
    pub fn is_released(&self) -> bool {
        self.released.is_cancelled()
    }

    /// Resolves once the registry has dropped this session.
    pub async fn wait_released(&self) {
        self.released.cancelled().await
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id,
            media_id: self.key.media_id.clone(),
            quality: self.key.quality.clone(),
            started_at: self.created_at,
            ready: self.is_ready(),
        }
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub media_id: MediaId,
    pub quality: String,
    pub started_at: DateTime<Utc>,
    pub ready: bool,
}

/// Result of [`SessionRegistry::try_acquire`].
#[derive(Debug, Clone)]
pub enum Acquired {
    /// Registered a new session; the caller must start it. Exactly one
    /// caller per session sees this.
    Started(Arc<Session>),
    /// Joined the live session for the key.
    Joined(Arc<Session>),
    /// The key is held by a stopped or failed session that has not been
    /// released yet. Wait for [`Session::wait_released`] and try again.
    Draining(Arc<Session>),
}

impl Acquired {
    pub fn session(&self) -> &Arc<Session> {
        match self {
            Acquired::Started(s) | Acquired::Joined(s) | Acquired::Draining(s) => s,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Acquired::Started(_))
    }
}

/// Sessions touched by [`SessionRegistry::stop_media`].
#[derive(Debug, Default)]
pub struct StoppedMedia {
    /// Live sessions that were killed; their encoders must be stopped.
    pub killed: Vec<Arc<Session>>,
    /// Every session that was displaced, live or not. Their encoders may
    /// still be running.
    pub displaced: Vec<Arc<Session>>,
    /// Stopped placeholders now holding the keys. Release them once the
    /// media directory is reclaimed.
    pub held: Vec<Arc<Session>>,
}

/// Thread-safe map of active sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<StreamKey, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the live session for `key`, or register a new one.
    ///
    /// A registered session that was killed or has failed is neither joined
    /// nor replaced: the key stays held until that session is released.
    pub fn try_acquire(&self, key: StreamKey, output_dir: impl Into<PathBuf>) -> Acquired {
        match self.sessions.entry(key) {
            Entry::Occupied(e) => {
                let session = e.get().clone();
                if session.is_joinable() {
                    Acquired::Joined(session)
                } else {
                    Acquired::Draining(session)
                }
            }
            Entry::Vacant(e) => {
                let session = Arc::new(Session::new(e.key().clone(), output_dir));
                e.insert(session.clone());
                Acquired::Started(session)
            }
        }
    }

    /// Stop every given quality of `media_id` and hold the keys.
    ///
    /// Each key is taken over by a stopped placeholder, so nothing can start
    /// for the media until the caller releases [`StoppedMedia::held`]. The
    /// displaced sessions are killed if still live and count as released.
    pub fn stop_media<'a>(
        &self,
        media_id: &MediaId,
        qualities: impl IntoIterator<Item = &'a str>,
        output_dir: impl Fn(&StreamKey) -> PathBuf,
    ) -> StoppedMedia {
        let mut stopped = StoppedMedia::default();
        for quality in qualities {
            let key = StreamKey::new(media_id.clone(), quality);
            let placeholder = Arc::new(Session::stopped(key.clone(), output_dir(&key)));
            match self.sessions.entry(key) {
                Entry::Occupied(mut e) => {
                    let old = e.insert(placeholder.clone());
                    if old.is_joinable() {
                        old.request_kill();
                        stopped.killed.push(old.clone());
                    }
                    old.mark_released();
                    stopped.displaced.push(old);
                }
                Entry::Vacant(e) => {
                    e.insert(placeholder.clone());
                }
            }
            stopped.held.push(placeholder);
        }
        stopped
    }

    /// Remove `session` if it is still the registered generation for its key.
    pub fn release(&self, session: &Session) -> bool {
        let removed = self
            .sessions
            .remove_if(session.key(), |_, current| current.id() == session.id())
            .is_some();
        if removed {
            session.mark_released();
            tracing::debug!(
                media_id = %session.key().media_id,
                quality = %session.key().quality,
                session_id = %session.id(),
                "Session released"
            );
        }
        removed
    }

    pub fn find(&self, key: &StreamKey) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Snapshot of the joinable sessions, oldest first.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .iter()
            .filter(|e| e.value().is_joinable())
            .map(|e| e.value().info())
            .collect();
        infos.sort_by_key(|i| i.started_at);
        infos
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
