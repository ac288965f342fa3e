//! Media catalog lookups.
//!
//! The streaming engine only ever reads the catalog: it needs the source path
//! and title for a media id. [`JsonCatalog`] reads the library document
//! written by the scanner, [`MemoryCatalog`] is an in-process map.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use cactustv_common::{MediaId, MediaItem, Result};

/// Read-only source of [`MediaItem`]s.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve a media id. `Ok(None)` means the id is unknown.
    async fn lookup(&self, id: &MediaId) -> Result<Option<MediaItem>>;

    /// Every playable item in the library.
    async fn list(&self) -> Result<Vec<MediaItem>>;
}

// ---------------------------------------------------------------------------
// JsonCatalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct LibraryDocument {
    #[serde(default)]
    media: Vec<LibraryEntry>,
}

/// One record of the library document. Shows carry their episodes inline and
/// have no file of their own.
#[derive(Debug, Deserialize)]
struct LibraryEntry {
    id: String,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    episodes: Vec<LibraryEntry>,
}

impl LibraryEntry {
    fn to_item(&self) -> Option<MediaItem> {
        let path = self.path.clone()?;
        let id = MediaId::parse(self.id.as_str()).ok()?;
        Some(MediaItem {
            id,
            path,
            title: self.title.clone(),
            duration: self.duration,
        })
    }

    fn find(&self, id: &str) -> Option<&LibraryEntry> {
        if self.id == id {
            return Some(self);
        }
        self.episodes.iter().find(|e| e.id == id)
    }
}

/// Catalog backed by the scanner's JSON library file.
///
/// The file is re-read on every call so a rescan is visible without a
/// restart. A missing file is an empty library.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<LibraryDocument> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LibraryDocument::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| {
            cactustv_common::Error::internal(format!(
                "invalid library file {}: {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl Catalog for JsonCatalog {
    async fn lookup(&self, id: &MediaId) -> Result<Option<MediaItem>> {
        let doc = self.read().await?;
        Ok(doc
            .media
            .iter()
            .find_map(|entry| entry.find(id.as_str()))
            .and_then(LibraryEntry::to_item))
    }

    async fn list(&self) -> Result<Vec<MediaItem>> {
        let doc = self.read().await?;
        Ok(doc
            .media
            .iter()
            .flat_map(|entry| std::iter::once(entry).chain(entry.episodes.iter()))
            .filter_map(LibraryEntry::to_item)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryCatalog
// ---------------------------------------------------------------------------

/// In-memory catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: DashMap<MediaId, MediaItem>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item.
    pub fn insert(&self, item: MediaItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn remove(&self, id: &MediaId) -> Option<MediaItem> {
        self.items.remove(id).map(|(_, item)| item)
    }
}

impl FromIterator<MediaItem> for MemoryCatalog {
    fn from_iter<I: IntoIterator<Item = MediaItem>>(iter: I) -> Self {
        let catalog = Self::new();
        for item in iter {
            catalog.insert(item);
        }
        catalog
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn lookup(&self, id: &MediaId) -> Result<Option<MediaItem>> {
        Ok(self.items.get(id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<MediaItem>> {
        let mut items: Vec<MediaItem> = self.items.iter().map(|e| e.value().clone()).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}
