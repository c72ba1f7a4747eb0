use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use medpulse_common::PublishedItem;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::stats::{AdminSnapshot, StoreStats};

pub const DEFAULT_CAP: usize = 50;

/// Ordered, capped collection of published items backed by one JSON file.
#[derive(Debug)]
pub struct NewsStore {
    path: PathBuf,
    cap: usize,
    items: Vec<PublishedItem>,
}

impl NewsStore {
    /// Load the store at `path`.
    ///
    /// A missing, empty or unparseable file yields an empty store; only
    /// failures to read the medium itself are errors. Treating a corrupt
    /// file as empty discards the dedup history it held, so previously
    /// published papers may be picked again on the next run. Items past
    /// `cap` are dropped, oldest first.
    pub async fn load(path: impl AsRef<Path>, cap: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cap = cap.max(1);
        let mut items = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => match serde_json::from_slice::<Vec<PublishedItem>>(&bytes) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Store file is corrupt, treating as empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No store file yet");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        if items.len() > cap {
            debug!(n = items.len(), cap, "Store file over cap, dropping oldest");
            items.truncate(cap);
        }

        info!(path = %path.display(), n = items.len(), cap, "Store loaded");
        Ok(Self { path, cap, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Items, most recent first.
    pub fn items(&self) -> &[PublishedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    /// Canonical keys of every stored item's external refs.
    pub fn existing_keys(&self) -> HashSet<String> {
        self.items
            .iter()
            .flat_map(PublishedItem::keys)
            .map(String::from)
            .collect()
    }

    /// A fresh item id not used by any stored item.
    pub fn next_id(&self) -> String {
        loop {
            let id = PublishedItem::generate_id();
            if !self.contains_id(&id) {
                return id;
            }
        }
    }

    /// Prepend `item`, evict the oldest beyond the cap, and rewrite the file.
    pub async fn append(&mut self, item: PublishedItem) -> Result<()> {
        debug!(id = %item.id, "Appending item to store");
        self.items.insert(0, item);
        if self.items.len() > self.cap {
            let evicted = self.items.len() - self.cap;
            self.items.truncate(self.cap);
            debug!(evicted, "Evicted oldest items over cap");
        }
        self.persist().await
    }

    /// Remove the item with `id`. Returns it if found; the file is only
    /// rewritten when something was removed.
    pub async fn delete(&mut self, id: &str) -> Result<Option<PublishedItem>> {
        let Some(pos) = self.items.iter().position(|i| i.id == id) else {
            return Ok(None);
        };
        let removed = self.items.remove(pos);
        self.persist().await?;
        info!(id, remaining = self.items.len(), "Item deleted");
        Ok(Some(removed))
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats::from_items(&self.items)
    }

    pub fn snapshot(&self) -> AdminSnapshot<'_> {
        AdminSnapshot::new(&self.items)
    }

    /// Whole-file rewrite through a temp file in the same directory, so a
    /// crash mid-write leaves the previous file intact.
    async fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let keep = self.items.len().min(self.cap);
        let bytes = serde_json::to_vec_pretty(&self.items[..keep])?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!(path = %self.path.display(), n = keep, "Store persisted");
        Ok(())
    }
}
