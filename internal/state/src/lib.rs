//! Tag state for `colortag`.
//!
//! [`TagStore`] is the process-wide handle; the actual data lives in an
//! [`Index`], which is the only place the two halves of the file/color
//! relation are modified.

use std::{collections::BTreeSet, path::Path, sync::Arc};

use tokio::sync::{RwLock, RwLockReadGuard};

pub mod codec;

mod error;
pub use self::error::Error;

mod tag;
pub use self::tag::Index;

/// A string identifying a file: either an absolute path or one relative to the
/// configured root.
pub type FileId = String;

/// A color name or `#RRGGBB` literal. An empty color means "no tag".
pub type Color = String;

#[derive(Debug, Clone, Default)]
pub struct TagStore {
    index: Arc<RwLock<Index>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_index(index: Index) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
        }
    }

    /// Tags (or, with an empty `color`, untags) every ID in `ids`.
    ///
    /// The write lock is held for the whole batch, so readers see either none
    /// or all of the change.
    pub async fn set_color<I>(&self, ids: I, color: &str) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let changed = self.index.write().await.set_color(ids, color);
        log::trace!("set color {:?}: {} changed", color, changed);

        changed
    }

    pub async fn color_of(&self, id: &str) -> Option<Color> {
        self.index.read().await.color_of(id).map(String::from)
    }

    pub async fn ids_with_color(&self, color: &str) -> BTreeSet<FileId> {
        self.index.read().await.ids_with_color(color)
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// Borrows the index for a batch of lookups, such as a render pass.
    pub async fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().await
    }

    pub async fn snapshot(&self) -> Index {
        self.index.read().await.clone()
    }

    /// Populates the store from `path` if it is currently empty.
    ///
    /// Returns `Ok(true)` if tags were loaded, and `Ok(false)` if the store
    /// already had content or there was no saved index. On error the store is
    /// left untouched.
    ///
    /// The file is read without holding the lock; tags set while it is being
    /// read win over the loaded ones.
    pub async fn ensure_loaded(&self, path: &Path) -> Result<bool, Error> {
        if !self.is_empty().await {
            return Ok(false);
        }

        let loaded = match codec::load_path(path) {
            Ok(loaded) => loaded,
            Err(e) if e.is_not_found() => {
                log::debug!("no saved tags at {}", path.display());
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if !loaded.is_consistent() {
            log::warn!(
                "tag index at {} has mismatched color lists; using it as is",
                path.display()
            );
        }

        Ok(self.install(loaded, path).await)
    }

    async fn install(&self, loaded: Index, path: &Path) -> bool {
        let mut index = self.index.write().await;
        if !index.is_empty() {
            log::debug!(
                "tags were set while {} was loading; keeping them",
                path.display()
            );
            return false;
        }

        *index = loaded;
        true
    }

    /// Writes a snapshot of the store to `path`. An empty store is never
    /// written.
    pub async fn flush(&self, path: &Path) -> Result<bool, Error> {
        let index = self.snapshot().await;
        codec::save_path(&index, path)
    }
}
