//! # Store Builder
//!
//! Fluent configuration for opening a [`Store`]. Settings are chained and
//! validated once at `open()`; anything left unset falls back to the
//! defaults documented on [`StoreOptions`].
//!
//! ```ignore
//! let store = Store::builder()
//!     .directory("./media")
//!     .chunk_size(4096)
//!     .track_size(50 * 1024 * 1024 * 1024)
//!     .open()?;
//! ```

use std::path::{Path, PathBuf};

use eyre::Result;

use crate::config::StoreOptions;
use crate::store::Store;

pub struct StoreBuilder {
    directory: Option<PathBuf>,
    chunk_size: Option<u64>,
    track_size: Option<u64>,
    max_memory: Option<usize>,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            directory: None,
            chunk_size: None,
            track_size: None,
            max_memory: None,
        }
    }

    /// Root directory for the index and track files. Required.
    pub fn directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.directory = Some(path.as_ref().to_path_buf());
        self
    }

    /// Total bytes per chunk record (default 4096, minimum 64).
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    /// Soft capacity bound per track file (default 50 GiB).
    pub fn track_size(mut self, bytes: u64) -> Self {
        self.track_size = Some(bytes);
        self
    }

    /// Advisory memory budget for the index cache. Defaults to half of the
    /// host's available memory.
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Opens or creates the store with the configured settings.
    pub fn open(self) -> Result<Store> {
        let directory = self
            .directory
            .ok_or_else(|| eyre::eyre!("store directory not specified: call .directory() first"))?;

        let mut options = StoreOptions::new(directory);
        if let Some(chunk_size) = self.chunk_size {
            options.chunk_size = chunk_size;
        }
        if let Some(track_size) = self.track_size {
            options.track_size = track_size;
        }
        if let Some(max_memory) = self.max_memory {
            options.max_memory = max_memory;
        }

        Store::open(options)
    }
}
