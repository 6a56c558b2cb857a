//! Store configuration: layout constants and validated open options.

mod constants;

pub use constants::{
    CACHE_ENTRY_COST, CHUNK_HEADER_SIZE, CHUNK_NEXT_OFFSET, CHUNK_VALID_OFFSET,
    DEFAULT_BUDGET_DIVISOR, DEFAULT_CHUNK_SIZE, DEFAULT_TRACK_SIZE, INDEX_FILE_NAME, INDEX_KEY_SIZE,
    INDEX_MAGIC, INDEX_RECORD_SIZE, MIN_BUDGET_FLOOR, MIN_CHUNK_SIZE, TRACK_FILE_EXTENSION,
    TRACK_HEADER_SIZE,
};

use std::path::{Path, PathBuf};

use eyre::{ensure, Result};

/// Options for opening a [`crate::Store`].
///
/// All numeric options are validated by [`StoreOptions::validate`], which is
/// called on every open. The derived accessors (`payload_size`,
/// `chunk_capacity`, `track_limit`) are the single source of the layout
/// arithmetic used by the track and volume layers.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Root directory holding the `index` file and the `<id>.track` files.
    pub directory: PathBuf,
    /// Total bytes per chunk record, header included.
    pub chunk_size: u64,
    /// Soft capacity bound per track file in bytes.
    pub track_size: u64,
    /// Advisory memory budget for the index cache, in bytes.
    /// Zero selects auto-detection (half of available host memory).
    pub max_memory: usize,
}

impl StoreOptions {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            track_size: DEFAULT_TRACK_SIZE,
            max_memory: 0,
        }
    }

    /// Usable payload bytes per chunk.
    pub fn payload_size(&self) -> u64 {
        self.chunk_size - CHUNK_HEADER_SIZE as u64
    }

    /// Number of whole chunks a track can hold under the soft bound.
    pub fn chunk_capacity(&self) -> u64 {
        (self.track_size - TRACK_HEADER_SIZE) / self.chunk_size
    }

    /// First byte offset past the last legal chunk slot.
    ///
    /// The track size need not be a multiple of the chunk size, so this is
    /// the bound traversals check offsets against, not `track_size` itself.
    pub fn track_limit(&self) -> u64 {
        TRACK_HEADER_SIZE + self.chunk_capacity() * self.chunk_size
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.chunk_size >= MIN_CHUNK_SIZE,
            "chunk_size {} below minimum {}",
            self.chunk_size,
            MIN_CHUNK_SIZE
        );
        ensure!(
            self.chunk_size > CHUNK_HEADER_SIZE as u64,
            "chunk_size {} leaves no payload capacity",
            self.chunk_size
        );
        ensure!(
            self.track_size >= TRACK_HEADER_SIZE + self.chunk_size,
            "track_size {} cannot hold a single chunk of {} bytes",
            self.track_size,
            self.chunk_size
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = StoreOptions::new("/tmp/store");
        assert!(options.validate().is_ok());
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(options.track_size, DEFAULT_TRACK_SIZE);
    }

    #[test]
    fn payload_size_subtracts_header() {
        let options = StoreOptions::new("/tmp/store");
        assert_eq!(options.payload_size(), 4096 - 17);
    }

    #[test]
    fn chunk_capacity_ignores_partial_tail() {
        let mut options = StoreOptions::new("/tmp/store");
        options.chunk_size = 64;
        options.track_size = 256;
        // 240 usable bytes hold three 64-byte chunks; the 48-byte tail is dead.
        assert_eq!(options.chunk_capacity(), 3);
        assert_eq!(options.track_limit(), 16 + 3 * 64);
    }

    #[test]
    fn rejects_undersized_chunk() {
        let mut options = StoreOptions::new("/tmp/store");
        options.chunk_size = 32;
        assert!(options.validate().is_err());
    }

    #[test]
    fn rejects_track_smaller_than_one_chunk() {
        let mut options = StoreOptions::new("/tmp/store");
        options.chunk_size = 64;
        options.track_size = 64;
        assert!(options.validate().is_err());
    }
}
