//! # Volume
//!
//! A volume is the set of tracks in one directory, treated as a single
//! logical store. It owns the `track_id -> Track` table, enumerates and
//! opens track files on startup, and exposes the three operations the
//! facade composes: a streaming [`VolumeWriter`], a streaming
//! [`VolumeReader`], and the cross-track delete trampoline.
//!
//! ## Directory Layout
//!
//! ```text
//! store_dir/
//! ├── index        # name index (owned by the index layer)
//! ├── 0.track
//! ├── 1.track
//! └── ...
//! ```
//!
//! Track ids are dense non-negative integers. A directory without an
//! `index` file is a fresh store and gets track 0 created up front; after
//! that, tracks come into existence only when a write stream crosses the
//! soft capacity bound of every existing track.
//!
//! ## Concurrency
//!
//! A volume is not internally synchronized. Callers keep single-writer /
//! single-reader discipline per volume; the streams borrow the volume
//! mutably for the duration of one object operation, which lets the borrow
//! checker enforce exactly that.

mod reader;
mod writer;

pub use reader::VolumeReader;
pub use writer::VolumeWriter;

use std::fs;
use std::sync::Arc;

use eyre::{Result, WrapErr};
use hashbrown::HashMap;
use tracing::debug;

use crate::config::{StoreOptions, INDEX_FILE_NAME, TRACK_FILE_EXTENSION};
use crate::error::StoreError;
use crate::storage::Track;

#[derive(Debug)]
pub struct Volume {
    options: Arc<StoreOptions>,
    tracks: HashMap<u16, Track>,
}

impl Volume {
    /// Opens the volume rooted at the options' directory, creating the
    /// directory and the initial track on first run.
    pub fn open(options: Arc<StoreOptions>) -> Result<Self> {
        fs::create_dir_all(&options.directory).wrap_err_with(|| {
            format!(
                "failed to create store directory '{}'",
                options.directory.display()
            )
        })?;

        let mut volume = Self {
            tracks: HashMap::new(),
            options,
        };

        // A missing index file marks a fresh store.
        if !volume.options.directory.join(INDEX_FILE_NAME).exists() {
            volume.create_track(0)?;
        }

        let mut ids = Vec::new();
        let entries = fs::read_dir(&volume.options.directory).wrap_err_with(|| {
            format!(
                "failed to read store directory '{}'",
                volume.options.directory.display()
            )
        })?;
        for entry in entries {
            let entry = entry.wrap_err("failed to read directory entry")?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TRACK_FILE_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u16>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        for id in ids {
            if !volume.tracks.contains_key(&id) {
                let track = Track::open(id, volume.options.clone())?;
                volume.tracks.insert(id, track);
            }
        }

        debug!(
            tracks = volume.tracks.len(),
            directory = %volume.options.directory.display(),
            "volume opened"
        );
        Ok(volume)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// True when the track file for `id` is open in this volume.
    pub fn has_track(&self, id: u16) -> bool {
        self.tracks.contains_key(&id)
    }

    pub(crate) fn track_mut(&mut self, id: u16) -> Result<&mut Track> {
        match self.tracks.get_mut(&id) {
            Some(track) => Ok(track),
            None => Err(StoreError::io(format!("track {} is not part of this volume", id)).into()),
        }
    }

    pub(crate) fn create_track(&mut self, id: u16) -> Result<()> {
        let track = Track::open(id, self.options.clone())?;
        self.tracks.insert(id, track);
        debug!(track = id, "track created");
        Ok(())
    }

    /// Returns the lowest track id at or after `start` that can accept one
    /// more chunk, creating the track when it does not exist yet.
    pub(crate) fn ensure_writable(&mut self, start: u16) -> Result<u16> {
        let chunk_size = self.options.chunk_size;
        let track_size = self.options.track_size;
        let mut id = start;

        loop {
            if !self.tracks.contains_key(&id) {
                self.create_track(id)?;
                return Ok(id);
            }
            let track = &self.tracks[&id];
            if track.size() + chunk_size > track_size {
                id += 1;
                continue;
            }
            return Ok(id);
        }
    }

    /// Opens a streaming writer. The returned writer borrows the volume
    /// exclusively until it is finished or aborted.
    pub fn writer(&mut self) -> VolumeWriter<'_> {
        VolumeWriter::new(self)
    }

    /// Opens a streaming reader over the chain starting at `head`.
    pub fn reader(&mut self, head: (u16, u64)) -> VolumeReader<'_> {
        VolumeReader::new(self, head)
    }

    /// Frees the chain starting at `(track, offset)`, following it across
    /// tracks until it terminates.
    pub fn remove(&mut self, track: u16, offset: u64) -> Result<()> {
        let mut cursor = (track, offset);
        loop {
            let track = self.track_mut(cursor.0)?;
            match track.remove(cursor.1)? {
                Some(next) => cursor = next,
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_options(dir: &std::path::Path) -> Arc<StoreOptions> {
        let mut options = StoreOptions::new(dir);
        options.chunk_size = 64;
        options.track_size = 256;
        Arc::new(options)
    }

    #[test]
    fn fresh_volume_creates_track_zero() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(small_options(dir.path())).unwrap();

        assert_eq!(volume.track_count(), 1);
        assert!(volume.has_track(0));
        assert!(dir.path().join("0.track").exists());
    }

    #[test]
    fn reopen_discovers_existing_tracks() {
        let dir = tempdir().unwrap();
        let options = small_options(dir.path());
        {
            let mut volume = Volume::open(options.clone()).unwrap();
            volume.create_track(1).unwrap();
            volume.create_track(2).unwrap();
        }
        // Mark the store as initialized so track 0 is not recreated blindly.
        std::fs::write(dir.path().join(INDEX_FILE_NAME), b"").unwrap();

        let volume = Volume::open(options).unwrap();
        assert_eq!(volume.track_count(), 3);
        for id in 0..3 {
            assert!(volume.has_track(id));
        }
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("junk.track"), b"").unwrap();

        let volume = Volume::open(small_options(dir.path())).unwrap();
        assert_eq!(volume.track_count(), 1);
    }

    #[test]
    fn ensure_writable_skips_full_tracks() {
        let dir = tempdir().unwrap();
        let mut volume = Volume::open(small_options(dir.path())).unwrap();

        // Fill track 0 to its three-chunk capacity.
        for _ in 0..3 {
            let offset = volume.track_mut(0).unwrap().alloc().unwrap();
            let chunk = crate::storage::Chunk {
                id: 0,
                valid: true,
                next_offset: 0,
                next_track: 0,
                payload: vec![1],
            };
            volume.track_mut(0).unwrap().write(&chunk, offset).unwrap();
        }

        let id = volume.ensure_writable(0).unwrap();
        assert_eq!(id, 1);
        assert!(volume.has_track(1));
    }

    #[test]
    fn remove_on_unknown_track_is_io_error() {
        let dir = tempdir().unwrap();
        let mut volume = Volume::open(small_options(dir.path())).unwrap();

        assert!(volume.remove(9, 16).is_err());
    }
}
