//! # Positional File Handle
//!
//! Thin wrapper over `std::fs::File` exposing the access pattern the upper
//! layers are written against: positional reads that report partial results,
//! and writes that always complete in full. The track and index layers treat
//! every `write` as a transactional unit over a fixed region; a partial
//! write would leave a torn linked-list pointer on disk, so the handle never
//! returns until the buffer is fully written or the device has failed.
//!
//! The handle owns its descriptor for its lifetime and tracks the file
//! length itself; `append` is a write at the tracked end, which under the
//! single-writer discipline of a volume is the only writer of that region.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::Result;

use crate::error::StoreError;

#[derive(Debug)]
pub struct StoreFile {
    file: File,
    size: u64,
}

impl StoreFile {
    /// Opens the file at `path`, creating it when absent.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::io(format!("failed to open {:?}: {}", path, e)))?;

        let size = file
            .metadata()
            .map_err(|e| StoreError::io(format!("failed to stat {:?}: {}", path, e)))?
            .len();

        Ok(Self { file, size })
    }

    /// Current file length in bytes, as tracked by this handle.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// File length reported by the filesystem. Differs from [`Self::size`]
    /// only when another handle has grown the file.
    pub fn stat_size(&self) -> Result<u64> {
        let len = self
            .file
            .metadata()
            .map_err(|e| StoreError::io(format!("stat failed: {}", e)))?
            .len();
        Ok(len)
    }

    /// Single positional read. Returns the number of bytes read; `0` means
    /// end of file. A short count is a valid result, not an error.
    pub fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| StoreError::io(format!("seek to {} failed: {}", offset, e)))?;

        let count = self
            .file
            .read(buf)
            .map_err(|e| StoreError::io(format!("read at {} failed: {}", offset, e)))?;

        Ok(count)
    }

    /// Positional write that completes fully or fails.
    pub fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| StoreError::io(format!("seek to {} failed: {}", offset, e)))?;

        self.file
            .write_all(buf)
            .map_err(|e| StoreError::io(format!("write at {} failed: {}", offset, e)))?;

        self.size = self.size.max(offset + buf.len() as u64);
        Ok(())
    }

    /// Writes `buf` at the current end of file; returns the offset written.
    pub fn append(&mut self, buf: &[u8]) -> Result<u64> {
        let offset = self.size;
        self.write(buf, offset)?;
        Ok(offset)
    }

    /// Flushes file data and metadata to the device.
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| StoreError::io(format!("sync failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_scratch(name: &str) -> (tempfile::TempDir, StoreFile) {
        let dir = tempdir().unwrap();
        let file = StoreFile::open(&dir.path().join(name)).unwrap();
        (dir, file)
    }

    #[test]
    fn new_file_has_zero_size() {
        let (_dir, file) = open_scratch("a.bin");
        assert_eq!(file.size(), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, mut file) = open_scratch("a.bin");
        file.write(b"hello track", 0).unwrap();

        let mut buf = [0u8; 11];
        let n = file.read(&mut buf, 0).unwrap();

        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello track");
    }

    #[test]
    fn read_past_end_returns_zero() {
        let (_dir, mut file) = open_scratch("a.bin");
        file.write(b"xy", 0).unwrap();

        let mut buf = [0u8; 8];
        let n = file.read(&mut buf, 100).unwrap();

        assert_eq!(n, 0);
    }

    #[test]
    fn read_reports_partial_count_at_tail() {
        let (_dir, mut file) = open_scratch("a.bin");
        file.write(b"abcd", 0).unwrap();

        let mut buf = [0u8; 8];
        let n = file.read(&mut buf, 2).unwrap();

        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"cd");
    }

    #[test]
    fn write_beyond_end_grows_size() {
        let (_dir, mut file) = open_scratch("a.bin");
        file.write(&[7u8; 4], 100).unwrap();
        assert_eq!(file.size(), 104);
    }

    #[test]
    fn append_returns_previous_end() {
        let (_dir, mut file) = open_scratch("a.bin");
        file.write(&[1u8; 10], 0).unwrap();

        let offset = file.append(&[2u8; 5]).unwrap();

        assert_eq!(offset, 10);
        assert_eq!(file.size(), 15);
    }

    #[test]
    fn size_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        {
            let mut file = StoreFile::open(&path).unwrap();
            file.write(&[0u8; 64], 0).unwrap();
        }

        let file = StoreFile::open(&path).unwrap();
        assert_eq!(file.size(), 64);
    }
}
