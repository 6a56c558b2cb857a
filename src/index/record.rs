//! # Index Record
//!
//! The 54-byte fixed-size record appended to the `index` file. Each record
//! maps the SHA-256 digest of an object name to the heads of its two chunk
//! chains: the payload chain and the (reserved) metadata chain.
//!
//! ## Record Layout (all integers big-endian)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -------------
//! 0       2     magic 0x9900
//! 2       32    key (SHA-256 of the object name)
//! 34      2     meta_track
//! 36      8     meta_offset
//! 44      2     chunk_track
//! 46      8     chunk_offset
//! ```
//!
//! A head with offset 0 means "no chain"; the metadata head is always
//! `(0, 0)` in the current format.

use eyre::{ensure, Result};
use zerocopy::big_endian::{U16, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{INDEX_KEY_SIZE, INDEX_MAGIC, INDEX_RECORD_SIZE};
use crate::error::StoreError;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IndexRecord {
    magic: U16,
    key: [u8; INDEX_KEY_SIZE],
    meta_track: U16,
    meta_offset: U64,
    chunk_track: U16,
    chunk_offset: U64,
}

const _: () = assert!(std::mem::size_of::<IndexRecord>() == INDEX_RECORD_SIZE as usize);

impl IndexRecord {
    pub fn new(
        key: [u8; INDEX_KEY_SIZE],
        meta_head: (u16, u64),
        chunk_head: (u16, u64),
    ) -> Self {
        Self {
            magic: U16::new(INDEX_MAGIC),
            key,
            meta_track: U16::new(meta_head.0),
            meta_offset: U64::new(meta_head.1),
            chunk_track: U16::new(chunk_head.0),
            chunk_offset: U64::new(chunk_head.1),
        }
    }

    /// Decodes one record, verifying length and magic.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= INDEX_RECORD_SIZE as usize,
            StoreError::corruption(format!(
                "buffer of {} bytes shorter than an index record",
                bytes.len()
            ))
        );

        let record = Self::ref_from_bytes(&bytes[..INDEX_RECORD_SIZE as usize])
            .map_err(|e| StoreError::corruption(format!("unreadable index record: {:?}", e)))?;

        ensure!(
            record.magic.get() == INDEX_MAGIC,
            StoreError::corruption(format!(
                "bad index record magic {:#06x}",
                record.magic.get()
            ))
        );

        Ok(record)
    }

    pub fn key(&self) -> &[u8; INDEX_KEY_SIZE] {
        &self.key
    }

    pub fn meta_head(&self) -> (u16, u64) {
        (self.meta_track.get(), self.meta_offset.get())
    }

    pub fn chunk_head(&self) -> (u16, u64) {
        (self.chunk_track.get(), self.chunk_offset.get())
    }
}
