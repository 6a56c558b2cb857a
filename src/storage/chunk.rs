//! # Chunk Record Codec
//!
//! Every chunk is a fixed-size record: a 17-byte linkage header followed by
//! payload, zero-padded to the configured chunk size. Objects are chains of
//! chunks threaded through the `next_offset` / `next_track` link fields.
//!
//! ## Record Layout (all integers big-endian)
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  ----------------------------------------
//! 0       4     id           position in the owning object's chain
//! 4       1     valid        1 = live, 0 = freed
//! 5       2     payload_len  payload bytes; 0 means "full chunk"
//! 7       8     next_offset  byte offset of successor; 0 = none
//! 15      2     next_track   track id of successor
//! 17      C-17  payload      user bytes, zero-padded to the chunk size
//! ```
//!
//! ## The payload_len Sentinel
//!
//! A full chunk stores `payload_len = 0` rather than the capacity itself,
//! which keeps the field in two bytes for any chunk size up to 64 KiB + 17.
//! The consequence is that a zero-length payload has no encoding; the volume
//! layer represents empty objects without writing a chunk at all.
//!
//! ## Lazy Decode
//!
//! Free-list pops and delete traversals only need the link fields, so the
//! codec offers [`ChunkCodec::decode_link`], which touches the ten bytes at
//! offset 7 and skips the payload entirely.

use eyre::{ensure, Result};
use zerocopy::big_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{CHUNK_HEADER_SIZE, CHUNK_NEXT_OFFSET};
use crate::config::StoreOptions;
use crate::error::StoreError;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct ChunkHeader {
    id: U32,
    valid: u8,
    payload_len: U16,
    next_offset: U64,
    next_track: U16,
}

const _: () = assert!(std::mem::size_of::<ChunkHeader>() == CHUNK_HEADER_SIZE);

/// One decoded chunk record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: u32,
    pub valid: bool,
    pub next_offset: u64,
    pub next_track: u16,
    pub payload: Vec<u8>,
}

impl Chunk {
    /// Location of the successor chunk, `None` at the end of the chain.
    /// Offset 0 is always track header, which makes it a safe sentinel.
    pub fn next(&self) -> Option<(u16, u64)> {
        if self.next_offset == 0 {
            None
        } else {
            Some((self.next_track, self.next_offset))
        }
    }
}

/// Link fields of a chunk, extracted without decoding the payload.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLink {
    pub next_offset: u64,
    pub next_track: u16,
}

/// Encoder/decoder for one chunk geometry.
#[derive(Debug, Clone)]
pub struct ChunkCodec {
    chunk_size: usize,
    payload_size: usize,
}

impl ChunkCodec {
    pub fn new(options: &StoreOptions) -> Self {
        Self {
            chunk_size: options.chunk_size as usize,
            payload_size: options.payload_size() as usize,
        }
    }

    /// Usable payload bytes per chunk.
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Encodes `chunk` into `buf`, which must be exactly one chunk long.
    /// The payload must be non-empty: a zero length would collide with the
    /// full-chunk sentinel.
    pub fn encode(&self, chunk: &Chunk, buf: &mut [u8]) -> Result<()> {
        ensure!(
            buf.len() == self.chunk_size,
            "encode buffer is {} bytes, chunk size is {}",
            buf.len(),
            self.chunk_size
        );
        ensure!(
            !chunk.payload.is_empty() && chunk.payload.len() <= self.payload_size,
            "payload of {} bytes outside 1..={}",
            chunk.payload.len(),
            self.payload_size
        );

        let stored_len = if chunk.payload.len() == self.payload_size {
            0
        } else {
            chunk.payload.len() as u16
        };

        let header = ChunkHeader {
            id: U32::new(chunk.id),
            valid: chunk.valid as u8,
            payload_len: U16::new(stored_len),
            next_offset: U64::new(chunk.next_offset),
            next_track: U16::new(chunk.next_track),
        };

        buf[..CHUNK_HEADER_SIZE].copy_from_slice(header.as_bytes());
        let payload_end = CHUNK_HEADER_SIZE + chunk.payload.len();
        buf[CHUNK_HEADER_SIZE..payload_end].copy_from_slice(&chunk.payload);
        buf[payload_end..].fill(0);

        Ok(())
    }

    /// Full decode of one chunk record.
    pub fn decode(&self, buf: &[u8]) -> Result<Chunk> {
        ensure!(
            buf.len() == self.chunk_size,
            "decode buffer is {} bytes, chunk size is {}",
            buf.len(),
            self.chunk_size
        );

        let header = ChunkHeader::ref_from_bytes(&buf[..CHUNK_HEADER_SIZE])
            .map_err(|e| StoreError::corruption(format!("unreadable chunk header: {:?}", e)))?;

        let stored_len = header.payload_len.get() as usize;
        let payload_len = if stored_len == 0 {
            self.payload_size
        } else {
            stored_len
        };
        if payload_len > self.payload_size {
            return Err(StoreError::corruption(format!(
                "payload_len {} exceeds chunk capacity {}",
                payload_len, self.payload_size
            ))
            .into());
        }

        Ok(Chunk {
            id: header.id.get(),
            valid: header.valid == 1,
            next_offset: header.next_offset.get(),
            next_track: header.next_track.get(),
            payload: buf[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + payload_len].to_vec(),
        })
    }

    /// Lazy decode: only the link fields, from any buffer that covers the
    /// linkage region.
    pub fn decode_link(&self, buf: &[u8]) -> Result<ChunkLink> {
        ensure!(
            buf.len() >= CHUNK_HEADER_SIZE,
            "link buffer of {} bytes shorter than chunk header",
            buf.len()
        );

        let start = CHUNK_NEXT_OFFSET as usize;
        let next_offset = U64::ref_from_bytes(&buf[start..start + 8])
            .map_err(|e| StoreError::corruption(format!("unreadable chunk link: {:?}", e)))?
            .get();
        let next_track = U16::ref_from_bytes(&buf[start + 8..start + 10])
            .map_err(|e| StoreError::corruption(format!("unreadable chunk link: {:?}", e)))?
            .get();

        Ok(ChunkLink {
            next_offset,
            next_track,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> ChunkCodec {
        let mut options = StoreOptions::new("/tmp/unused");
        options.chunk_size = 64;
        options.track_size = 256;
        ChunkCodec::new(&options)
    }

    #[test]
    fn header_is_seventeen_bytes() {
        assert_eq!(std::mem::size_of::<ChunkHeader>(), 17);
    }

    #[test]
    fn encode_decode_round_trips() {
        let codec = codec();
        let chunk = Chunk {
            id: 3,
            valid: true,
            next_offset: 144,
            next_track: 2,
            payload: b"some payload".to_vec(),
        };

        let mut buf = vec![0u8; 64];
        codec.encode(&chunk, &mut buf).unwrap();
        let decoded = codec.decode(&buf).unwrap();

        assert_eq!(decoded, chunk);
    }

    #[test]
    fn full_payload_uses_zero_sentinel() {
        let codec = codec();
        let chunk = Chunk {
            id: 0,
            valid: true,
            next_offset: 0,
            next_track: 0,
            payload: vec![0xAB; codec.payload_size()],
        };

        let mut buf = vec![0u8; 64];
        codec.encode(&chunk, &mut buf).unwrap();

        // payload_len field lives at bytes 5..7
        assert_eq!(&buf[5..7], &[0, 0]);

        let decoded = codec.decode(&buf).unwrap();
        assert_eq!(decoded.payload.len(), codec.payload_size());
        assert_eq!(decoded.payload, chunk.payload);
    }

    #[test]
    fn fields_are_big_endian_on_disk() {
        let codec = codec();
        let chunk = Chunk {
            id: 0x0102_0304,
            valid: true,
            next_offset: 0x0506,
            next_track: 0x0708,
            payload: vec![1],
        };

        let mut buf = vec![0u8; 64];
        codec.encode(&chunk, &mut buf).unwrap();

        assert_eq!(&buf[0..4], &[1, 2, 3, 4]);
        assert_eq!(buf[4], 1);
        assert_eq!(&buf[5..7], &[0, 1]);
        assert_eq!(&buf[7..15], &[0, 0, 0, 0, 0, 0, 5, 6]);
        assert_eq!(&buf[15..17], &[7, 8]);
    }

    #[test]
    fn lazy_decode_extracts_links_only() {
        let codec = codec();
        let chunk = Chunk {
            id: 9,
            valid: false,
            next_offset: 208,
            next_track: 5,
            payload: vec![2; 10],
        };

        let mut buf = vec![0u8; 64];
        codec.encode(&chunk, &mut buf).unwrap();
        let link = codec.decode_link(&buf[..CHUNK_HEADER_SIZE]).unwrap();

        assert_eq!(link.next_offset, 208);
        assert_eq!(link.next_track, 5);
    }

    #[test]
    fn next_is_none_at_chain_end() {
        let end = Chunk {
            id: 0,
            valid: true,
            next_offset: 0,
            next_track: 7,
            payload: vec![1],
        };
        assert_eq!(end.next(), None);

        let mid = Chunk {
            next_offset: 80,
            ..end
        };
        assert_eq!(mid.next(), Some((7, 80)));
    }

    #[test]
    fn encode_rejects_empty_payload() {
        let codec = codec();
        let chunk = Chunk {
            id: 0,
            valid: true,
            next_offset: 0,
            next_track: 0,
            payload: Vec::new(),
        };

        let mut buf = vec![0u8; 64];
        assert!(codec.encode(&chunk, &mut buf).is_err());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let codec = codec();
        let chunk = Chunk {
            id: 0,
            valid: true,
            next_offset: 0,
            next_track: 0,
            payload: vec![0; codec.payload_size() + 1],
        };

        let mut buf = vec![0u8; 64];
        assert!(codec.encode(&chunk, &mut buf).is_err());
    }

    #[test]
    fn decode_rejects_corrupt_payload_len() {
        let codec = codec();
        let mut buf = vec![0u8; 64];
        // payload_len = 60 > capacity 47
        buf[5..7].copy_from_slice(&60u16.to_be_bytes());

        assert!(codec.decode(&buf).is_err());
    }
}
