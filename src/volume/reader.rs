//! # Read Stream
//!
//! Pull-based state machine over one object's chunk chain. Each call to
//! [`VolumeReader::next_chunk`] decodes the chunk under the cursor, emits
//! its payload and advances the cursor along `(next_track, next_offset)`.
//! The terminal chunk (link offset 0) still yields its payload once; the
//! following pull reports end of stream. Back-pressure is the caller's
//! synchronous loop.

use eyre::Result;
use tracing::error;

use crate::error::StoreError;
use crate::volume::Volume;

pub struct VolumeReader<'a> {
    volume: &'a mut Volume,
    cursor: Option<(u16, u64)>,
    next_id: u32,
}

impl<'a> VolumeReader<'a> {
    /// A head with offset 0 is the "no chain" sentinel: the stream is
    /// exhausted immediately (empty objects are stored without chunks).
    pub(crate) fn new(volume: &'a mut Volume, head: (u16, u64)) -> Self {
        let cursor = if head.1 == 0 { None } else { Some(head) };
        Self {
            volume,
            cursor,
            next_id: 0,
        }
    }

    /// Returns the next payload, or `None` once the chain is exhausted.
    ///
    /// A freed chunk or an out-of-sequence chain id under the cursor means
    /// the chain is broken; both surface as an I/O error with the offending
    /// location logged.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let (track_id, offset) = match self.cursor {
            Some(cursor) => cursor,
            None => return Ok(None),
        };

        let chunk = self.volume.track_mut(track_id)?.read(offset)?;

        if !chunk.valid {
            error!(track = track_id, offset, "chain points at freed chunk");
            return Err(StoreError::io(format!(
                "chain broken on track {} at offset {}",
                track_id, offset
            ))
            .into());
        }
        if chunk.id != self.next_id {
            error!(
                track = track_id,
                offset,
                expected = self.next_id,
                found = chunk.id,
                "chain id out of sequence"
            );
            return Err(StoreError::io(format!(
                "chain broken on track {} at offset {}",
                track_id, offset
            ))
            .into());
        }

        self.next_id += 1;
        self.cursor = chunk.next();
        Ok(Some(chunk.payload))
    }
}
