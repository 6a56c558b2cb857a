//! # Write Stream
//!
//! Push-based state machine that cuts an incoming byte stream into chunks
//! and chains them across tracks. Linked-list writes are deferred by one
//! chunk: a chunk can only be written once its successor's location is
//! known, so the most recent chunk stays staged in memory until the next
//! allocation (or the end of the stream, which writes it with a zero link).
//!
//! ## Track Selection
//!
//! Each staged chunk asks the volume for the lowest writable track at or
//! after the writer's cursor. The cursor never moves backwards within one
//! stream, so a chain occupies an ascending run of tracks and the usual
//! case stays append-only on a single track.
//!
//! ## Close Protocol
//!
//! [`VolumeWriter::finish`] flushes the residual buffer as a final short
//! chunk, writes the staged terminal chunk, and persists the header of
//! every touched track. [`VolumeWriter::abort`] persists the headers but
//! indexes nothing; chunks already written stay valid-but-unreferenced
//! until a compaction pass reclaims them, which bounds the damage of a
//! cancelled stream to the half-object.

use eyre::Result;
use hashbrown::HashSet;

use crate::storage::Chunk;
use crate::volume::Volume;

struct Staged {
    id: u32,
    track: u16,
    offset: u64,
    payload: Vec<u8>,
}

pub struct VolumeWriter<'a> {
    volume: &'a mut Volume,
    buffer: Vec<u8>,
    write_set: HashSet<u16>,
    staged: Option<Staged>,
    head: Option<(u16, u64)>,
    track_cursor: u16,
    next_id: u32,
}

impl<'a> VolumeWriter<'a> {
    pub(crate) fn new(volume: &'a mut Volume) -> Self {
        Self {
            volume,
            buffer: Vec::new(),
            write_set: HashSet::new(),
            staged: None,
            head: None,
            track_cursor: 0,
            next_id: 0,
        }
    }

    /// Appends `bytes` to the stream, writing out every full chunk the
    /// buffer now covers.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        let payload_size = self.volume.options().payload_size() as usize;

        let mut start = 0;
        while start + payload_size <= self.buffer.len() {
            let payload = self.buffer[start..start + payload_size].to_vec();
            self.stage(payload)?;
            start += payload_size;
        }
        if start > 0 {
            self.buffer.drain(..start);
        }
        Ok(())
    }

    /// Closes the stream and returns the chain head to record in the index.
    /// An empty stream writes no chunks and reports the `(0, 0)` sentinel.
    pub fn finish(mut self) -> Result<(u16, u64)> {
        if !self.buffer.is_empty() {
            let residual = std::mem::take(&mut self.buffer);
            self.stage(residual)?;
        }
        if let Some(staged) = self.staged.take() {
            self.write_staged(staged, None)?;
        }
        self.flush_tracks()?;
        Ok(self.head.unwrap_or((0, 0)))
    }

    /// Abandons the stream without indexing it. Touched tracks still get
    /// their headers persisted so allocations made so far stay accounted.
    pub fn abort(mut self) -> Result<()> {
        self.flush_tracks()
    }

    /// Bytes currently buffered below one payload length.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn stage(&mut self, payload: Vec<u8>) -> Result<()> {
        let track_id = self.volume.ensure_writable(self.track_cursor)?;
        self.track_cursor = track_id;
        self.write_set.insert(track_id);

        let offset = self.volume.track_mut(track_id)?.alloc()?;
        if self.head.is_none() {
            self.head = Some((track_id, offset));
        }

        // The predecessor's successor is now known; write it out.
        if let Some(staged) = self.staged.take() {
            self.write_staged(staged, Some((track_id, offset)))?;
        }

        self.staged = Some(Staged {
            id: self.next_id,
            track: track_id,
            offset,
            payload,
        });
        self.next_id += 1;
        Ok(())
    }

    fn write_staged(&mut self, staged: Staged, next: Option<(u16, u64)>) -> Result<()> {
        let (next_track, next_offset) = next.unwrap_or((staged.track, 0));
        let chunk = Chunk {
            id: staged.id,
            valid: true,
            next_offset,
            next_track,
            payload: staged.payload,
        };
        self.volume.track_mut(staged.track)?.write(&chunk, staged.offset)
    }

    fn flush_tracks(&mut self) -> Result<()> {
        for track_id in self.write_set.drain() {
            self.volume.track_mut(track_id)?.write_end()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use crate::config::StoreOptions;
    use crate::volume::Volume;

    // Chunk geometry 64/256: 47 payload bytes per chunk, 3 chunks per track.
    fn small_volume(dir: &std::path::Path) -> Volume {
        let mut options = StoreOptions::new(dir);
        options.chunk_size = 64;
        options.track_size = 256;
        Volume::open(Arc::new(options)).unwrap()
    }

    fn read_all(volume: &mut Volume, head: (u16, u64)) -> Vec<u8> {
        let mut reader = volume.reader(head);
        let mut out = Vec::new();
        while let Some(payload) = reader.next_chunk().unwrap() {
            out.extend_from_slice(&payload);
        }
        out
    }

    fn bytes(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn empty_stream_reports_sentinel_head() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());

        let head = volume.writer().finish().unwrap();
        assert_eq!(head, (0, 0));
    }

    #[test]
    fn short_stream_is_one_chunk() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());
        let data = bytes(30);

        let mut writer = volume.writer();
        writer.push(&data).unwrap();
        let head = writer.finish().unwrap();

        assert_eq!(head, (0, 16));
        assert_eq!(read_all(&mut volume, head), data);

        let chunk = volume.track_mut(0).unwrap().read(16).unwrap();
        assert_eq!(chunk.payload.len(), 30);
        assert_eq!(chunk.next(), None);
    }

    #[test]
    fn exact_multiple_of_payload_has_no_residual_chunk() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());
        let data = bytes(2 * 47);

        let mut writer = volume.writer();
        writer.push(&data).unwrap();
        let head = writer.finish().unwrap();

        assert_eq!(read_all(&mut volume, head), data);

        let first = volume.track_mut(0).unwrap().read(16).unwrap();
        let second = volume.track_mut(0).unwrap().read(80).unwrap();
        assert_eq!(first.payload.len(), 47);
        assert_eq!(second.payload.len(), 47);
        assert_eq!(second.next(), None);
        // Only two chunks were written.
        assert_eq!(volume.track_mut(0).unwrap().file_size(), 16 + 2 * 64);
    }

    #[test]
    fn residual_chunk_records_true_length() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());
        let data = bytes(100);

        let mut writer = volume.writer();
        writer.push(&data).unwrap();
        let head = writer.finish().unwrap();

        assert_eq!(read_all(&mut volume, head), data);

        let last = volume.track_mut(0).unwrap().read(144).unwrap();
        assert_eq!(last.payload.len(), 100 - 2 * 47);
    }

    #[test]
    fn push_granularity_does_not_change_layout() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());
        let data = bytes(120);

        let mut writer = volume.writer();
        for byte in &data {
            writer.push(std::slice::from_ref(byte)).unwrap();
        }
        let head = writer.finish().unwrap();

        assert_eq!(read_all(&mut volume, head), data);
    }

    #[test]
    fn long_stream_spans_tracks() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());
        // Seven chunks: three on track 0, three on track 1, one on track 2.
        let data = bytes(300);

        let mut writer = volume.writer();
        writer.push(&data).unwrap();
        let head = writer.finish().unwrap();

        assert!(volume.has_track(1));
        assert_eq!(read_all(&mut volume, head), data);

        // The boundary chunk on track 0 points into track 1.
        let boundary = volume.track_mut(0).unwrap().read(144).unwrap();
        assert_eq!(boundary.next(), Some((1, 16)));
    }

    #[test]
    fn chain_ids_start_at_zero_and_increase() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());

        let mut writer = volume.writer();
        writer.push(&bytes(150)).unwrap();
        let head = writer.finish().unwrap();

        let mut reader = volume.reader(head);
        let mut chunks = 0;
        while reader.next_chunk().unwrap().is_some() {
            chunks += 1;
        }
        // The reader verifies the id sequence internally.
        assert_eq!(chunks, 4);
    }

    #[test]
    fn abort_leaves_no_head_and_keeps_tracks_consistent() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());

        let mut writer = volume.writer();
        writer.push(&bytes(100)).unwrap();
        writer.abort().unwrap();

        // Leaked chunks stay valid but unreferenced; the free list is empty.
        let track = volume.track_mut(0).unwrap();
        assert_eq!(track.free_head(), 0);
        assert_eq!(track.free_tail(), 0);
    }

    #[test]
    fn writes_reuse_freed_chunks_before_growing() {
        let dir = tempdir().unwrap();
        let mut volume = small_volume(dir.path());

        let mut writer = volume.writer();
        writer.push(&bytes(47)).unwrap();
        let head = writer.finish().unwrap();
        let grown = volume.track_mut(0).unwrap().file_size();

        volume.remove(head.0, head.1).unwrap();

        let mut writer = volume.writer();
        writer.push(&bytes(40)).unwrap();
        let head2 = writer.finish().unwrap();

        assert_eq!(head2, head);
        assert_eq!(volume.track_mut(0).unwrap().file_size(), grown);
    }
}
