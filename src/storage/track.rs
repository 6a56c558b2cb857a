//! # Track File
//!
//! One physical backing file holding a dense array of chunk records behind a
//! 16-byte header. Tracks never move data: a delete only flips chunks to
//! invalid and threads them onto the embedded free list, and a later
//! allocation pops from that list before the file is ever grown. On SSDs
//! this keeps write amplification down to the chunks actually touched.
//!
//! ## File Layout
//!
//! ```text
//! Offset  Size   Field      Description
//! ------  -----  ---------  -----------------------------------------
//! 0       8      free_head  offset of the first freed chunk, 0 = none
//! 8       8      free_tail  offset of the last freed chunk, 0 = none
//! 16      k * C  chunks     dense chunk array
//! ```
//!
//! ## Free List
//!
//! The free list is singly linked through the chunks' own `next_offset`
//! fields: a freed object's chain pointers keep linking its chunks, so
//! freeing a whole chain costs one valid-flag write per chunk plus a single
//! splice of the previous tail. Allocation pops from the head (LIFO), new
//! regions are spliced at the tail (FIFO). Pointers in the free list are
//! always local offsets; when a dying chain escapes to another track, the
//! escaping link is zeroed so the local list stays terminated.
//!
//! ## The Size Cursor
//!
//! `size` counts live bytes, not the physical file length: allocation
//! advances it by one chunk, each freed chunk retracts it. Whenever the free
//! list is empty the cursor equals the file length, which is exactly when
//! the append path uses it as the next write position. The volume consults
//! the cursor against the soft track bound, so freed regions are refilled
//! transparently before a track is considered full.
//!
//! ## Durability
//!
//! Header words are rewritten as the free list changes during `remove`, and
//! [`Track::write_end`] persists them again (with an fsync) when a write
//! stream closes. There is no journal: a crash between the two loses freed
//! regions but never corrupts live chains, which are fully written before
//! any free-list state is externalized.

use std::sync::Arc;

use eyre::{ensure, Result};
use tracing::{error, warn};
use zerocopy::big_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    StoreOptions, CHUNK_HEADER_SIZE, CHUNK_NEXT_OFFSET, CHUNK_VALID_OFFSET, TRACK_FILE_EXTENSION,
    TRACK_HEADER_SIZE,
};
use crate::error::StoreError;
use crate::storage::{Chunk, ChunkCodec, StoreFile};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TrackHeader {
    free_head: U64,
    free_tail: U64,
}

const _: () = assert!(std::mem::size_of::<TrackHeader>() == TRACK_HEADER_SIZE as usize);

impl TrackHeader {
    pub fn new(free_head: u64, free_tail: u64) -> Self {
        Self {
            free_head: U64::new(free_head),
            free_tail: U64::new(free_tail),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= TRACK_HEADER_SIZE as usize,
            "buffer too small for TrackHeader: {} < {}",
            bytes.len(),
            TRACK_HEADER_SIZE
        );

        Self::ref_from_bytes(&bytes[..TRACK_HEADER_SIZE as usize])
            .map_err(|e| eyre::eyre!("failed to parse TrackHeader: {:?}", e))
    }

    pub fn free_head(&self) -> u64 {
        self.free_head.get()
    }

    pub fn free_tail(&self) -> u64 {
        self.free_tail.get()
    }
}

#[derive(Debug)]
pub struct Track {
    id: u16,
    file: StoreFile,
    codec: ChunkCodec,
    options: Arc<StoreOptions>,
    free_head: u64,
    free_tail: u64,
    size: u64,
}

impl Track {
    /// Opens or creates the backing file `<id>.track` in the store directory.
    pub fn open(id: u16, options: Arc<StoreOptions>) -> Result<Self> {
        let path = options
            .directory
            .join(format!("{}.{}", id, TRACK_FILE_EXTENSION));
        let file = StoreFile::open(&path)?;

        let mut track = Self {
            id,
            codec: ChunkCodec::new(&options),
            options,
            free_head: 0,
            free_tail: 0,
            size: 0,
            file,
        };

        if track.file.size() == 0 {
            track.persist_header()?;
            track.size = TRACK_HEADER_SIZE;
            return Ok(track);
        }

        let mut buf = [0u8; TRACK_HEADER_SIZE as usize];
        let count = track.file.read(&mut buf, 0)?;
        ensure!(
            count == TRACK_HEADER_SIZE as usize,
            StoreError::io(format!("track {} header truncated to {} bytes", id, count))
        );

        let header = TrackHeader::from_bytes(&buf)?;
        track.free_head = header.free_head();
        track.free_tail = header.free_tail();

        // The cursor counts live bytes, so chunks sitting on the free list
        // must be subtracted from the physical length. Walking the list
        // costs one small read per freed chunk, on open only.
        let freed = track.count_free_chunks()?;
        track.size = track.file.size() - freed * track.options.chunk_size;
        Ok(track)
    }

    fn count_free_chunks(&mut self) -> Result<u64> {
        let capacity = self.options.chunk_capacity();
        let mut cursor = self.free_head;
        let mut count = 0u64;

        while cursor != 0 {
            if count >= capacity {
                error!(track = self.id, "free list does not terminate");
                return Err(StoreError::io(format!(
                    "cyclic free list on track {}",
                    self.id
                ))
                .into());
            }
            let mut header = [0u8; CHUNK_HEADER_SIZE];
            let read = self.file.read(&mut header, cursor)?;
            ensure!(
                read == CHUNK_HEADER_SIZE,
                StoreError::io(format!(
                    "track {} free chunk at {} truncated",
                    self.id, cursor
                ))
            );
            count += 1;
            cursor = self.codec.decode_link(&header)?.next_offset;
        }

        Ok(count)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Live-bytes cursor; equals the physical file length whenever the free
    /// list is empty.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Physical length of the backing file.
    pub fn file_size(&self) -> u64 {
        self.file.size()
    }

    pub fn free_head(&self) -> u64 {
        self.free_head
    }

    pub fn free_tail(&self) -> u64 {
        self.free_tail
    }

    /// Reserves the offset for the next chunk without writing anything.
    ///
    /// Pops the free list when it is non-empty, otherwise hands out the
    /// append position. Either way the live-bytes cursor advances by one
    /// chunk; the matching write is what actually grows the file.
    pub fn alloc(&mut self) -> Result<u64> {
        let chunk_size = self.options.chunk_size;

        if self.free_head == 0 {
            let offset = self.size;
            self.size += chunk_size;
            return Ok(offset);
        }

        let popped = self.free_head;
        let mut header = [0u8; CHUNK_HEADER_SIZE];
        let count = self.file.read(&mut header, popped)?;
        ensure!(
            count == CHUNK_HEADER_SIZE,
            StoreError::io(format!(
                "track {} free chunk at {} truncated",
                self.id, popped
            ))
        );

        // Free-list links are always local offsets.
        let link = self.codec.decode_link(&header)?;
        self.free_head = link.next_offset;
        if self.free_head == 0 {
            self.free_tail = 0;
        }
        self.size += chunk_size;
        Ok(popped)
    }

    /// Encodes the full chunk record at `offset`.
    pub fn write(&mut self, chunk: &Chunk, offset: u64) -> Result<()> {
        let mut buf = vec![0u8; self.options.chunk_size as usize];
        self.codec.encode(chunk, &mut buf)?;
        self.file.write(&buf, offset)
    }

    /// Reads and fully decodes the chunk at `offset`.
    pub fn read(&mut self, offset: u64) -> Result<Chunk> {
        let mut buf = vec![0u8; self.options.chunk_size as usize];
        let count = self.file.read(&mut buf, offset)?;
        if count != buf.len() {
            error!(
                track = self.id,
                offset, "chunk read returned {} of {} bytes", count, buf.len()
            );
            return Err(StoreError::io(format!(
                "short chunk read on track {} at offset {}",
                self.id, offset
            ))
            .into());
        }
        match self.codec.decode(&buf) {
            Ok(chunk) => Ok(chunk),
            Err(e) => {
                error!(track = self.id, offset, "undecodable chunk: {}", e);
                Err(StoreError::io(format!(
                    "corrupt chunk on track {} at offset {}",
                    self.id, offset
                ))
                .into())
            }
        }
    }

    /// Frees the live chain starting at `head_offset`.
    ///
    /// Walks the chain chunk by chunk, flipping each to invalid and wiring
    /// it into the free list. Stops when the chain ends (`None`) or escapes
    /// to another track, in which case the continuation location is returned
    /// and the local free list is terminated first. The head must belong to
    /// a live chain; freeing an already-freed head would double-splice it.
    pub fn remove(&mut self, head_offset: u64) -> Result<Option<(u16, u64)>> {
        let limit = self.options.track_limit();
        let chunk_size = self.options.chunk_size;
        let mut offset = head_offset;
        let mut first = true;

        loop {
            if offset >= limit {
                warn!(
                    track = self.id,
                    offset, limit, "delete walk stopped at track bound"
                );
                return Ok(None);
            }

            let mut header = [0u8; CHUNK_HEADER_SIZE];
            let count = self.file.read(&mut header, offset)?;
            if count == 0 {
                warn!(track = self.id, offset, "delete walk ran past end of file");
                return Ok(None);
            }
            if count < CHUNK_HEADER_SIZE {
                error!(track = self.id, offset, "truncated chunk header in delete walk");
                return Err(StoreError::io(format!(
                    "truncated chunk on track {} at offset {}",
                    self.id, offset
                ))
                .into());
            }

            self.size = self.size.saturating_sub(chunk_size);
            self.file.write(&[0u8], offset + CHUNK_VALID_OFFSET)?;
            let link = self.codec.decode_link(&header)?;

            if self.free_head == 0 {
                // Empty list: head and tail start at this chunk together.
                self.free_head = offset;
                self.free_tail = offset;
                self.persist_header()?;
            } else if first {
                // Splice the old tail onto the region being freed; the
                // chain's own pointers link the rest.
                self.file
                    .write(&offset.to_be_bytes(), self.free_tail + CHUNK_NEXT_OFFSET)?;
            }
            first = false;

            if link.next_offset == 0 {
                self.free_tail = offset;
                self.persist_header()?;
                return Ok(None);
            }

            if link.next_track != self.id {
                // The chain continues elsewhere. Terminate the local free
                // list before handing control back: the foreign offset must
                // never be walked as a local pointer.
                self.file
                    .write(&0u64.to_be_bytes(), offset + CHUNK_NEXT_OFFSET)?;
                self.free_tail = offset;
                self.persist_header()?;
                return Ok(Some((link.next_track, link.next_offset)));
            }

            offset = link.next_offset;
        }
    }

    /// Persists the free-list header and flushes the file. The volume calls
    /// this once per touched track when a write stream closes.
    pub fn write_end(&mut self) -> Result<()> {
        self.persist_header()?;
        self.file.sync()
    }

    fn persist_header(&mut self) -> Result<()> {
        let header = TrackHeader::new(self.free_head, self.free_tail);
        self.file.write(header.as_bytes(), 0)
    }
}
