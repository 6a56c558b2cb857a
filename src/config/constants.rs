//! # Layout Constants
//!
//! This module centralizes the on-disk layout constants. Values that depend
//! on each other are co-located and guarded by compile-time assertions so a
//! change to one cannot silently invalidate another.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_CHUNK_SIZE (4096 bytes)
//!       │
//!       ├─> CHUNK_HEADER_SIZE (17 bytes, fixed by the record layout)
//!       │     id(4) + valid(1) + payload_len(2) + next_offset(8) + next_track(2)
//!       │
//!       └─> payload capacity = chunk_size - CHUNK_HEADER_SIZE
//!             The payload_len field stores 0 as the "full chunk" sentinel,
//!             so a chunk size must leave a non-zero payload capacity.
//!
//! TRACK_HEADER_SIZE (16 bytes)
//!       │
//!       └─> chunk array begins at offset 16; free_head / free_tail are the
//!           two u64 header words. Offset 0 is always header, which is why
//!           0 doubles as the "no chunk" sentinel in link fields.
//!
//! INDEX_RECORD_SIZE (54 bytes)
//!       │
//!       └─> magic(2) + key(32) + meta_track(2) + meta_offset(8)
//!           + chunk_track(2) + chunk_offset(8)
//! ```
//!
//! ## Modifying Constants
//!
//! The chunk header and index record sizes are wire-format constants; they
//! can only change together with a format version bump. The default chunk
//! and track sizes are tunables validated per store in `StoreOptions`.

// ============================================================================
// CHUNK LAYOUT
// ============================================================================

/// Default total size of one chunk record in bytes.
/// The unit of allocation and of linked-list traversal.
pub const DEFAULT_CHUNK_SIZE: u64 = 4096;

/// Fixed size of the chunk linkage header.
/// id(4) + valid(1) + payload_len(2) + next_offset(8) + next_track(2).
pub const CHUNK_HEADER_SIZE: usize = 17;

/// Byte offset of the `valid` flag within a chunk record.
pub const CHUNK_VALID_OFFSET: u64 = 4;

/// Byte offset of the `next_offset` link within a chunk record.
pub const CHUNK_NEXT_OFFSET: u64 = 7;

/// Smallest chunk size accepted by `StoreOptions`.
pub const MIN_CHUNK_SIZE: u64 = 64;

const _: () = assert!(
    MIN_CHUNK_SIZE > CHUNK_HEADER_SIZE as u64,
    "minimum chunk size must leave payload capacity"
);

// ============================================================================
// TRACK LAYOUT
// ============================================================================

/// Size of the track file header: free_head(8) + free_tail(8).
pub const TRACK_HEADER_SIZE: u64 = 16;

/// Default soft capacity bound of one track file (50 GiB).
/// Enforced by the volume when allocating, not by the track itself.
pub const DEFAULT_TRACK_SIZE: u64 = 50 * 1024 * 1024 * 1024;

/// File extension of track files within a store directory.
pub const TRACK_FILE_EXTENSION: &str = "track";

// ============================================================================
// NAME INDEX LAYOUT
// ============================================================================

/// Size of one index record on disk.
pub const INDEX_RECORD_SIZE: u64 = 54;

/// Magic value opening every index record.
pub const INDEX_MAGIC: u16 = 0x9900;

/// Size of the record key (a SHA-256 digest of the object name).
pub const INDEX_KEY_SIZE: usize = 32;

/// File name of the index within a store directory.
pub const INDEX_FILE_NAME: &str = "index";

// ============================================================================
// MEMORY BUDGET
// ============================================================================

/// Fraction of available host memory claimed by `CacheBudget::auto_detect`.
pub const DEFAULT_BUDGET_DIVISOR: usize = 2;

/// Minimum budget in bytes (4 MiB). Even on small hosts the index cache
/// needs room to hold a working set.
pub const MIN_BUDGET_FLOOR: usize = 4 * 1024 * 1024;

/// Approximate resident cost of one index cache entry in bytes, covering
/// the digest key, the entry fields and hash-table overhead.
pub const CACHE_ENTRY_COST: usize = 128;
