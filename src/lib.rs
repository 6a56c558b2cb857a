//! # trackstore - Chunk-Chained Object Storage
//!
//! trackstore is an object-storage engine for a moderate-to-large population
//! of opaque blobs (typically media files) persisted onto local block
//! devices. Many small hosts handle large file populations badly through
//! the filesystem's own directory and metadata paths; trackstore sidesteps
//! them by packing objects into a handful of large *track* files and doing
//! its own space management, which also keeps write amplification low on
//! SSDs and preserves sequential throughput.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Public API (Store)           │  write / read / delete by name
//! ├──────────────────┬──────────────────┤
//! │      Volume      │    Name Index    │  chunk chains    name -> head
//! │  reader / writer │  cache + log     │
//! ├──────────────────┴──────────────────┤
//! │               Track                 │  alloc / write / read / remove
//! ├─────────────────────────────────────┤
//! │        Chunk Codec + StoreFile      │  fixed records, positional I/O
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! store_dir/
//! ├── index        # append-only 54-byte records: sha256(name) -> heads
//! ├── 0.track      # 16-byte free-list header + dense chunk array
//! ├── 1.track
//! └── ...
//! ```
//!
//! Objects are split into fixed-size chunks (4 KiB by default) linked into
//! per-object chains that may span tracks. Deleting an object only flips
//! its chunks invalid and threads them onto the owning track's embedded
//! free list; later writes pop freed slots before growing any file.
//!
//! ## Quick Start
//!
//! ```ignore
//! use trackstore::Store;
//!
//! let mut store = Store::builder()
//!     .directory("./media")
//!     .open()?;
//!
//! store.write("clip.mp4", std::fs::File::open("clip.mp4")?)?;
//! store.read("clip.mp4", std::io::stdout())?;
//! store.delete("clip.mp4")?;
//! ```
//!
//! ## Concurrency Model
//!
//! A store is single-writer, single-reader per volume: operations take
//! `&mut self` and run one streaming operation at a time. Index mutations
//! are additionally serialized internally so the append log stays coherent
//! if the facade is ever driven from several threads. Multiple stores on
//! distinct disks compose at a layer above this crate.
//!
//! ## Durability
//!
//! There is no journal. Live chains are fully written before any free-list
//! state is externalized, so an unclean shutdown can leak freed regions but
//! never corrupts surviving objects. Leaked regions and shadowed index
//! records wait for a compaction pass.
//!
//! ## Module Overview
//!
//! - [`store`]: the `Store` facade and its builder
//! - [`volume`]: track set, streaming reader/writer, delete trampoline
//! - [`storage`]: positional file handle, chunk codec, track file
//! - [`index`]: append-only name index with hot cache
//! - [`memory`]: advisory cache budget
//! - [`config`]: layout constants and validated options
//! - [`error`]: the `NotFound` / `AlreadyExists` / `Io` / `Corruption` taxonomy

pub mod config;
pub mod error;
pub mod index;
pub mod memory;
pub mod storage;
pub mod store;
pub mod volume;

pub use config::StoreOptions;
pub use error::{ErrorKind, StoreError};
pub use index::{NameIndex, ObjectHeads};
pub use memory::CacheBudget;
pub use store::{Store, StoreBuilder};
pub use volume::{Volume, VolumeReader, VolumeWriter};
