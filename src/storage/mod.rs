//! # Storage Layer
//!
//! The on-disk primitives of the engine, leaves first:
//!
//! - `file`: positional file handle with full-write completion
//! - `chunk`: fixed-size chunk record codec (full and lazy decode)
//! - `track`: one backing file of chained chunks with an embedded free list
//!
//! Everything above this layer (volume streams, name index, store facade)
//! composes these three. All multi-byte on-disk integers are big-endian.

mod chunk;
mod file;
mod track;

pub use chunk::{Chunk, ChunkCodec, ChunkLink};
pub use file::StoreFile;
pub use track::{Track, TrackHeader};
