//! # Store Facade
//!
//! The public entry point, binding a [`Volume`] and a [`NameIndex`] into
//! the three operations callers see: `write`, `read`, `delete`. The facade
//! owns all policy that spans the two subsystems, the pipe loops between
//! `std::io` streams and the volume's chunk streams, and the error
//! taxonomy mapping.
//!
//! ## Operation Flow
//!
//! ```text
//! write(name, source)           read(name, sink)          delete(name)
//!       │                             │                        │
//!   index hit? ──yes─> AlreadyExists  index miss? ──> NotFound index miss? ──> NotFound
//!       │                             │                        │
//!   VolumeWriter <── source       VolumeReader ──> sink    Volume::remove(chunk head)
//!       │                             │                        │
//!   index.set(name, heads)          flush                  index.remove(name)
//! ```
//!
//! ## Concurrency
//!
//! Operations take `&mut self`: a volume supports one stream at a time and
//! the borrow checker enforces it. Reading an object while the write that
//! produces it is still open is unsupported by construction.

mod builder;

pub use builder::StoreBuilder;


use std::io::{Read, Write};
use std::sync::Arc;

use eyre::Result;
use tracing::debug;

use crate::config::StoreOptions;
use crate::error::StoreError;
use crate::index::{NameIndex, ObjectHeads};
use crate::memory::CacheBudget;
use crate::volume::Volume;

#[derive(Debug)]
pub struct Store {
    options: Arc<StoreOptions>,
    volume: Volume,
    index: NameIndex,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Opens the store rooted at the options' directory, creating it on
    /// first use.
    pub fn open(options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let options = Arc::new(options);

        let budget = Arc::new(if options.max_memory == 0 {
            CacheBudget::auto_detect()
        } else {
            CacheBudget::with_limit(options.max_memory)
        });

        // The volume opens first: a missing index file is its fresh-store
        // marker, and the index creates that file.
        let volume = Volume::open(options.clone())?;
        let index = NameIndex::open(&options, budget)?;

        debug!(
            directory = %options.directory.display(),
            tracks = volume.track_count(),
            objects = index.len(),
            "store opened"
        );

        Ok(Self {
            options,
            volume,
            index,
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Stores the bytes of `source` under `name`.
    ///
    /// Fails with `AlreadyExists` before consuming the source when the name
    /// is already indexed. A source error aborts the stream: chunks already
    /// written are leaked until compaction but every touched track is left
    /// consistent.
    pub fn write(&mut self, name: &str, mut source: impl Read) -> Result<()> {
        if self.index.get(name)?.is_some() {
            return Err(StoreError::already_exists(name).into());
        }

        let mut writer = self.volume.writer();
        let mut buf = vec![0u8; self.options.chunk_size as usize];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(count) => {
                    if let Err(e) = writer.push(&buf[..count]) {
                        writer.abort()?;
                        return Err(e);
                    }
                }
                Err(e) => {
                    writer.abort()?;
                    return Err(StoreError::io(format!("source stream failed: {}", e)).into());
                }
            }
        }

        let head = writer.finish()?;
        let inserted = self.index.set(
            name,
            ObjectHeads {
                meta: (0, 0),
                chunk: head,
            },
        )?;
        if !inserted {
            return Err(StoreError::already_exists(name).into());
        }
        Ok(())
    }

    /// Streams the object stored under `name` into `sink`.
    pub fn read(&mut self, name: &str, mut sink: impl Write) -> Result<()> {
        let heads = self
            .index
            .get(name)?
            .ok_or_else(|| StoreError::not_found(name))?;

        let mut reader = self.volume.reader(heads.chunk);
        while let Some(payload) = reader.next_chunk()? {
            sink.write_all(&payload)
                .map_err(|e| StoreError::io(format!("sink stream failed: {}", e)))?;
        }
        sink.flush()
            .map_err(|e| StoreError::io(format!("sink flush failed: {}", e)))?;
        Ok(())
    }

    /// Removes the object stored under `name` and frees its chunks.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let heads = self
            .index
            .get(name)?
            .ok_or_else(|| StoreError::not_found(name))?;

        // Empty objects have no chain to free.
        if heads.chunk.1 != 0 {
            self.volume.remove(heads.chunk.0, heads.chunk.1)?;
        }
        self.index.remove(name);
        Ok(())
    }

    /// Number of objects currently resolvable by name.
    pub fn object_count(&self) -> usize {
        self.index.len()
    }
}
