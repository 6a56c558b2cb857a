//! # Name Index
//!
//! Append-only map from object names to chain heads. The on-disk form is an
//! unordered log of fixed 54-byte records ([`IndexRecord`]); the logical
//! value of a key is the **last** record written for it, so an overwrite is
//! a plain append and shadowed records wait for a future compaction pass.
//!
//! ## Hot Cache
//!
//! The whole file is scanned once at open and every well-formed record is
//! loaded into an in-memory map keyed by the SHA-256 digest of the name
//! (later records overwrite earlier ones during the scan, preserving
//! last-writer-wins). Each cache entry carries `cache_cycle_ts` and
//! `hit_count`; these fields are the substrate for the eviction policy the
//! advisory memory budget will eventually drive and are maintained even
//! though eviction itself is not implemented yet.
//!
//! A parallel set of already-seen file offsets lets the miss path scan only
//! records it has never decoded, which matters once the file has grown
//! behind the cache's back.
//!
//! ## Corruption Policy
//!
//! A record that decodes to the wrong magic (or fails to decode at all) is
//! skipped with a warning and the scan continues; a truncated tail stops
//! the scan. Neither aborts the open: the index prefers serving the
//! readable majority over refusing the whole store.
//!
//! ## Concurrency
//!
//! All state sits behind one `parking_lot::Mutex`, which serializes the
//! `file_size -> append -> cache insert` triple of `set` against every
//! other mutation. Under the engine's single-threaded volume discipline
//! the lock is uncontended; it exists so the index stays correct when the
//! facade is driven from more than one thread.

mod record;

pub use record::IndexRecord;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::Result;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zerocopy::IntoBytes;

use crate::config::{StoreOptions, CACHE_ENTRY_COST, INDEX_FILE_NAME, INDEX_KEY_SIZE, INDEX_RECORD_SIZE};
use crate::memory::CacheBudget;
use crate::storage::StoreFile;

/// Chain heads recorded for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeads {
    /// Head of the reserved metadata chain; `(0, 0)` while unused.
    pub meta: (u16, u64),
    /// Head of the payload chain; offset 0 means "no chunks".
    pub chunk: (u16, u64),
}

/// In-memory cache entry for one winning record.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_cycle_ts: u64,
    pub hit_count: u64,
    pub file_offset: u64,
    pub meta_head: (u16, u64),
    pub chunk_head: (u16, u64),
}

#[derive(Debug)]
struct IndexState {
    file: StoreFile,
    /// High-water mark of the region already decoded into the cache.
    scanned: u64,
    cache: HashMap<[u8; INDEX_KEY_SIZE], CacheEntry>,
    seen: HashSet<u64>,
    over_budget_logged: bool,
}

#[derive(Debug)]
pub struct NameIndex {
    state: Mutex<IndexState>,
    budget: Arc<CacheBudget>,
}

impl NameIndex {
    /// Opens (or creates) `<dir>/index` and loads every readable record.
    pub fn open(options: &StoreOptions, budget: Arc<CacheBudget>) -> Result<Self> {
        let path = options.directory.join(INDEX_FILE_NAME);
        let mut file = StoreFile::open(&path)?;

        let mut cache = HashMap::new();
        let mut seen = HashSet::new();
        let mut skipped = 0usize;
        let mut offset = 0u64;

        while offset + INDEX_RECORD_SIZE <= file.size() {
            let mut buf = [0u8; INDEX_RECORD_SIZE as usize];
            let count = file.read(&mut buf, offset)?;
            if count < buf.len() {
                warn!(offset, "index scan stopped at truncated record");
                break;
            }

            match IndexRecord::from_bytes(&buf) {
                Ok(record) => {
                    cache.insert(
                        *record.key(),
                        CacheEntry {
                            cache_cycle_ts: now_secs(),
                            hit_count: 0,
                            file_offset: offset,
                            meta_head: record.meta_head(),
                            chunk_head: record.chunk_head(),
                        },
                    );
                    seen.insert(offset);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(offset, "skipping malformed index record: {}", e);
                }
            }
            offset += INDEX_RECORD_SIZE;
        }

        budget.charge(cache.len() * CACHE_ENTRY_COST);
        debug!(
            entries = cache.len(),
            skipped,
            bytes = file.size(),
            "index loaded"
        );

        Ok(Self {
            state: Mutex::new(IndexState {
                file,
                scanned: offset,
                cache,
                seen,
                over_budget_logged: false,
            }),
            budget,
        })
    }

    /// SHA-256 digest of an object name, the record key.
    pub fn digest(name: &str) -> [u8; INDEX_KEY_SIZE] {
        Sha256::digest(name.as_bytes()).into()
    }

    /// Resolves `name` to its chain heads, bumping the cache statistics on
    /// a hit. A miss consults the file only when it has grown past the
    /// scanned region.
    pub fn get(&self, name: &str) -> Result<Option<ObjectHeads>> {
        let key = Self::digest(name);
        let mut state = self.state.lock();

        if let Some(entry) = state.cache.get_mut(&key) {
            entry.cache_cycle_ts = now_secs();
            entry.hit_count += 1;
            return Ok(Some(ObjectHeads {
                meta: entry.meta_head,
                chunk: entry.chunk_head,
            }));
        }

        let file_size = state.file.stat_size()?;
        if file_size <= state.scanned {
            return Ok(None);
        }

        // Records appended behind the cache's back: scan everything not yet
        // decoded and honor last-writer-wins by keeping the final match.
        let mut winner: Option<(u64, ObjectHeads)> = None;
        let mut offset = 0u64;
        while offset + INDEX_RECORD_SIZE <= file_size {
            if !state.seen.contains(&offset) {
                let mut buf = [0u8; INDEX_RECORD_SIZE as usize];
                let count = state.file.read(&mut buf, offset)?;
                if count < buf.len() {
                    break;
                }
                if let Ok(record) = IndexRecord::from_bytes(&buf) {
                    if record.key() == &key {
                        winner = Some((
                            offset,
                            ObjectHeads {
                                meta: record.meta_head(),
                                chunk: record.chunk_head(),
                            },
                        ));
                    }
                }
            }
            offset += INDEX_RECORD_SIZE;
        }

        match winner {
            Some((offset, heads)) => {
                state.seen.insert(offset);
                state.cache.insert(
                    key,
                    CacheEntry {
                        cache_cycle_ts: now_secs(),
                        hit_count: 1,
                        file_offset: offset,
                        meta_head: heads.meta,
                        chunk_head: heads.chunk,
                    },
                );
                self.charge_entry(&mut state);
                Ok(Some(heads))
            }
            None => Ok(None),
        }
    }

    /// Records `name -> heads`. Returns `false` without touching the file
    /// when the name is already cached.
    pub fn set(&self, name: &str, heads: ObjectHeads) -> Result<bool> {
        let key = Self::digest(name);
        let mut state = self.state.lock();

        if state.cache.contains_key(&key) {
            return Ok(false);
        }

        let offset = state.file.size();
        let record = IndexRecord::new(key, heads.meta, heads.chunk);
        state.file.append(record.as_bytes())?;

        state.seen.insert(offset);
        if state.scanned == offset {
            state.scanned = offset + INDEX_RECORD_SIZE;
        }
        state.cache.insert(
            key,
            CacheEntry {
                cache_cycle_ts: now_secs(),
                hit_count: 0,
                file_offset: offset,
                meta_head: heads.meta,
                chunk_head: heads.chunk,
            },
        );
        self.charge_entry(&mut state);
        Ok(true)
    }

    /// Drops the cache entry for `name`. The file record remains in place
    /// as a tombstone candidate for compaction.
    pub fn remove(&self, name: &str) -> bool {
        let key = Self::digest(name);
        let mut state = self.state.lock();
        if state.cache.remove(&key).is_some() {
            self.budget.release(CACHE_ENTRY_COST);
            true
        } else {
            false
        }
    }

    /// Number of live (cached) entries.
    pub fn len(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn charge_entry(&self, state: &mut IndexState) {
        if self.budget.would_exceed(CACHE_ENTRY_COST) && !state.over_budget_logged {
            state.over_budget_logged = true;
            warn!(
                limit = self.budget.limit(),
                "index cache exceeds its advisory memory budget"
            );
        }
        self.budget.charge(CACHE_ENTRY_COST);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
