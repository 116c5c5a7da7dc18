//! Host-owned cache of ingested tables.
//!
//! Tables are keyed by a SHA-256 fingerprint of the upload name, the decode-relevant
//! [`IngestionOptions`] and the raw bytes, so re-submitting the same file skips decoding. The
//! ingestor itself never caches; a host that wants reuse owns a [`TableCache`] and routes
//! uploads through [`TableCache::get_or_ingest`].

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Seek};
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};

use crate::error::IngestionResult;
use crate::ingestion::upload::{Rewind, read_bytes};
use crate::ingestion::{IngestionFormat, IngestionOptions, UploadedFile, ingest};
use crate::types::Table;

/// Maximum number of tables held in cache (eviction: least recently used).
const DEFAULT_MAX_TABLES: usize = 16;

/// Hex-encoded SHA-256 content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an upload as it would be ingested with `options`.
    pub fn compute(name: &str, bytes: &[u8], options: &IngestionOptions) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(options_key(options).as_bytes());
        hasher.update([0u8]);
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn options_key(options: &IngestionOptions) -> String {
    format!(
        "{:?}|{:?}|{:?}|{}|{:?}|{}",
        options.format,
        options.encoding.map(|e| e.label()),
        options.max_detection_bytes,
        options.delimiter,
        options.excel_sheet_selection,
        options.missing_markers.join("\u{1F}")
    )
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CachedTable {
    table: Arc<Table>,
    last_used: u64,
}

struct CacheInner {
    tables: HashMap<Fingerprint, CachedTable>,
    max_tables: usize,
    clock: u64,
    stats: CacheStats,
}

impl CacheInner {
    fn lookup(&mut self, key: &Fingerprint) -> Option<Arc<Table>> {
        self.clock += 1;
        let now = self.clock;
        let entry = self.tables.get_mut(key)?;
        entry.last_used = now;
        Some(Arc::clone(&entry.table))
    }
}

/// LRU cache of ingested tables.
///
/// Every method takes `&self` and locks an internal mutex, so one cache can be shared across
/// request handlers behind an `Arc` without extra locking by the host.
pub struct TableCache {
    inner: Mutex<CacheInner>,
}

impl TableCache {
    /// Create a cache holding at most `max_tables` tables (default 16, minimum 1).
    pub fn new(max_tables: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                tables: HashMap::new(),
                max_tables: max_tables.unwrap_or(DEFAULT_MAX_TABLES).max(1),
                clock: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached table for this upload, or ingest it and cache the result.
    ///
    /// Failures are returned as-is and never cached. Uploads whose name does not map to a
    /// supported format are rejected without reading the stream.
    pub fn get_or_ingest<R: Read + Seek>(
        &self,
        file: &mut UploadedFile<R>,
        options: &IngestionOptions,
    ) -> IngestionResult<Arc<Table>> {
        let recognized = options.format.is_some()
            || file
                .extension()
                .as_deref()
                .and_then(IngestionFormat::from_extension)
                .is_some();
        if !recognized {
            return ingest(file, options).map(Arc::new);
        }

        let bytes = {
            let mut stream = Rewind::start(file.get_mut())?;
            let bytes = read_bytes(&mut *stream, None)?;
            stream.finish()?;
            bytes
        };
        let key = Fingerprint::compute(file.name(), &bytes, options);

        if let Some(table) = self.touch(&key) {
            tracing::debug!(fingerprint = %key, file = %file.name(), "table cache hit");
            return Ok(table);
        }

        let table = Arc::new(ingest(file, options)?);
        self.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Look up a table by fingerprint, marking it recently used.
    ///
    /// Does not count towards [`CacheStats::hits`] or [`CacheStats::misses`].
    pub fn get(&self, key: &Fingerprint) -> Option<Arc<Table>> {
        self.lock().lookup(key)
    }

    fn touch(&self, key: &Fingerprint) -> Option<Arc<Table>> {
        let mut inner = self.lock();
        let found = inner.lookup(key);
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    fn insert(&self, key: Fingerprint, table: Arc<Table>) {
        let mut inner = self.lock();
        inner.clock += 1;
        let now = inner.clock;

        if !inner.tables.contains_key(&key) && inner.tables.len() >= inner.max_tables {
            if let Some(oldest) = inner
                .tables
                .iter()
                .min_by_key(|(_, v)| v.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.tables.remove(&oldest);
                inner.stats.evictions += 1;
                tracing::info!(evicted = %oldest, "table cache eviction");
            }
        }

        inner.tables.insert(
            key,
            CachedTable {
                table,
                last_used: now,
            },
        );
    }

    /// Remove a table from the cache. Returns true if it existed.
    pub fn remove(&self, key: &Fingerprint) -> bool {
        self.lock().tables.remove(key).is_some()
    }

    /// Drop every cached table; counters are kept.
    pub fn clear(&self) {
        self.lock().tables.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.tables.len(),
            ..inner.stats
        }
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for TableCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("TableCache")
            .field("entries", &stats.entries)
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .finish()
    }
}
