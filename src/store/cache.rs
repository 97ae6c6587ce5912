//! The cache store: versioned, content-addressed, two-tier.
//!
//! Keys have the shape `{namespace}-{TVC}-{contentHash}`. Because the TVC
//! prefix embeds today's date, identical key material produces a different
//! key on a different calendar day: the cache supersedes itself daily with
//! no explicit invalidation. `max_age_hours` governs intra-day staleness
//! separately, via file modification time.
//!
//! No internal locking: concurrent access to one store must be serialized
//! by the caller.

use std::collections::HashMap;

use base64::prelude::*;
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec::engine::CompressionEngine;
use crate::config::Config;
use crate::store::file_io::{FileStore, StoreError};
use crate::store::hash::content_hash;
use crate::store::payload::Payload;
use crate::store::version::{self, Version};

/// On-disk shape of one cache entry file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Base64 of the serialized (possibly compressed) payload bytes.
    value: String,

    /// Caller-supplied metadata, stored verbatim.
    metadata: Value,

    /// RFC 3339 write timestamp.
    timestamp: String,

    /// The full key this entry was written under.
    cache_key: String,
}

/// A snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub file_entries: usize,
    pub memory_entries: usize,
    pub total_size_bytes: u64,
    pub compression_enabled: bool,
    pub cache_dir: std::path::PathBuf,
}

/// The two-tier cache store.
pub struct CacheStore {
    /// Hot tier; holds original payloads, never compressed forms.
    memory: Option<HashMap<String, Payload>>,

    /// Durable tier.
    files: FileStore,

    /// Codec. Always constructed: even a compression-disabled store must
    /// read entries written while compression was on.
    engine: CompressionEngine,

    compression_enabled: bool,
    version: Version,
}

impl CacheStore {
    /// Open a store with the given configuration.
    ///
    /// Validates the version string once; key building never fails after
    /// construction for system-clock dates.
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let version = Version::parse(&config.cache.version)?;
        let files = FileStore::open(config.cache.cache_dir.clone())?;
        let memory = config.cache.enable_memory_cache.then(HashMap::new);
        let compression_enabled = config.cache.enable_compression;
        let engine = CompressionEngine::new(config.codec);

        info!(
            cache_dir = %files.dir().display(),
            compression = compression_enabled,
            memory_cache = memory.is_some(),
            version = %version,
            "cache store initialized"
        );

        Ok(Self {
            memory,
            files,
            engine,
            compression_enabled,
            version,
        })
    }

    /// Look up a cached value by key material, using today's date.
    ///
    /// `None` is "not cached, recompute": misses, expired entries, and any
    /// unreadable or corrupt entry all land there.
    pub fn get(
        &mut self,
        namespace: &str,
        key_data: &Payload,
        max_age_hours: Option<f64>,
    ) -> Result<Option<Payload>, StoreError> {
        self.get_at(namespace, key_data, max_age_hours, Local::now().date_naive())
    }

    /// [`get`](Self::get) pinned to an explicit date. Used for backfills and
    /// for exercising the daily key rollover deterministically.
    pub fn get_at(
        &mut self,
        namespace: &str,
        key_data: &Payload,
        max_age_hours: Option<f64>,
        date: NaiveDate,
    ) -> Result<Option<Payload>, StoreError> {
        let key = self.key_for(namespace, key_data, date)?;

        if let Some(memory) = &self.memory {
            if let Some(value) = memory.get(&key) {
                debug!(key = %key, "cache hit (memory)");
                return Ok(Some(value.clone()));
            }
        }

        // Intra-day staleness: an expired file is a miss, but stays on disk.
        if let Some(max_age) = max_age_hours {
            if let Some(age) = self.files.age_hours(&key) {
                if age > max_age {
                    debug!(key = %key, age_hours = age, "cache entry expired");
                    return Ok(None);
                }
            }
        }

        let bytes = match self.files.read(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return Ok(None);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed");
                return Ok(None);
            }
        };

        let Some(payload) = self.decode_entry(&key, &bytes) else {
            return Ok(None);
        };

        if let Some(memory) = &mut self.memory {
            memory.insert(key.clone(), payload.clone());
        }
        debug!(key = %key, "cache hit (file)");
        Ok(Some(payload))
    }

    /// Store a value under its key material, using today's date.
    ///
    /// Always returns the computed key. A failed file write is logged and
    /// absorbed; a returned key does not by itself imply durability.
    pub fn set(
        &mut self,
        namespace: &str,
        key_data: &Payload,
        value: Payload,
        metadata: Option<Value>,
    ) -> Result<String, StoreError> {
        self.set_at(namespace, key_data, value, metadata, Local::now().date_naive())
    }

    /// [`set`](Self::set) pinned to an explicit date.
    pub fn set_at(
        &mut self,
        namespace: &str,
        key_data: &Payload,
        value: Payload,
        metadata: Option<Value>,
        date: NaiveDate,
    ) -> Result<String, StoreError> {
        let key = self.key_for(namespace, key_data, date)?;

        let serialized = self.serialize_value(&key, &value);

        // The memory tier keeps the original payload so hot reuse never pays
        // for decompression.
        if let Some(memory) = &mut self.memory {
            memory.insert(key.clone(), value);
        }

        let entry = CacheEntry {
            value: BASE64_STANDARD.encode(&serialized),
            metadata: metadata.unwrap_or(Value::Object(Default::default())),
            timestamp: Utc::now().to_rfc3339(),
            cache_key: key.clone(),
        };

        match serde_json::to_vec(&entry) {
            Ok(entry_bytes) => {
                if let Err(e) = self.files.write(&key, &entry_bytes) {
                    warn!(key = %key, error = %e, "cache write failed, entry not persisted");
                } else {
                    debug!(key = %key, size = entry_bytes.len(), "cache set");
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache entry serialization failed, entry not persisted");
            }
        }

        Ok(key)
    }

    /// Remove matching entries from both tiers.
    ///
    /// `namespace` matches by key prefix, `pattern` by substring; both
    /// absent clears everything. Returns the number of entries removed
    /// across the two tiers.
    pub fn invalidate(&mut self, namespace: Option<&str>, pattern: Option<&str>) -> usize {
        let matches = |key: &str| {
            namespace.is_none_or(|ns| key.starts_with(ns))
                && pattern.is_none_or(|p| key.contains(p))
        };

        let mut count = 0;

        if let Some(memory) = &mut self.memory {
            let before = memory.len();
            memory.retain(|key, _| !matches(key));
            count += before - memory.len();
        }

        match self.files.keys() {
            Ok(keys) => {
                for key in keys {
                    if matches(&key) {
                        match self.files.delete(&key) {
                            Ok(true) => count += 1,
                            Ok(false) => {}
                            Err(e) => warn!(key = %key, error = %e, "failed to delete cache entry"),
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to list cache entries for invalidation"),
        }

        info!(count, "invalidated cache entries");
        count
    }

    /// Delete entry files older than `max_age_hours`.
    ///
    /// The read path never deletes expired entries; this sweep is how disk
    /// gets reclaimed, and it only runs when called. Returns the number of
    /// files removed.
    pub fn evict_expired(&mut self, max_age_hours: f64) -> usize {
        let mut count = 0;

        match self.files.keys() {
            Ok(keys) => {
                for key in keys {
                    let expired = self
                        .files
                        .age_hours(&key)
                        .map(|age| age > max_age_hours)
                        .unwrap_or(false);
                    if !expired {
                        continue;
                    }
                    match self.files.delete(&key) {
                        Ok(true) => {
                            if let Some(memory) = &mut self.memory {
                                memory.remove(&key);
                            }
                            count += 1;
                        }
                        Ok(false) => {}
                        Err(e) => warn!(key = %key, error = %e, "failed to evict cache entry"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to list cache entries for eviction"),
        }

        if count > 0 {
            info!(count, max_age_hours, "evicted expired cache entries");
        }
        count
    }

    /// Current cache occupancy.
    pub fn get_stats(&self) -> CacheStats {
        let file_stats = match self.files.stats() {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "failed to collect file tier stats");
                Default::default()
            }
        };

        CacheStats {
            file_entries: file_stats.entry_count,
            memory_entries: self.memory.as_ref().map_or(0, HashMap::len),
            total_size_bytes: file_stats.total_bytes,
            compression_enabled: self.compression_enabled,
            cache_dir: self.files.dir().to_path_buf(),
        }
    }

    /// Build the versioned key for key material on a given date.
    pub fn key_for(
        &self,
        namespace: &str,
        key_data: &Payload,
        date: NaiveDate,
    ) -> Result<String, StoreError> {
        let hash = content_hash(key_data);
        let tvc = version::encode_tvc(date, self.version)?;
        Ok(version::assemble_cache_key(namespace, &tvc, &hash))
    }

    /// Serialize a payload for the file tier, compressing when enabled and
    /// falling back to the uncompressed document on any codec failure.
    fn serialize_value(&self, key: &str, value: &Payload) -> Vec<u8> {
        let Some(tagged) = value.to_tagged() else {
            // Opaque bytes persist verbatim.
            if let Payload::Opaque(bytes) = value {
                return bytes.clone();
            }
            return Vec::new();
        };

        let document = if self.compression_enabled {
            match self.engine.compress_json(&tagged) {
                Ok(compressed) => compressed,
                Err(e) => {
                    warn!(key = %key, error = %e, "compression failed, storing uncompressed");
                    tagged
                }
            }
        } else {
            tagged
        };

        document.to_string().into_bytes()
    }

    /// Decode one entry file into a payload. Any fault logs and yields
    /// `None`. A corrupt entry is indistinguishable from a miss.
    fn decode_entry(&self, key: &str, bytes: &[u8]) -> Option<Payload> {
        let entry: CacheEntry = match serde_json::from_slice(bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "corrupt cache entry");
                return None;
            }
        };

        let value_bytes = match BASE64_STANDARD.decode(&entry.value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "cache entry value is not valid base64");
                return None;
            }
        };

        // Not JSON at all: the opaque fallback.
        let document: Value = match serde_json::from_slice(&value_bytes) {
            Ok(document) => document,
            Err(_) => return Some(Payload::Opaque(value_bytes)),
        };

        let decompressed = match self.engine.decompress_json(&document) {
            Ok(decompressed) => decompressed,
            Err(e) => {
                warn!(key = %key, error = %e, "cache entry decompression failed");
                return None;
            }
        };

        Some(Payload::from_tagged(decompressed))
    }
}
