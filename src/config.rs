//! Runtime configuration for tgc-cache.
//!
//! Configuration can be loaded from a JSON file or constructed
//! programmatically. All store and codec knobs live here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cache store configuration.
    pub cache: CacheConfig,

    /// Codec tuning.
    pub codec: CodecConfig,
}

/// Cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one file per cache key.
    pub cache_dir: PathBuf,

    /// Compress numeric payload leaves before persisting.
    pub enable_compression: bool,

    /// Keep decoded values in an in-process map for hot reuse.
    pub enable_memory_cache: bool,

    /// Cache format version, embedded in every key's freshness prefix
    /// ("major.minor").
    pub version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache_data"),
            enable_compression: true,
            enable_memory_cache: true,
            version: "4.02".to_string(),
        }
    }
}

/// Codec tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Quantization levels per residual channel. More levels mean tighter
    /// error bounds and longer tokens.
    pub quantization_levels: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            quantization_levels: crate::codec::constants::QUANTIZATION_LEVELS,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
