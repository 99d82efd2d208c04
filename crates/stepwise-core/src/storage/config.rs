//! Storage configuration.

use std::path::PathBuf;

/// Configuration for sled-backed stores.
#[derive(Debug, Clone)]
pub struct SledStoreConfig {
    /// Directory for scratch stores. None places them next to the original,
    /// which keeps the final swap on one filesystem.
    pub scratch_dir: Option<PathBuf>,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush only when asked.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,
}

impl Default for SledStoreConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: None,
            compression: true,
        }
    }
}

impl SledStoreConfig {
    /// Place scratch stores under `dir`.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Convert to sled configuration for the store at `path`.
    pub(crate) fn to_sled_config(&self, path: &std::path::Path) -> sled::Config {
        sled::Config::new()
            .path(path)
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms)
    }
}

/// Configuration for the copy engine.
#[derive(Debug, Clone)]
pub struct CopyEngineConfig {
    /// Number of records written per batch.
    pub batch_size: usize,
}

impl Default for CopyEngineConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

impl CopyEngineConfig {
    /// Set the batch size (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}
