//! Durable key/blob store for large model artifacts.
//!
//! The cache is a best-effort accelerator: `store` never reports failure to
//! the caller, while `restore` reports a miss so the caller can fall back to
//! downloading the artifact.

pub mod disk;
pub mod memory;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use disk::DiskAssetCache;
pub use memory::MemoryAssetCache;

/// Partition reserved for model assets.
pub const MODEL_PARTITION: &str = "models";
/// Runtime support-file bundle.
pub const FILESET_ASSET: &str = "genai.fileset";
/// Model weights.
pub const MODEL_ASSET: &str = "llm";

pub type AssetCacheFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum AssetCacheError {
    #[error("asset {name} not found in model cache")]
    NotFound { name: String },
    #[error("failed to access cached asset {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl AssetCacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub trait AssetCache: Send + Sync {
    /// Writes `blob` under `name`. Failures are logged and swallowed.
    fn store<'a>(&'a self, blob: &'a [u8], name: &'a str) -> AssetCacheFuture<'a, ()>;

    fn restore<'a>(&'a self, name: &'a str)
    -> AssetCacheFuture<'a, Result<Vec<u8>, AssetCacheError>>;
}
