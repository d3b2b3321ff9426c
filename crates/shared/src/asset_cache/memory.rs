use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::{AssetCache, AssetCacheError, AssetCacheFuture};

/// Process-local cache, used when disk caching is disabled.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetCache {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryAssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.lock().await.contains_key(name)
    }
}

impl AssetCache for MemoryAssetCache {
    fn store<'a>(&'a self, blob: &'a [u8], name: &'a str) -> AssetCacheFuture<'a, ()> {
        Box::pin(async move {
            self.entries
                .lock()
                .await
                .insert(name.to_string(), blob.to_vec());
            debug!(asset = name, bytes = blob.len(), "model asset cached in memory");
        })
    }

    fn restore<'a>(
        &'a self,
        name: &'a str,
    ) -> AssetCacheFuture<'a, Result<Vec<u8>, AssetCacheError>> {
        Box::pin(async move {
            self.entries
                .lock()
                .await
                .get(name)
                .cloned()
                .ok_or_else(|| AssetCacheError::NotFound {
                    name: name.to_string(),
                })
        })
    }
}
