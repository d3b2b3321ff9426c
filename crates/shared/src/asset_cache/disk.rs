use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{AssetCache, AssetCacheError, AssetCacheFuture, MODEL_PARTITION};

/// Stores each asset as one file inside `<root>/models/`.
#[derive(Debug, Clone)]
pub struct DiskAssetCache {
    partition_dir: PathBuf,
}

impl DiskAssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            partition_dir: root.into().join(MODEL_PARTITION),
        }
    }

    pub fn partition_dir(&self) -> &Path {
        &self.partition_dir
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.partition_dir
            .join(format!("{}.blob", hashed_name(name)))
    }

    async fn write_blob(&self, blob: &[u8], name: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.partition_dir).await?;

        // Readers only ever see a complete blob; concurrent writers race on the rename.
        let final_path = self.blob_path(name);
        let temp_path = self
            .partition_dir
            .join(format!("{}.{}.tmp", hashed_name(name), Uuid::new_v4()));
        if let Err(err) = fs::write(&temp_path, blob).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err);
        }
        if let Err(err) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err);
        }

        Ok(())
    }
}

impl AssetCache for DiskAssetCache {
    fn store<'a>(&'a self, blob: &'a [u8], name: &'a str) -> AssetCacheFuture<'a, ()> {
        Box::pin(async move {
            let started = Instant::now();
            match self.write_blob(blob, name).await {
                Ok(()) => info!(
                    asset = name,
                    bytes = blob.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "model asset cached"
                ),
                Err(err) => error!(asset = name, "failed to cache model asset: {err}"),
            }
        })
    }

    fn restore<'a>(
        &'a self,
        name: &'a str,
    ) -> AssetCacheFuture<'a, Result<Vec<u8>, AssetCacheError>> {
        Box::pin(async move {
            let started = Instant::now();
            let bytes = fs::read(self.blob_path(name))
                .await
                .map_err(|source| match source.kind() {
                    ErrorKind::NotFound => AssetCacheError::NotFound {
                        name: name.to_string(),
                    },
                    _ => AssetCacheError::Io {
                        name: name.to_string(),
                        source,
                    },
                })?;

            debug!(
                asset = name,
                bytes = bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "cached model asset restored"
            );
            Ok(bytes)
        })
    }
}

fn hashed_name(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    to_lower_hex(&digest)
}

fn to_lower_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
