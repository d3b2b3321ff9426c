use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::asset_cache::{AssetCache, FILESET_ASSET, MODEL_ASSET};
use crate::config::AgentConfig;
use crate::fetch::{AssetFetcher, FetchError};
use crate::inference::{
    EngineAssets, EngineFactory, InferenceEngine, InferenceError, InferenceOptions,
    RuntimeFileset,
};
use crate::ports::LoadingIndicator;

pub const LOADING_FADE: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid asset url for {file} under {origin}: {message}")]
    AssetUrl {
        origin: String,
        file: String,
        message: String,
    },
    #[error("failed to download {asset}: {source}")]
    Fetch {
        asset: &'static str,
        #[source]
        source: FetchError,
    },
    // Origin stays out of the message so only transport failures name the host.
    #[error("failed to start inference engine: {source}")]
    Engine {
        origin: String,
        #[source]
        source: InferenceError,
    },
}

pub struct LoadedEngine {
    pub engine: Arc<dyn InferenceEngine>,
    pub origin: Url,
}

struct AssetBytes {
    bytes: Vec<u8>,
    fetched: bool,
}

/// Loads the runtime files and model weights, cache first, then builds the
/// inference engine. The local origin is tried first; a failure that names
/// the local host is retried once against the remote origin.
pub struct EngineBootstrap {
    cache: Arc<dyn AssetCache>,
    fetcher: Arc<dyn AssetFetcher>,
    factory: Arc<dyn EngineFactory>,
    local_origin: Url,
    remote_origin: Url,
    fileset_file: String,
    model_file: String,
    options: InferenceOptions,
}

impl EngineBootstrap {
    pub fn new(
        config: &AgentConfig,
        cache: Arc<dyn AssetCache>,
        fetcher: Arc<dyn AssetFetcher>,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            factory,
            local_origin: config.local_origin.clone(),
            remote_origin: config.remote_origin.clone(),
            fileset_file: config.fileset_file.clone(),
            model_file: config.model_file.clone(),
            options: config.inference,
        }
    }

    pub async fn load(
        &self,
        indicator: &mut dyn LoadingIndicator,
    ) -> Result<LoadedEngine, BootstrapError> {
        let loaded = match self.load_from(&self.local_origin).await {
            Ok(engine) => LoadedEngine {
                engine,
                origin: self.local_origin.clone(),
            },
            Err(err) if self.is_local_origin_failure(&err) => {
                warn!("local model origin unavailable, retrying remote origin: {err}");
                let engine = self.load_from(&self.remote_origin).await?;
                LoadedEngine {
                    engine,
                    origin: self.remote_origin.clone(),
                }
            }
            Err(err) => return Err(err),
        };

        info!(origin = %loaded.origin, "inference engine loaded");
        indicator.dismiss(LOADING_FADE);
        Ok(loaded)
    }

    async fn load_from(&self, origin: &Url) -> Result<Arc<dyn InferenceEngine>, BootstrapError> {
        let fileset_asset = self
            .cached_or_fetch(FILESET_ASSET, origin, &self.fileset_file)
            .await?;
        let fileset = RuntimeFileset::from_bytes(&fileset_asset.bytes).map_err(|source| {
            BootstrapError::Engine {
                origin: origin.to_string(),
                source,
            }
        })?;
        let weights_asset = self
            .cached_or_fetch(MODEL_ASSET, origin, &self.model_file)
            .await?;
        // Downloads are only cached once the engine has accepted them.
        let downloaded_weights = weights_asset.fetched.then(|| weights_asset.bytes.clone());

        let engine = self
            .factory
            .build(
                EngineAssets {
                    fileset,
                    weights: weights_asset.bytes,
                },
                self.options,
            )
            .await
            .map_err(|source| BootstrapError::Engine {
                origin: origin.to_string(),
                source,
            })?;

        if fileset_asset.fetched {
            self.cache.store(&fileset_asset.bytes, FILESET_ASSET).await;
        }
        if let Some(weights) = downloaded_weights {
            self.cache.store(&weights, MODEL_ASSET).await;
        }
        Ok(engine)
    }

    async fn cached_or_fetch(
        &self,
        asset: &'static str,
        origin: &Url,
        file: &str,
    ) -> Result<AssetBytes, BootstrapError> {
        match self.cache.restore(asset).await {
            Ok(bytes) => {
                return Ok(AssetBytes {
                    bytes,
                    fetched: false,
                });
            }
            Err(err) if err.is_not_found() => debug!(asset, "model cache miss"),
            Err(err) => warn!(asset, "model cache unreadable, downloading instead: {err}"),
        }

        let url = origin
            .join(file)
            .map_err(|err| BootstrapError::AssetUrl {
                origin: origin.to_string(),
                file: file.to_string(),
                message: err.to_string(),
            })?;
        let bytes = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|source| BootstrapError::Fetch { asset, source })?;

        Ok(AssetBytes {
            bytes,
            fetched: true,
        })
    }

    fn is_local_origin_failure(&self, err: &BootstrapError) -> bool {
        match self.local_origin.host_str() {
            Some(host) if !host.is_empty() => err.to_string().contains(host),
            _ => false,
        }
    }
}
