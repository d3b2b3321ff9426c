use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::asset_cache::{AssetCache, FILESET_ASSET, MODEL_ASSET, MemoryAssetCache};
use shared::bootstrap::{BootstrapError, EngineBootstrap, LOADING_FADE};
use shared::config::AgentConfig;
use shared::fetch::{AssetFetcher, FetchError, FetchFuture};
use shared::inference::{
    CompletionServerFactory, EngineAssets, EngineFactory, EngineFuture, InferenceEngine,
    InferenceError, InferenceOptions, ScriptedEngine,
};
use shared::ports::LoadingIndicator;
use url::Url;

const FILESET: &[u8] = br#"{"loaderPath": "wasm/genai.js", "binaryPath": "wasm/genai.wasm"}"#;
const LOCAL_ORIGIN: &str = "http://localhost/";
const REMOTE_ORIGIN: &str = "https://models.example.test/gemma2/";

#[derive(Default)]
struct FakeFetcher {
    assets: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn with_asset(mut self, url: String, bytes: &[u8]) -> Self {
        self.assets.insert(url, bytes.to_vec());
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .expect("requested lock should not be poisoned")
            .clone()
    }
}

impl AssetFetcher for FakeFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> FetchFuture<'a> {
        Box::pin(async move {
            self.requested
                .lock()
                .expect("requested lock should not be poisoned")
                .push(url.to_string());
            self.assets
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        })
    }
}

#[derive(Default)]
struct FakeFactory {
    fail_with: Option<String>,
    built: Mutex<Vec<(EngineAssets, InferenceOptions)>>,
}

impl FakeFactory {
    fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            built: Mutex::new(Vec::new()),
        }
    }

    fn built_weights(&self) -> Vec<Vec<u8>> {
        self.built
            .lock()
            .expect("built lock should not be poisoned")
            .iter()
            .map(|(assets, _)| assets.weights.clone())
            .collect()
    }
}

impl EngineFactory for FakeFactory {
    fn build<'a>(&'a self, assets: EngineAssets, options: InferenceOptions) -> EngineFuture<'a> {
        Box::pin(async move {
            if let Some(message) = &self.fail_with {
                return Err(InferenceError::Request(message.clone()));
            }
            self.built
                .lock()
                .expect("built lock should not be poisoned")
                .push((assets, options));
            Ok(Arc::new(ScriptedEngine::new(["ok"])) as Arc<dyn InferenceEngine>)
        })
    }
}

#[derive(Default)]
struct RecordingIndicator {
    dismissed: Vec<Duration>,
}

impl LoadingIndicator for RecordingIndicator {
    fn dismiss(&mut self, fade: Duration) {
        self.dismissed.push(fade);
    }
}

fn test_config() -> AgentConfig {
    AgentConfig {
        cache_dir: PathBuf::from("unused"),
        cache_disabled: true,
        local_origin: Url::parse(LOCAL_ORIGIN).expect("local origin should parse"),
        remote_origin: Url::parse(REMOTE_ORIGIN).expect("remote origin should parse"),
        model_file: "gemma2-2b-it-gpu-int8.bin".to_string(),
        fileset_file: "genai-fileset.json".to_string(),
        completion_url: Url::parse("http://localhost:8080/completion")
            .expect("completion url should parse"),
        fetch_timeout: None,
        search_delay: Duration::from_millis(100),
        inference: InferenceOptions::default(),
    }
}

fn local(file: &str) -> String {
    format!("{LOCAL_ORIGIN}{file}")
}

fn remote(file: &str) -> String {
    format!("{REMOTE_ORIGIN}{file}")
}

#[tokio::test]
async fn cache_hit_skips_download() {
    let cache = MemoryAssetCache::new();
    cache.store(FILESET, FILESET_ASSET).await;
    cache.store(b"cached-weights", MODEL_ASSET).await;
    let fetcher = Arc::new(FakeFetcher::default());
    let factory = Arc::new(FakeFactory::default());
    let mut indicator = RecordingIndicator::default();

    let loaded = EngineBootstrap::new(
        &test_config(),
        Arc::new(cache),
        fetcher.clone(),
        factory.clone(),
    )
    .load(&mut indicator)
    .await
    .expect("cached assets should load");

    assert_eq!(loaded.origin.as_str(), LOCAL_ORIGIN);
    assert!(fetcher.requested().is_empty());
    assert_eq!(factory.built_weights(), vec![b"cached-weights".to_vec()]);
    assert_eq!(indicator.dismissed, vec![LOADING_FADE]);
}

#[tokio::test]
async fn cache_miss_downloads_then_stores() {
    let cache = MemoryAssetCache::new();
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with_asset(local("genai-fileset.json"), FILESET)
            .with_asset(local("gemma2-2b-it-gpu-int8.bin"), b"local-weights"),
    );
    let factory = Arc::new(FakeFactory::default());
    let mut indicator = RecordingIndicator::default();

    EngineBootstrap::new(
        &test_config(),
        Arc::new(cache.clone()),
        fetcher.clone(),
        factory.clone(),
    )
    .load(&mut indicator)
    .await
    .expect("downloaded assets should load");

    assert_eq!(
        fetcher.requested(),
        vec![
            local("genai-fileset.json"),
            local("gemma2-2b-it-gpu-int8.bin")
        ]
    );
    assert!(cache.contains(FILESET_ASSET).await);
    assert_eq!(
        cache
            .restore(MODEL_ASSET)
            .await
            .expect("weights should be cached"),
        b"local-weights"
    );
    assert_eq!(factory.built_weights(), vec![b"local-weights".to_vec()]);
}

#[tokio::test]
async fn local_failure_retries_remote_once() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with_asset(remote("genai-fileset.json"), FILESET)
            .with_asset(remote("gemma2-2b-it-gpu-int8.bin"), b"remote-weights"),
    );
    let factory = Arc::new(FakeFactory::default());
    let mut indicator = RecordingIndicator::default();

    let loaded = EngineBootstrap::new(
        &test_config(),
        Arc::new(MemoryAssetCache::new()),
        fetcher.clone(),
        factory.clone(),
    )
    .load(&mut indicator)
    .await
    .expect("remote origin should load");

    assert_eq!(loaded.origin.as_str(), REMOTE_ORIGIN);
    assert_eq!(
        fetcher.requested(),
        vec![
            local("genai-fileset.json"),
            remote("genai-fileset.json"),
            remote("gemma2-2b-it-gpu-int8.bin"),
        ]
    );
    assert_eq!(factory.built_weights(), vec![b"remote-weights".to_vec()]);
    assert_eq!(indicator.dismissed, vec![LOADING_FADE]);
}

#[tokio::test]
async fn remote_failure_is_terminal() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut indicator = RecordingIndicator::default();

    let err = match EngineBootstrap::new(
        &test_config(),
        Arc::new(MemoryAssetCache::new()),
        fetcher.clone(),
        Arc::new(FakeFactory::default()),
    )
    .load(&mut indicator)
    .await
    {
        Ok(_) => panic!("both origins are missing the assets"),
        Err(err) => err,
    };

    assert!(matches!(
        err,
        BootstrapError::Fetch {
            asset: FILESET_ASSET,
            ..
        }
    ));
    assert!(err.to_string().contains("models.example.test"));
    assert_eq!(fetcher.requested().len(), 2);
    assert!(indicator.dismissed.is_empty());
}

#[tokio::test]
async fn engine_failure_without_local_host_is_not_retried() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with_asset(local("genai-fileset.json"), FILESET)
            .with_asset(local("gemma2-2b-it-gpu-int8.bin"), b"local-weights"),
    );
    let mut indicator = RecordingIndicator::default();

    let err = match EngineBootstrap::new(
        &test_config(),
        Arc::new(MemoryAssetCache::new()),
        fetcher.clone(),
        Arc::new(FakeFactory::failing("gpu device lost")),
    )
    .load(&mut indicator)
    .await
    {
        Ok(_) => panic!("engine construction should fail"),
        Err(err) => err,
    };

    assert!(matches!(err, BootstrapError::Engine { .. }));
    assert!(
        fetcher
            .requested()
            .iter()
            .all(|url| url.starts_with(LOCAL_ORIGIN))
    );
    assert!(indicator.dismissed.is_empty());
}

#[tokio::test]
async fn rejected_download_is_not_cached() {
    let config = test_config();
    let cache = MemoryAssetCache::new();
    let factory = Arc::new(CompletionServerFactory::new(config.completion_url.clone()));
    let empty_local = Arc::new(
        FakeFetcher::default()
            .with_asset(local("genai-fileset.json"), FILESET)
            .with_asset(local("gemma2-2b-it-gpu-int8.bin"), b"")
            .with_asset(remote("genai-fileset.json"), FILESET)
            .with_asset(remote("gemma2-2b-it-gpu-int8.bin"), b"remote-weights"),
    );

    let err = match EngineBootstrap::new(
        &config,
        Arc::new(cache.clone()),
        empty_local,
        factory.clone(),
    )
    .load(&mut RecordingIndicator::default())
    .await
    {
        Ok(_) => panic!("empty weights should be rejected"),
        Err(err) => err,
    };

    assert!(matches!(
        err,
        BootstrapError::Engine {
            source: InferenceError::EmptyWeights,
            ..
        }
    ));
    assert!(!cache.contains(MODEL_ASSET).await);
    assert!(!cache.contains(FILESET_ASSET).await);

    let repaired_local = Arc::new(
        FakeFetcher::default()
            .with_asset(local("genai-fileset.json"), FILESET)
            .with_asset(local("gemma2-2b-it-gpu-int8.bin"), b"local-weights"),
    );
    EngineBootstrap::new(
        &config,
        Arc::new(cache.clone()),
        repaired_local.clone(),
        factory,
    )
    .load(&mut RecordingIndicator::default())
    .await
    .expect("next start should download again");

    assert_eq!(repaired_local.requested().len(), 2);
    assert_eq!(
        cache
            .restore(MODEL_ASSET)
            .await
            .expect("accepted weights should be cached"),
        b"local-weights"
    );
}
