//! Local inference boundary: engines stream text fragments for a full
//! transcript prompt, the last fragment carrying `done = true`.

pub mod completion_server;
pub mod scripted;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use completion_server::{CompletionServerEngine, CompletionServerFactory};
pub use scripted::ScriptedEngine;

const FRAGMENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceOptions {
    pub max_tokens: u32,
    pub top_k: u32,
    pub temperature: f32,
    pub random_seed: u64,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            top_k: 1,
            temperature: 0.01,
            random_seed: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub done: bool,
}

impl Fragment {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn last(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Request(String),
    #[error("inference server returned status {0}")]
    Status(u16),
    #[error("inference stream was malformed: {0}")]
    MalformedStream(String),
    #[error("inference stream ended before the final fragment")]
    StreamClosed,
    #[error("runtime support files are invalid: {0}")]
    InvalidFileset(String),
    #[error("model weights are empty")]
    EmptyWeights,
}

pub type FragmentSender = mpsc::Sender<Result<Fragment, InferenceError>>;

/// Receiving half of one streaming generation.
#[derive(Debug)]
pub struct FragmentStream {
    receiver: mpsc::Receiver<Result<Fragment, InferenceError>>,
}

impl FragmentStream {
    pub fn channel() -> (FragmentSender, Self) {
        let (sender, receiver) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        (sender, Self { receiver })
    }

    /// `None` once the engine side has hung up.
    pub async fn next(&mut self) -> Option<Result<Fragment, InferenceError>> {
        self.receiver.recv().await
    }
}

pub trait InferenceEngine: Send + Sync {
    fn generate(&self, prompt: String) -> FragmentStream;
}

/// Runtime support-file bundle, cached as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFileset {
    pub loader_path: String,
    pub binary_path: String,
}

impl RuntimeFileset {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InferenceError> {
        let fileset: Self = serde_json::from_slice(bytes)
            .map_err(|err| InferenceError::InvalidFileset(err.to_string()))?;
        if fileset.loader_path.trim().is_empty() || fileset.binary_path.trim().is_empty() {
            return Err(InferenceError::InvalidFileset(
                "loader and binary paths must not be empty".to_string(),
            ));
        }
        Ok(fileset)
    }
}

#[derive(Debug, Clone)]
pub struct EngineAssets {
    pub fileset: RuntimeFileset,
    pub weights: Vec<u8>,
}

pub type EngineFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Arc<dyn InferenceEngine>, InferenceError>> + Send + 'a>>;

pub trait EngineFactory: Send + Sync {
    fn build<'a>(&'a self, assets: EngineAssets, options: InferenceOptions) -> EngineFuture<'a>;
}
