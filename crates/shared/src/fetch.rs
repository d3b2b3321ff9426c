use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tracing::info;
use url::Url;

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, FetchError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build asset http client: {0}")]
    HttpClient(String),
    #[error("asset request to {url} failed: {message}")]
    Unreachable { url: String, message: String },
    #[error("asset request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read asset body from {url}: {message}")]
    Body { url: String, message: String },
}

pub trait AssetFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a Url) -> FetchFuture<'a>;
}

#[derive(Clone)]
pub struct HttpAssetFetcher {
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    /// `timeout` of `None` leaves downloads unbounded.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| FetchError::HttpClient(err.to_string()))?;

        Ok(Self { client })
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> FetchFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|err| FetchError::Unreachable {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await.map_err(|err| FetchError::Body {
                url: url.to_string(),
                message: err.to_string(),
            })?;

            info!(url = %url, bytes = body.len(), "downloaded model asset");
            Ok(body.to_vec())
        })
    }
}
