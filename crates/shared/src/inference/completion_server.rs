use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use super::{
    EngineAssets, EngineFactory, EngineFuture, Fragment, FragmentSender, FragmentStream,
    InferenceEngine, InferenceError, InferenceOptions,
};

/// Streams completions from a local HTTP completion server that speaks
/// server-sent `data: {"content": "...", "stop": false}` lines.
#[derive(Clone)]
pub struct CompletionServerEngine {
    client: reqwest::Client,
    completion_url: Url,
    options: InferenceOptions,
}

impl CompletionServerEngine {
    pub fn new(completion_url: Url, options: InferenceOptions) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| InferenceError::Request(err.to_string()))?;

        Ok(Self {
            client,
            completion_url,
            options,
        })
    }

    async fn stream_completion(&self, prompt: String, sender: &FragmentSender) {
        if let Err(err) = self.try_stream_completion(prompt, sender).await {
            let _ = sender.send(Err(err)).await;
        }
    }

    async fn try_stream_completion(
        &self,
        prompt: String,
        sender: &FragmentSender,
    ) -> Result<(), InferenceError> {
        let request_body = json!({
            "prompt": prompt,
            "n_predict": self.options.max_tokens,
            "top_k": self.options.top_k,
            "temperature": self.options.temperature,
            "seed": self.options.random_seed,
            "stream": true
        });

        let mut response = self
            .client
            .post(self.completion_url.clone())
            .json(&request_body)
            .send()
            .await
            .map_err(|err| InferenceError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Status(status.as_u16()));
        }

        let mut pending = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| InferenceError::Request(err.to_string()))?
        {
            pending.extend_from_slice(&chunk);
            while let Some(newline) = pending.iter().position(|byte| *byte == b'\n') {
                let line = pending.drain(..=newline).collect::<Vec<_>>();
                let Some(fragment) = parse_stream_line(&line)? else {
                    continue;
                };
                let done = fragment.done;
                if sender.send(Ok(fragment)).await.is_err() {
                    debug!("fragment receiver dropped; abandoning completion stream");
                    return Ok(());
                }
                if done {
                    return Ok(());
                }
            }
        }

        if let Some(fragment) = parse_stream_line(&pending)? {
            let done = fragment.done;
            if sender.send(Ok(fragment)).await.is_err() || done {
                return Ok(());
            }
        }

        Err(InferenceError::StreamClosed)
    }
}

impl InferenceEngine for CompletionServerEngine {
    fn generate(&self, prompt: String) -> FragmentStream {
        let (sender, stream) = FragmentStream::channel();
        let engine = self.clone();
        tokio::spawn(async move {
            engine.stream_completion(prompt, &sender).await;
        });
        stream
    }
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
}

fn parse_stream_line(raw: &[u8]) -> Result<Option<Fragment>, InferenceError> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }

    let event: StreamEvent = serde_json::from_str(payload)
        .map_err(|err| InferenceError::MalformedStream(err.to_string()))?;
    Ok(Some(Fragment {
        text: event.content,
        done: event.stop,
    }))
}

/// Builds a [`CompletionServerEngine`] once the runtime files and weights are
/// available locally. The server process loads the same weights file, so the
/// engine only records their identity.
#[derive(Debug, Clone)]
pub struct CompletionServerFactory {
    completion_url: Url,
}

impl CompletionServerFactory {
    pub fn new(completion_url: Url) -> Self {
        Self { completion_url }
    }
}

impl EngineFactory for CompletionServerFactory {
    fn build<'a>(&'a self, assets: EngineAssets, options: InferenceOptions) -> EngineFuture<'a> {
        Box::pin(async move {
            if assets.weights.is_empty() {
                return Err(InferenceError::EmptyWeights);
            }

            let digest = Sha256::digest(&assets.weights);
            let short_digest = digest
                .iter()
                .take(6)
                .map(|byte| format!("{byte:02x}"))
                .collect::<String>();
            info!(
                loader = %assets.fileset.loader_path,
                weights_bytes = assets.weights.len(),
                weights_digest = %short_digest,
                completion_url = %self.completion_url,
                "inference engine ready"
            );

            let engine = CompletionServerEngine::new(self.completion_url.clone(), options)?;
            Ok(Arc::new(engine) as Arc<dyn InferenceEngine>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::parse_stream_line;
    use crate::inference::{Fragment, InferenceError};

    #[test]
    fn parses_server_sent_data_lines() {
        let fragment = parse_stream_line(b"data: {\"content\":\"Hel\",\"stop\":false}\n")
            .expect("line should parse");

        assert_eq!(fragment, Some(Fragment::partial("Hel")));
    }

    #[test]
    fn final_line_marks_fragment_done() {
        let fragment =
            parse_stream_line(b"data: {\"content\":\"\",\"stop\":true,\"tokens_predicted\":12}")
                .expect("line should parse");

        assert_eq!(fragment, Some(Fragment::last("")));
    }

    #[test]
    fn ignores_blank_and_comment_lines() {
        assert_eq!(parse_stream_line(b"\n").expect("blank line"), None);
        assert_eq!(parse_stream_line(b": keep-alive\n").expect("comment"), None);
    }

    #[test]
    fn rejects_malformed_payloads() {
        let err = parse_stream_line(b"data: {not json}\n").expect_err("payload must fail");

        assert!(matches!(err, InferenceError::MalformedStream(_)));
    }
}
