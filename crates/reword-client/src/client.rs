use std::sync::Arc;
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use futures::stream;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use reword_core::chunk::Chunk;
use reword_core::credentials::Credentials;
use reword_core::errors::TransformError;
use reword_core::policy::DirectiveBundle;
use reword_core::transport::{Transport, TransportRequest};

use crate::envelope::{extract_error_message, parse_envelope};
use crate::prompt::build_prompt;
use crate::retry::{retry_delay, RetryConfig};

/// Configuration for the transformation client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub endpoint: String,
    pub temperature: f64,
    pub request_timeout: Duration,
    /// Fixed fan-out width for chunk dispatch.
    pub concurrency: usize,
    /// Upper bound a chunk body may have. A chunk over this after
    /// segmentation signals misconfiguration and is never sent.
    pub max_chunk_chars: usize,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            temperature: 0.3,
            request_timeout: Duration::from_secs(60),
            concurrency: 3,
            max_chunk_chars: 6_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Outcome of one chunk's transformation attempt chain.
#[derive(Clone, Debug)]
pub struct TransformResult {
    pub chunk_index: usize,
    pub output: Result<String, TransformError>,
}

impl TransformResult {
    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }
}

/// Ordered per-chunk results for one batch.
#[derive(Clone, Debug, Default)]
pub struct TransformOutcome {
    pub results: Vec<TransformResult>,
}

impl TransformOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &TransformError)> {
        self.results
            .iter()
            .filter_map(|r| r.output.as_ref().err().map(|e| (r.chunk_index, e)))
    }
}

/// Executes transformation batches against an injected transport:
/// builds per-chunk prompts, classifies failures, retries retryable ones
/// with backoff, and yields results in original chunk order.
///
/// Never touches the document; its only side effect is the network.
pub struct TransformClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl TransformClient {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Transform all chunks, collecting ordered results. A failed chunk
    /// never aborts the rest of the batch.
    pub async fn transform(
        &self,
        chunks: Vec<Chunk>,
        bundle: &DirectiveBundle,
        credentials: &Credentials,
    ) -> TransformOutcome {
        let results = self
            .transform_stream(chunks, bundle, credentials)
            .collect()
            .await;
        TransformOutcome { results }
    }

    /// Transform chunks with bounded fan-out, yielding results strictly in
    /// original chunk order: a completion is buffered until all of its
    /// predecessors have been yielded.
    pub fn transform_stream<'a>(
        &'a self,
        chunks: Vec<Chunk>,
        bundle: &'a DirectiveBundle,
        credentials: &'a Credentials,
    ) -> impl Stream<Item = TransformResult> + Send + 'a {
        let width = self.config.concurrency.max(1);
        stream::iter(chunks)
            .map(move |chunk| async move {
                let chunk_index = chunk.index;
                let output = self.transform_chunk(&chunk, bundle, credentials).await;
                TransformResult {
                    chunk_index,
                    output,
                }
            })
            .buffered(width)
    }

    /// One chunk's attempt chain: guard, send, classify, retry.
    async fn transform_chunk(
        &self,
        chunk: &Chunk,
        bundle: &DirectiveBundle,
        credentials: &Credentials,
    ) -> Result<String, TransformError> {
        let body_len = chunk.body_len();
        if body_len > self.config.max_chunk_chars {
            return Err(TransformError::TextTooLong {
                limit: self.config.max_chunk_chars,
                actual: body_len,
            });
        }

        let prompt = build_prompt(chunk, bundle);
        let body = serde_json::json!({
            "model": credentials.model,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut last_error = TransformError::Network("no attempt made".into());
        for attempt in 0..=self.config.retry.max_retries {
            let request = TransportRequest::new(&self.config.endpoint, body.clone())
                .header(
                    "authorization",
                    format!("Bearer {}", credentials.api_key.expose_secret()),
                )
                .timeout(self.config.request_timeout);

            let error = match self.transport.send(&request).await {
                Ok(resp) if resp.is_success() => {
                    debug!(chunk_index = chunk.index, attempt, "chunk rewritten");
                    return parse_envelope(&resp.body);
                }
                Ok(resp) => {
                    let message =
                        extract_error_message(&resp.body).unwrap_or_else(|| resp.body.clone());
                    TransformError::from_status(resp.status, message, resp.retry_after)
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt == self.config.retry.max_retries {
                warn!(
                    chunk_index = chunk.index,
                    attempt,
                    error = %error,
                    kind = error.error_kind(),
                    "chunk failed"
                );
                return Err(error);
            }

            let delay = retry_delay(&self.config.retry, attempt, error.suggested_delay());
            warn!(
                chunk_index = chunk.index,
                attempt = attempt + 1,
                max_retries = self.config.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after error"
            );
            last_error = error;
            tokio::time::sleep(delay).await;
        }

        Err(last_error)
    }
}
