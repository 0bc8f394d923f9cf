use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use reword_core::errors::TransformError;
use reword_core::transport::{Transport, TransportRequest, TransportResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport. The per-call wall-clock timeout comes from
/// the request; expiry surfaces as a `Network` failure so the retry
/// policy applies.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransformError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransformError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransformError> {
        let mut req = self
            .client
            .post(&request.endpoint)
            .timeout(request.timeout)
            .header("content-type", "application/json");
        for (name, value) in &request.headers {
            req = req.header(name, value);
        }

        let resp = req.json(&request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransformError::Network(format!("timeout after {:?}", request.timeout))
            } else {
                TransformError::Network(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = resp
            .text()
            .await
            .map_err(|e| TransformError::Network(e.to_string()))?;

        Ok(TransportResponse {
            status,
            body,
            retry_after,
        })
    }
}
