use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::TransformError;

/// One outbound call to the remote rewriting service.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub endpoint: String,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
    /// Wall-clock ceiling for the whole call. Expiry is a `Network` failure.
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn new(endpoint: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            body,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The raw outcome of a transport call. Non-2xx statuses arrive here too;
/// classification into the error taxonomy happens in the client.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// Server-specified minimum wait, if the response carried one.
    pub retry_after: Option<Duration>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network capability injected into the Transformation Client. The only
/// component allowed to touch the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransformError>;
}
