use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use reword_core::errors::TransformError;
use reword_core::transport::{Transport, TransportRequest, TransportResponse};

/// Pre-programmed transport replies for deterministic tests without a
/// network.
pub enum MockReply {
    Response(TransportResponse),
    Error(TransformError),
    /// Wait a duration, then yield the inner reply.
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    /// A 200 response carrying `text` in the bare envelope shape.
    pub fn text(text: &str) -> Self {
        Self::Response(TransportResponse::ok(
            serde_json::json!({ "text": text }).to_string(),
        ))
    }

    /// A failed HTTP response.
    pub fn status(status: u16, body: &str) -> Self {
        Self::Response(TransportResponse {
            status,
            body: body.to_string(),
            retry_after: None,
        })
    }

    /// A 429 with a server-specified minimum wait.
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::Response(TransportResponse {
            status: 429,
            body: "rate limited".to_string(),
            retry_after: Some(retry_after),
        })
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delayed(delay, Box::new(inner))
    }
}

/// Transport double that serves queued replies in order and records every
/// request it sees.
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransformError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(request.clone());

        let reply = self.replies.lock().pop_front();
        let Some(mut reply) = reply else {
            return Err(TransformError::Network("no reply configured".into()));
        };

        loop {
            match reply {
                MockReply::Response(resp) => return Ok(resp),
                MockReply::Error(e) => return Err(e),
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
