mod client;
mod envelope;
mod http;
mod mock;
mod prompt;
mod retry;
mod stores;

pub use client::{ClientConfig, TransformClient, TransformOutcome, TransformResult};
pub use envelope::{extract_error_message, parse_envelope};
pub use http::HttpTransport;
pub use mock::{MockReply, MockTransport};
pub use prompt::build_prompt;
pub use retry::{retry_delay, RetryConfig};
pub use stores::{FileCredentialStore, MemoryCredentialStore};
