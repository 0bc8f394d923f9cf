use async_trait::async_trait;
use secrecy::SecretString;

use crate::errors::TransformError;

/// API credentials and model selection for the remote service.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: SecretString,
    pub model: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model: model.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .finish()
    }
}

/// Async credential persistence. A load failure is treated the same as
/// "no credentials available" by callers.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credentials>, TransformError>;
    async fn store(&self, credentials: &Credentials) -> Result<(), TransformError>;
}
