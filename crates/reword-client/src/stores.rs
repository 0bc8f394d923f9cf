use std::path::PathBuf;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use parking_lot::RwLock;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use reword_core::credentials::{CredentialStore, Credentials};
use reword_core::errors::TransformError;

const NONCE_LEN: usize = 12;

/// In-memory credential store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(Some(credentials)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, TransformError> {
        Ok(self.inner.read().clone())
    }

    async fn store(&self, credentials: &Credentials) -> Result<(), TransformError> {
        *self.inner.write() = Some(credentials.clone());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    api_key: String,
    model: String,
}

/// File-backed credential store. The credential file holds a
/// ChaCha20-Poly1305 ciphertext; the key file sits next to it with 0600
/// permissions.
pub struct FileCredentialStore {
    path: PathBuf,
    key_path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            path: dir.join("credentials"),
            key_path: dir.join("credentials.key"),
        }
    }

    /// Cipher keyed from the key file, creating the key on first use with
    /// 0600 permissions.
    fn cipher(&self) -> Result<ChaCha20Poly1305, TransformError> {
        let key = if self.key_path.exists() {
            let encoded = std::fs::read_to_string(&self.key_path)
                .map_err(|e| TransformError::Auth(format!("key read failed: {e}")))?;
            let bytes = decode_base64(encoded.trim(), "key file")?;
            Key::from_exact_iter(bytes)
                .ok_or_else(|| TransformError::Auth("key file has wrong length".into()))?
        } else {
            let key = ChaCha20Poly1305::generate_key(&mut OsRng);
            if let Some(parent) = self.key_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TransformError::Auth(format!("key dir failed: {e}")))?;
            }
            std::fs::write(&self.key_path, encode_base64(&key))
                .map_err(|e| TransformError::Auth(format!("key write failed: {e}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&self.key_path, std::fs::Permissions::from_mode(0o600))
                    .map_err(|e| TransformError::Auth(format!("key chmod failed: {e}")))?;
            }

            key
        };
        Ok(ChaCha20Poly1305::new(&key))
    }

    /// Base64 payload: fresh random nonce, then the ciphertext.
    fn seal(&self, plaintext: &str) -> Result<String, TransformError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher()?
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| TransformError::Auth("credential encryption failed".into()))?;

        let mut payload = nonce.to_vec();
        payload.extend_from_slice(&sealed);
        Ok(encode_base64(&payload))
    }

    fn open(&self, encoded: &str) -> Result<String, TransformError> {
        let payload = decode_base64(encoded, "credential file")?;
        if payload.len() <= NONCE_LEN {
            return Err(TransformError::Auth("credential file truncated".into()));
        }
        let (nonce, sealed) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| TransformError::Auth("credential decryption failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|_| TransformError::Auth("credential not UTF-8".into()))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, TransformError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let encoded = std::fs::read_to_string(&self.path)
            .map_err(|e| TransformError::Auth(format!("credential read failed: {e}")))?;
        let json = self.open(encoded.trim())?;
        let stored: StoredCredentials = serde_json::from_str(&json)
            .map_err(|e| TransformError::Auth(format!("credential file corrupt: {e}")))?;
        Ok(Some(Credentials::new(stored.api_key, stored.model)))
    }

    async fn store(&self, credentials: &Credentials) -> Result<(), TransformError> {
        let stored = StoredCredentials {
            api_key: credentials.api_key.expose_secret().to_string(),
            model: credentials.model.clone(),
        };
        let json = serde_json::to_string(&stored)
            .map_err(|e| TransformError::Auth(format!("credential encode failed: {e}")))?;
        let encoded = self.seal(&json)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TransformError::Auth(format!("credential dir failed: {e}")))?;
        }
        std::fs::write(&self.path, encoded)
            .map_err(|e| TransformError::Auth(format!("credential write failed: {e}")))
    }
}

fn encode_base64(bytes: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

fn decode_base64(encoded: &str, what: &str) -> Result<Vec<u8>, TransformError> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .map_err(|_| TransformError::Auth(format!("{what} not base64")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::{SystemTime, UNIX_EPOCH};

        static SEQ: AtomicUsize = AtomicUsize::new(0);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "reword-test-creds-{nanos}-{}",
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().await.unwrap().is_none());

        store
            .store(&Credentials::new("key-1", "rewrite-small"))
            .await
            .unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.model, "rewrite-small");
        assert_eq!(loaded.api_key.expose_secret(), "key-1");
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let store = FileCredentialStore::new(temp_dir());
        assert!(store.load().await.unwrap().is_none());

        store
            .store(&Credentials::new("sk-secret", "rewrite-large"))
            .await
            .unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.api_key.expose_secret(), "sk-secret");
        assert_eq!(loaded.model, "rewrite-large");
    }

    #[tokio::test]
    async fn credential_file_is_not_plaintext() {
        let dir = temp_dir();
        let store = FileCredentialStore::new(dir.clone());
        store
            .store(&Credentials::new("sk-should-not-appear", "m"))
            .await
            .unwrap();
        let on_disk = std::fs::read_to_string(dir.join("credentials")).unwrap();
        assert!(!on_disk.contains("sk-should-not-appear"));
    }

    #[test]
    fn seal_open_roundtrip() {
        let store = FileCredentialStore::new(temp_dir());
        let sealed = store.seal("hello credentials").unwrap();
        assert_eq!(store.open(&sealed).unwrap(), "hello credentials");
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let store = FileCredentialStore::new(temp_dir());
        let a = store.seal("same-input").unwrap();
        let b = store.seal("same-input").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.open(&a).unwrap(), store.open(&b).unwrap());
    }

    #[test]
    fn key_file_reused_across_opens() {
        let dir = temp_dir();
        let store = FileCredentialStore::new(dir.clone());
        let sealed = store.seal("persisted").unwrap();

        // A second store over the same dir reads the same key file.
        let again = FileCredentialStore::new(dir);
        assert_eq!(again.open(&sealed).unwrap(), "persisted");
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let store = FileCredentialStore::new(temp_dir());
        let sealed = store.seal("secret").unwrap();

        let other = FileCredentialStore::new(temp_dir());
        let err = other.open(&sealed).unwrap_err();
        assert!(matches!(err, TransformError::Auth(_)));
    }
}
