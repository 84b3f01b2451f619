use crate::backend::StorageBackend;
use crate::cipher::Cipher;
use ambit_core::{AmbitError, Result};
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Encrypted record storage over a swappable backend.
///
/// Records are whole-value: `put` replaces, `get` returns the last complete
/// `put`. Writes to the same path are serialized; different paths proceed
/// independently.
pub struct SecureStorage {
    backend: Arc<dyn StorageBackend>,
    cipher: Cipher,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl SecureStorage {
    pub fn new(backend: Arc<dyn StorageBackend>, secret: &str) -> Result<Self> {
        Ok(Self {
            backend,
            cipher: Cipher::new(secret)?,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Fetch and decrypt a record.
    ///
    /// Returns [`AmbitError::NotFound`] for a path that was never written and
    /// [`AmbitError::Decryption`] when the stored bytes do not open under the
    /// current key.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let sealed = self
            .backend
            .load(path)
            .await?
            .ok_or_else(|| AmbitError::NotFound(path.to_string()))?;
        self.cipher.open(&sealed)
    }

    /// Encrypt and store a record, replacing any previous value.
    pub async fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;
        let sealed = self.cipher.seal(data)?;
        self.backend.save(path, &sealed).await?;
        debug!(path, bytes = data.len(), "secure record written");
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.get(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(path, &bytes).await
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }
}
