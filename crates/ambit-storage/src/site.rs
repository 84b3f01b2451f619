use crate::secure::SecureStorage;
use ambit_core::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// The site configuration document: one key/value namespace per plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteData {
    #[serde(default)]
    pub plugins: BTreeMap<String, BTreeMap<String, String>>,
}

impl SiteData {
    pub fn get(&self, plugin: &str, key: &str) -> Option<&str> {
        self.plugins.get(plugin)?.get(key).map(String::as_str)
    }
}

/// Cached view of the site record, written through [`SecureStorage`].
///
/// Reads are served from memory. Each write replaces the whole record, and
/// writes are committed one at a time so no update is lost.
pub struct SiteStore {
    storage: Arc<SecureStorage>,
    path: String,
    cache: RwLock<SiteData>,
    commit: tokio::sync::Mutex<()>,
}

impl SiteStore {
    /// Load the record at `path`. A record that was never written starts
    /// empty; one that cannot be decrypted is an error.
    pub async fn load(storage: Arc<SecureStorage>, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let data = match storage.get_json::<SiteData>(&path).await {
            Ok(data) => {
                info!(path = %path, plugins = data.plugins.len(), "site record loaded");
                data
            }
            Err(e) if e.is_not_found() => {
                info!(path = %path, "no site record yet, starting empty");
                SiteData::default()
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            storage,
            path,
            cache: RwLock::new(data),
            commit: tokio::sync::Mutex::new(()),
        })
    }

    pub fn get(&self, plugin: &str, key: &str) -> Option<String> {
        self.cache.read().get(plugin, key).map(str::to_string)
    }

    pub fn snapshot(&self) -> SiteData {
        self.cache.read().clone()
    }

    /// Set `plugin.key = value` and persist the full record.
    pub async fn put(&self, plugin: &str, key: &str, value: &str) -> Result<()> {
        let _commit = self.commit.lock().await;
        let mut next = self.cache.read().clone();
        next.plugins
            .entry(plugin.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.storage.put_json(&self.path, &next).await?;
        *self.cache.write() = next;
        debug!(plugin, key, "site value stored");
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStorage;

    fn secure(backend: Arc<MemoryStorage>) -> Arc<SecureStorage> {
        Arc::new(SecureStorage::new(backend, "site-key").unwrap())
    }

    #[tokio::test]
    async fn fresh_store_is_empty() {
        let store = SiteStore::load(secure(Arc::new(MemoryStorage::new())), "storage/site.bin")
            .await
            .unwrap();
        assert_eq!(store.snapshot(), SiteData::default());
        assert!(store.get("login", "last_login").is_none());
    }

    #[tokio::test]
    async fn values_persist_across_reload() {
        let backend = Arc::new(MemoryStorage::new());
        let store = SiteStore::load(secure(backend.clone()), "storage/site.bin")
            .await
            .unwrap();
        store.put("login", "last_login", "2026-01-01T00:00:00Z").await.unwrap();
        store.put("hello", "greeting", "hi").await.unwrap();

        let reloaded = SiteStore::load(secure(backend), "storage/site.bin")
            .await
            .unwrap();
        assert_eq!(
            reloaded.get("login", "last_login").as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(reloaded.get("hello", "greeting").as_deref(), Some("hi"));
        assert!(reloaded.get("hello", "last_login").is_none());
    }

    #[tokio::test]
    async fn wrong_key_fails_load() {
        let backend = Arc::new(MemoryStorage::new());
        let store = SiteStore::load(secure(backend.clone()), "s").await.unwrap();
        store.put("p", "k", "v").await.unwrap();

        let other = Arc::new(SecureStorage::new(backend, "other-key").unwrap());
        assert!(SiteStore::load(other, "s").await.is_err());
    }
}
