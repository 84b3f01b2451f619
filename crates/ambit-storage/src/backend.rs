use ambit_config::schema::StorageConfig;
use ambit_core::{AmbitError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Moves raw (already encrypted) record bytes to and from a location.
///
/// `save` must replace the record atomically: a concurrent `load` observes
/// either the previous bytes or the new bytes, never a mix.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read a record. `Ok(None)` when it has never been written.
    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Replace a record.
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Pick the backend for the configured location: an object store when a
/// bucket URL is set, the local filesystem otherwise.
pub fn backend_for(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.bucket_url {
        Some(ref url) => Arc::new(ObjectStorage::new(url)?),
        None => Arc::new(LocalStorage::new(".")),
    };
    info!(backend = %backend.describe(), "storage backend selected");
    Ok(backend)
}

// ── Local filesystem ───────────────────────────────────────────

/// Records stored as files below a root directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a logical path below the root. Absolute paths name an
    /// operator-chosen location and are used as given. `.` and `..` are
    /// refused in both forms.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let logical = Path::new(path);
        let normal = logical
            .components()
            .skip_while(|c| logical.is_absolute() && matches!(c, Component::Prefix(_) | Component::RootDir))
            .try_fold(0usize, |n, c| matches!(c, Component::Normal(_)).then_some(n + 1));
        if !matches!(normal, Some(n) if n > 0) {
            return Err(AmbitError::storage(path, "path must be normalized and name a file"));
        }
        Ok(self.root.join(logical))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AmbitError::storage(path, e)),
        }
    }

    async fn save(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        let bytes = bytes.to_vec();
        let logical = path.to_string();

        // Write a sibling temp file, then rename it over the target.
        tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = full.parent().unwrap_or(Path::new("."));
            std::fs::create_dir_all(dir).map_err(|e| AmbitError::storage(&logical, e))?;
            let mut tmp = tempfile::NamedTempFile::new_in(dir)
                .map_err(|e| AmbitError::storage(&logical, e))?;
            tmp.write_all(&bytes)
                .map_err(|e| AmbitError::storage(&logical, e))?;
            tmp.as_file()
                .sync_all()
                .map_err(|e| AmbitError::storage(&logical, e))?;
            tmp.persist(&full)
                .map_err(|e| AmbitError::storage(&logical, e.error))?;
            debug!(path = %full.display(), "record replaced");
            Ok(())
        })
        .await
        .map_err(|e| AmbitError::storage(path, format!("write task failed: {e}")))?
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}

// ── Object store ───────────────────────────────────────────────

/// Records stored as objects below a bucket URL, addressed with plain
/// `GET`/`PUT`. Object replacement is atomic on the store side.
pub struct ObjectStorage {
    client: reqwest::Client,
    base_url: String,
}

impl ObjectStorage {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AmbitError::Config(format!(
                "storage bucket URL must be http(s): {base_url}"
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .client
            .get(self.object_url(path))
            .send()
            .await
            .map_err(|e| AmbitError::storage(path, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(AmbitError::storage(
                path,
                format!("object store returned HTTP {}", resp.status()),
            ));
        }
        let bytes = resp.bytes().await.map_err(|e| AmbitError::storage(path, e))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn save(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let resp = self
            .client
            .put(self.object_url(path))
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| AmbitError::storage(path, e))?;

        if !resp.status().is_success() {
            return Err(AmbitError::storage(
                path,
                format!("object store returned HTTP {}", resp.status()),
            ));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("object:{}", self.base_url)
    }
}

// ── In-memory ──────────────────────────────────────────────────

/// Process-local backend, used by tests and offline composition.
#[derive(Default)]
pub struct MemoryStorage {
    records: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored bytes, bypassing decryption.
    pub fn raw(&self, path: &str) -> Option<Vec<u8>> {
        self.records.get(path).map(|r| r.value().clone())
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.raw(path))
    }

    async fn save(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.records.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        assert!(store.load("storage/site.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_save_creates_dirs_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        store.save("storage/site.bin", b"first").await.unwrap();
        store.save("storage/site.bin", b"second").await.unwrap();
        assert_eq!(
            store.load("storage/site.bin").await.unwrap().unwrap(),
            b"second"
        );
        // Only the record itself remains; no temp files left behind.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("storage"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn local_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        assert!(store.load("../outside.bin").await.is_err());
        assert!(store.load("storage/../../outside.bin").await.is_err());
        assert!(store.save("/var/lib/../../etc/passwd", b"x").await.is_err());
        assert!(store.load("/").await.is_err());
        assert!(store.load("").await.is_err());
    }

    #[tokio::test]
    async fn local_accepts_absolute_operator_paths() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("ambit").join("site.bin");
        let target = target.to_str().unwrap();

        let store = LocalStorage::new(root.path());
        store.save(target, b"record").await.unwrap();
        assert_eq!(store.load(target).await.unwrap().unwrap(), b"record");
        assert!(elsewhere.path().join("ambit/site.bin").exists());
        assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
    }

    #[test]
    fn object_storage_requires_http_url() {
        assert!(ObjectStorage::new("s3://bucket").is_err());
        let store = ObjectStorage::new("https://storage.example.com/bucket/").unwrap();
        assert_eq!(
            store.object_url("storage/site.bin"),
            "https://storage.example.com/bucket/storage/site.bin"
        );
    }

    #[test]
    fn backend_selection() {
        let config = StorageConfig::default();
        assert!(backend_for(&config).unwrap().describe().starts_with("local:"));

        let config = StorageConfig {
            bucket_url: Some("https://storage.example.com/b".into()),
            ..Default::default()
        };
        assert_eq!(
            backend_for(&config).unwrap().describe(),
            "object:https://storage.example.com/b"
        );
    }
}
