use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::{debug, info};

use sparkify_core::config::AwsConfig;

use crate::error::StorageError;
use crate::location::Location;

/// Unified storage backend wrapping object_store.
///
/// All keys passed in and returned are relative to the backend root (the
/// local directory, or the bucket plus configured prefix).
pub enum StorageBackend {
    Local(LocalBackend),
    S3(S3Backend),
}

impl StorageBackend {
    /// Open the backend addressed by `location`. A local root must already
    /// exist.
    pub fn open(location: &Location, aws: &AwsConfig) -> Result<Self, StorageError> {
        match location {
            Location::Local(dir) => Ok(StorageBackend::Local(LocalBackend::new(dir)?)),
            Location::S3 { bucket, prefix } => {
                Ok(StorageBackend::S3(S3Backend::new(bucket, prefix, aws)?))
            }
        }
    }

    /// Like [`open`](Self::open), but creates a missing local root. Used for
    /// output.
    pub fn create(location: &Location, aws: &AwsConfig) -> Result<Self, StorageError> {
        match location {
            Location::Local(dir) => Ok(StorageBackend::Local(LocalBackend::create(dir)?)),
            Location::S3 { .. } => Self::open(location, aws),
        }
    }

    /// Get the underlying ObjectStore.
    pub fn store(&self) -> &dyn ObjectStore {
        match self {
            StorageBackend::Local(b) => b.store.as_ref(),
            StorageBackend::S3(b) => b.store.as_ref(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StorageBackend::S3(_))
    }

    /// Key prefix inside the bucket (empty for local roots).
    pub fn prefix(&self) -> &str {
        match self {
            StorageBackend::Local(_) => "",
            StorageBackend::S3(b) => &b.prefix,
        }
    }

    /// Human-readable root, for logs.
    pub fn describe(&self) -> String {
        match self {
            StorageBackend::Local(b) => b.data_dir.display().to_string(),
            StorageBackend::S3(b) if b.prefix.is_empty() => format!("s3://{}/", b.bucket),
            StorageBackend::S3(b) => format!("s3://{}/{}/", b.bucket, b.prefix),
        }
    }

    /// Absolute object path for a backend-relative key.
    pub fn object_path(&self, key: &str) -> Result<ObjectPath, StorageError> {
        let key = key.trim_matches('/');
        let prefix = self.prefix();
        let full = match (prefix.is_empty(), key.is_empty()) {
            (true, _) => key.to_string(),
            (false, true) => prefix.to_string(),
            (false, false) => format!("{prefix}/{key}"),
        };
        Ok(ObjectPath::parse(full)?)
    }

    /// Strip the backend prefix from a listed object location.
    pub fn relative_key(&self, location: &ObjectPath) -> String {
        let raw = location.as_ref();
        let prefix = self.prefix();
        if prefix.is_empty() {
            return raw.to_string();
        }
        raw.strip_prefix(prefix)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(raw)
            .to_string()
    }

    /// List every object under `prefix`, as sorted relative keys.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if let StorageBackend::Local(local) = self {
            // object_store errors on a missing local directory; treat it as empty.
            if !local.data_dir.join(prefix.trim_matches('/')).exists() {
                return Ok(Vec::new());
            }
        }

        let path = self.object_path(prefix)?;
        let list_root = if path.as_ref().is_empty() { None } else { Some(&path) };

        let mut keys = Vec::new();
        let mut stream = self.store().list(list_root);
        while let Some(meta) = stream.try_next().await? {
            keys.push(self.relative_key(&meta.location));
        }
        keys.sort();
        debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(key)?;
        match self.store().head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(key)?;
        let result = self.store().get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::ObjectStore(other),
        })?;
        Ok(result.bytes().await?)
    }

    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        self.store().put(&path, data.into()).await?;
        Ok(())
    }

    /// Delete everything under `prefix`. Returns the number of objects removed
    /// (local directories are removed wholesale and report 0).
    pub async fn clear(&self, prefix: &str) -> Result<usize, StorageError> {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(StorageError::Other(
                "refusing to clear the storage root".into(),
            ));
        }

        match self {
            StorageBackend::Local(local) => {
                let dir = local.data_dir.join(prefix);
                match std::fs::remove_dir_all(&dir) {
                    Ok(()) => debug!(dir = %dir.display(), "Removed previous output"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(0)
            }
            StorageBackend::S3(_) => {
                let keys = self.list(prefix).await?;
                for key in &keys {
                    let path = self.object_path(key)?;
                    self.store().delete(&path).await?;
                }
                debug!(prefix, removed = keys.len(), "Removed previous output");
                Ok(keys.len())
            }
        }
    }
}

/// Local filesystem backend.
pub struct LocalBackend {
    pub store: Arc<dyn ObjectStore>,
    pub data_dir: PathBuf,
}

impl LocalBackend {
    /// Root a backend at an existing directory.
    pub fn new(data_dir: &std::path::Path) -> Result<Self, StorageError> {
        if !data_dir.is_dir() {
            return Err(StorageError::NotFound(format!(
                "local directory {}",
                data_dir.display()
            )));
        }
        let canonical = std::fs::canonicalize(data_dir)?;
        let store = LocalFileSystem::new_with_prefix(&canonical)?;
        info!("Storage: local backend at {}", canonical.display());
        Ok(Self {
            store: Arc::new(store),
            data_dir: canonical,
        })
    }

    /// Root a backend at `data_dir`, creating the directory if needed.
    pub fn create(data_dir: &std::path::Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        Self::new(data_dir)
    }
}

/// S3 backend.
pub struct S3Backend {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub prefix: String,
}

impl S3Backend {
    pub fn new(bucket: &str, prefix: &str, aws: &AwsConfig) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_region(&aws.region)
            .with_bucket_name(bucket);

        match (&aws.access_key_id, &aws.secret_access_key) {
            (Some(key), Some(secret)) => {
                builder = builder
                    .with_access_key_id(key)
                    .with_secret_access_key(secret);
                if let Some(ref token) = aws.session_token {
                    builder = builder.with_token(token);
                }
            }
            // Public buckets can be read without signing.
            _ => builder = builder.with_skip_signature(true),
        }

        if let Some(ref endpoint) = aws.endpoint_url {
            // object_store requires absolute endpoint URLs
            let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                endpoint.clone()
            } else {
                format!("https://{}", endpoint)
            };
            builder = builder
                .with_endpoint(&endpoint_url)
                .with_allow_http(endpoint_url.starts_with("http://"));
        }

        let store = builder.build()?;
        let prefix = prefix.trim_matches('/').to_string();

        info!(
            "Storage: S3 backend s3://{}/{} (region: {})",
            bucket, prefix, aws.region
        );

        Ok(Self {
            store: Arc::new(store),
            bucket: bucket.to_string(),
            prefix,
        })
    }
}
