use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, info};

use crate::error::StorageError;

/// Binary file storage as the tools see it: write a blob, read it back,
/// or hand out a URL the caller can fetch.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// A retrieval URL for the blob. Local backends return a `file://`
    /// URL; S3 returns the key-addressed object URL.
    async fn signed_url(&self, key: &str) -> Result<String, StorageError>;
}

enum UrlBase {
    Local(std::path::PathBuf),
    S3 { bucket: String, region: String },
    Memory,
}

/// Unified blob backend wrapping object_store.
pub struct BlobBackend {
    store: Arc<dyn ObjectStore>,
    url_base: UrlBase,
}

impl BlobBackend {
    /// Local filesystem backend rooted at `data_dir`.
    pub fn local(data_dir: &FsPath) -> Result<Self, StorageError> {
        let canonical =
            std::fs::canonicalize(data_dir).unwrap_or_else(|_| data_dir.to_path_buf());
        let store = LocalFileSystem::new_with_prefix(&canonical)
            .map_err(|e| StorageError::Other(format!("local filesystem error: {e}")))?;
        info!("blob storage: local backend at {}", canonical.display());
        Ok(Self {
            store: Arc::new(store),
            url_base: UrlBase::Local(canonical),
        })
    }

    /// S3 backend. Credentials are resolved from the environment.
    pub fn s3(bucket: &str, region: &str) -> Result<Self, StorageError> {
        if bucket.is_empty() {
            return Err(StorageError::NotConfigured("S3 bucket not set".into()));
        }
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()?;
        info!(bucket = %bucket, region = %region, "blob storage: S3 backend");
        Ok(Self {
            store: Arc::new(store),
            url_base: UrlBase::S3 {
                bucket: bucket.to_string(),
                region: region.to_string(),
            },
        })
    }

    /// In-memory backend for tests.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            url_base: UrlBase::Memory,
        }
    }
}

#[async_trait]
impl BlobStore for BlobBackend {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = Path::from(key);
        debug!(key = %key, bytes = data.len(), "blob put");
        self.store.put(&path, data.into()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = Path::from(key);
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?)
    }

    async fn signed_url(&self, key: &str) -> Result<String, StorageError> {
        // Verify the blob exists before handing out a URL.
        self.store.head(&Path::from(key)).await?;

        Ok(match &self.url_base {
            UrlBase::Local(root) => format!("file://{}/{}", root.display(), key),
            UrlBase::S3 { bucket, region } => {
                format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
            }
            UrlBase::Memory => format!("memory://{key}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get() {
        let blobs = BlobBackend::memory();
        blobs
            .put("documents/U1/doc-1.pdf", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        let data = blobs.get("documents/U1/doc-1.pdf").await.unwrap();
        assert_eq!(&data[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_signed_url_requires_existing_blob() {
        let blobs = BlobBackend::memory();
        assert!(blobs.signed_url("documents/U1/missing.pdf").await.is_err());

        blobs
            .put("documents/U1/doc-1.pdf", Bytes::from_static(b"x"))
            .await
            .unwrap();
        let url = blobs.signed_url("documents/U1/doc-1.pdf").await.unwrap();
        assert_eq!(url, "memory://documents/U1/doc-1.pdf");
    }

    #[tokio::test]
    async fn test_local_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobBackend::local(dir.path()).unwrap();
        blobs
            .put("reports/r1.txt", Bytes::from_static(b"Bericht"))
            .await
            .unwrap();
        let data = blobs.get("reports/r1.txt").await.unwrap();
        assert_eq!(&data[..], b"Bericht");

        let url = blobs.signed_url("reports/r1.txt").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("reports/r1.txt"));
    }
}
