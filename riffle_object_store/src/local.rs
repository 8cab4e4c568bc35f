//! Local file system object stores.
//!
//! The bucket maps to a directory below the configured root. Useful for
//! development without MinIO, and for tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use object_store::{ObjectStore, local::LocalFileSystem};
use snafu::ResultExt;
use tempfile::TempDir;

use crate::{
    BucketStatus, ObjectStoreFactory,
    error::{CreationSnafu, IoSnafu, Result},
    s3::validate_bucket_name,
};

/// Factory for object stores backed by a local directory.
pub struct LocalFileSystemFactory {
    root_path: PathBuf,
    bucket: String,
}

impl LocalFileSystemFactory {
    pub fn new(root_path: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        validate_bucket_name(&bucket)?;

        let root_path = root_path.as_ref();
        let root_path = std::fs::canonicalize(root_path).context(IoSnafu { path: root_path })?;

        Ok(Self { root_path, bucket })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn bucket_path(&self) -> PathBuf {
        self.root_path.join(&self.bucket)
    }
}

#[async_trait::async_trait]
impl ObjectStoreFactory for LocalFileSystemFactory {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn ensure_bucket(&self) -> Result<BucketStatus> {
        let bucket_path = self.bucket_path();

        if bucket_path.is_dir() {
            return Ok(BucketStatus::AlreadyExists);
        }

        std::fs::create_dir_all(&bucket_path).context(IoSnafu { path: &bucket_path })?;

        Ok(BucketStatus::Created)
    }

    async fn create_object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let store = LocalFileSystem::new_with_prefix(self.bucket_path()).context(CreationSnafu {
            store_type: "local",
        })?;

        Ok(Arc::new(store))
    }
}

/// Local object store rooted in a temporary directory removed on drop.
pub struct TemporaryFileSystemFactory {
    _temp_dir: TempDir,
    local_factory: LocalFileSystemFactory,
}

impl TemporaryFileSystemFactory {
    pub fn new(bucket: impl Into<String>) -> Result<Self> {
        let temp_dir = TempDir::new().context(IoSnafu {
            path: std::env::temp_dir(),
        })?;

        let local_factory = LocalFileSystemFactory::new(temp_dir.path(), bucket)?;

        Ok(Self {
            _temp_dir: temp_dir,
            local_factory,
        })
    }

    pub fn root_path(&self) -> &Path {
        self.local_factory.root_path()
    }

    pub fn bucket_path(&self) -> PathBuf {
        self.local_factory.bucket_path()
    }
}

#[async_trait::async_trait]
impl ObjectStoreFactory for TemporaryFileSystemFactory {
    fn bucket(&self) -> &str {
        self.local_factory.bucket()
    }

    async fn ensure_bucket(&self) -> Result<BucketStatus> {
        self.local_factory.ensure_bucket().await
    }

    async fn create_object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        self.local_factory.create_object_store().await
    }
}
