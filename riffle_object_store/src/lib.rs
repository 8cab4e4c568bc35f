//! Object store construction and bucket provisioning.
//!
//! The ingestion pipeline only ever talks to an [`ObjectStore`] scoped to a
//! single bucket. This crate builds that client from runtime configuration
//! and makes sure the bucket exists before the first upload.
//!
//! Two backends are provided:
//!
//! - [`S3StoreFactory`] for AWS S3 and S3-compatible services such as MinIO.
//! - [`LocalFileSystemFactory`] which maps the bucket to a directory, plus
//!   [`TemporaryFileSystemFactory`] for tests and local experiments.

pub mod error;
pub mod local;
pub mod paths;
pub mod s3;

use std::sync::Arc;

use object_store::ObjectStore;

pub use error::{Result, StoreError};
pub use local::{LocalFileSystemFactory, TemporaryFileSystemFactory};
pub use s3::{S3StoreFactory, S3StoreOptions};

/// Outcome of making sure the destination bucket exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    /// The bucket was created by this call.
    Created,
    /// The bucket was already there (possibly created concurrently by us).
    AlreadyExists,
}

/// Creates object store clients for one configured bucket.
#[async_trait::async_trait]
pub trait ObjectStoreFactory: Send + Sync {
    /// The name of the bucket this factory writes to.
    fn bucket(&self) -> &str;

    /// Creates the bucket if it doesn't exist yet.
    ///
    /// Calling this more than once is safe and never creates a second bucket.
    async fn ensure_bucket(&self) -> Result<BucketStatus>;

    /// Creates an object store client rooted at the bucket.
    async fn create_object_store(&self) -> Result<Arc<dyn ObjectStore>>;
}
