use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Failed to create {store_type} object store"))]
    Creation {
        store_type: &'static str,
        source: object_store::Error,
    },
    #[snafu(display("Invalid bucket name {bucket:?}: {message}"))]
    InvalidBucketName { bucket: String, message: String },
    #[snafu(display("Failed to check bucket {bucket}"))]
    HeadBucket {
        bucket: String,
        source: aws_sdk_s3::Error,
    },
    #[snafu(display("Failed to create bucket {bucket}"))]
    CreateBucket {
        bucket: String,
        source: aws_sdk_s3::Error,
    },
    #[snafu(display("IO error on {}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
