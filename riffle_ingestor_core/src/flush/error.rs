use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::Snafu;

/// Where in the flush sequence an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStage {
    Serialize,
    Upload,
    Cleanup,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FlushError {
    #[snafu(display("Failed to build record batch for table {table}"))]
    RecordBatch { table: String, source: ArrowError },
    #[snafu(display("Failed to encode parquet file for table {table}"))]
    Parquet { table: String, source: ParquetError },
    #[snafu(display("Failed to write staging file {}", path.display()))]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to upload {key}, staging file kept at {}", path.display()))]
    Upload {
        key: String,
        path: PathBuf,
        source: object_store::Error,
    },
    #[snafu(display("Failed to remove staging file {}", path.display()))]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FlushError {
    pub fn stage(&self) -> FlushStage {
        match self {
            Self::RecordBatch { .. } | Self::Parquet { .. } | Self::Staging { .. } => {
                FlushStage::Serialize
            }
            Self::Upload { .. } => FlushStage::Upload,
            Self::Cleanup { .. } => FlushStage::Cleanup,
        }
    }
}

impl FlushStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushStage::Serialize => "serialize",
            FlushStage::Upload => "upload",
            FlushStage::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for FlushStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
