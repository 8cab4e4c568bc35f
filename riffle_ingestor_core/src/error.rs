use snafu::Snafu;

use crate::{flush::FlushError, source::SourceError};

/// Errors that stop an ingestion run.
///
/// Per-record and per-batch problems never end up here: they are logged and
/// the loop moves on. These errors are reported only after the loop drained
/// its buffers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestorError {
    #[snafu(display("Invalid ingestor options: {message}"))]
    InvalidOptions { message: String },
    #[snafu(display("Record source failed during {operation}"))]
    Source {
        operation: &'static str,
        source: SourceError,
    },
    #[snafu(display("Giving up after {failures} consecutive failed flushes"))]
    FlushFailures { failures: u32, source: FlushError },
}

pub type Result<T, E = IngestorError> = std::result::Result<T, E>;
