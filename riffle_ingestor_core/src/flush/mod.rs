//! Writing drained batches to object storage.

mod clock;
mod error;
mod serialize;
mod writer;

pub use clock::{FixedClock, FlushClock, SystemClock};
pub use error::{FlushError, FlushStage};
pub use serialize::rows_to_record_batch;
pub use writer::{ParquetFlushWriter, ParquetFlushWriterOptions};

use bytesize::ByteSize;

use crate::envelope::Row;

/// Outcome of a successful flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReceipt {
    /// Object key the batch was uploaded to.
    pub key: String,
    pub rows: usize,
    pub size: ByteSize,
    /// The staging file could not be removed after the upload.
    pub staging_retained: bool,
}

/// Persists one table batch.
#[async_trait::async_trait]
pub trait BatchFlusher: Send {
    /// Writes `rows` as one artifact for `table`.
    ///
    /// Returns `None` when there is nothing to write.
    async fn flush(&mut self, table: &str, rows: Vec<Row>) -> Result<Option<FlushReceipt>, FlushError>;
}
