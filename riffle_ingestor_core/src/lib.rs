//! Batched CDC ingestion.
//!
//! ## Data flow
//!
//! **Source**: [`RecordSource::poll`] -> [`SourceRecord`] sequence.
//!
//! **Extractor**: [`SourceRecord`] -> [`Envelope`] -> [`RowOutcome`].
//!
//! **Buffer**: [`Row`] sequence per topic -> drained batch once full.
//!
//! **Flusher**: drained batch -> Parquet object in the bucket.
//!
//! [`IngestionLoop`] owns all of the above and drives them from a single task.

pub mod buffer;
pub mod envelope;
pub mod error;
pub mod flush;
pub mod ingestor;
pub mod metrics;
pub mod offsets;
pub mod source;

#[cfg(test)]
pub mod test_utils;

pub use buffer::{TopicBuffer, table_name_for_topic};
pub use envelope::{Envelope, Operation, Row, RowOutcome, Value, extract};
pub use error::{IngestorError, Result};
pub use flush::{
    BatchFlusher, FixedClock, FlushClock, FlushError, FlushReceipt, FlushStage, ParquetFlushWriter,
    ParquetFlushWriterOptions, SystemClock,
};
pub use ingestor::{IngestionLoop, IngestionSummary, IngestorOptions, PipelineState};
pub use offsets::{CommitMode, OffsetTracker};
pub use source::{PartitionPosition, RecordSource, SourceError, SourceRecord, TopicPartitionOffset};
