//! The messaging side of the pipeline.

use std::time::Duration;

use snafu::Snafu;

/// A record as delivered by the messaging system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Record value, `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

/// A partition assigned to this consumer and where it will read next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPosition {
    pub topic: String,
    pub partition: i32,
    pub position: Option<i64>,
}

/// Offset to commit, i.e. the next record the group should read.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TopicPartitionOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    #[snafu(display("Failed to subscribe to {topics:?}: {message}"))]
    Subscribe { topics: Vec<String>, message: String },
    #[snafu(display("Lost connection to the messaging system: {message}"))]
    Connection { message: String },
    #[snafu(display("Failed to consume records: {message}"))]
    Consume { message: String },
    #[snafu(display("Failed to commit offsets: {message}"))]
    Commit { message: String },
    #[snafu(display("Failed to read partition assignment: {message}"))]
    Assignment { message: String },
}

impl SourceError {
    /// Whether the run cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Subscribe { .. } | Self::Connection { .. })
    }
}

/// A subscription to a set of topics.
///
/// Owned exclusively by the ingestion loop.
#[async_trait::async_trait]
pub trait RecordSource: Send {
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), SourceError>;

    /// Waits up to `timeout` for records. An empty result is not an error.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<SourceRecord>, SourceError>;

    fn assignment(&self) -> Result<Vec<PartitionPosition>, SourceError>;

    async fn commit(&mut self, offsets: &[TopicPartitionOffset]) -> Result<(), SourceError>;

    async fn close(&mut self) -> Result<(), SourceError>;
}
