use std::time::Duration;

use rdkafka::{
    ClientConfig, Offset, TopicPartitionList,
    consumer::{CommitMode as KafkaCommitMode, Consumer, StreamConsumer},
    error::KafkaError,
    message::{BorrowedMessage, Message},
    types::RDKafkaErrorCode,
};
use riffle_ingestor_core::{
    CommitMode, PartitionPosition, RecordSource, SourceError, SourceRecord, TopicPartitionOffset,
};
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    context::LoggingConsumerContext,
    error::{CreateConsumerSnafu, Result, assignment_error, commit_error, consume_error},
};

#[derive(Debug, Clone)]
pub struct KafkaSourceOptions {
    pub bootstrap_servers: String,
    pub group_id: String,
    pub client_id: Option<String>,
    /// Where a group without committed offsets starts reading.
    pub auto_offset_reset: String,
    pub commit_mode: CommitMode,
    /// Upper bound on records returned by a single poll.
    pub max_poll_records: usize,
    pub session_timeout: Duration,
}

/// Consumes Debezium topics through a Kafka consumer group.
pub struct KafkaSource {
    consumer: StreamConsumer<LoggingConsumerContext>,
    options: KafkaSourceOptions,
    /// Fatal error received after records were already collected. Reported
    /// by the next poll.
    pending_error: Option<SourceError>,
}

impl KafkaSource {
    pub fn new(options: KafkaSourceOptions) -> Result<Self> {
        let consumer = options
            .client_config()
            .create_with_context(LoggingConsumerContext)
            .context(CreateConsumerSnafu {
                bootstrap_servers: &options.bootstrap_servers,
            })?;

        info!(
            bootstrap_servers = %options.bootstrap_servers,
            group_id = %options.group_id,
            commit_mode = ?options.commit_mode,
            "Created Kafka consumer"
        );

        Ok(Self {
            consumer,
            options,
            pending_error: None,
        })
    }

    /// Handles an error that ended a poll early.
    ///
    /// librdkafka reports broker state changes once, so a fatal error cannot
    /// be dropped just because the poll already has records to return.
    fn defer_error(&mut self, err: KafkaError) {
        let err = consume_error(err);
        if err.is_fatal() {
            warn!(error = %err, "Connection lost, returning partial poll");
            self.pending_error = Some(err);
        } else {
            warn!(error = %err, "Failed to receive record, returning partial poll");
        }
    }
}

#[async_trait::async_trait]
impl RecordSource for KafkaSource {
    async fn subscribe(&mut self, topics: &[String]) -> std::result::Result<(), SourceError> {
        let names = topics.iter().map(String::as_str).collect::<Vec<_>>();
        self.consumer
            .subscribe(&names)
            .map_err(|err| SourceError::Subscribe {
                topics: topics.to_vec(),
                message: err.to_string(),
            })
    }

    async fn poll(&mut self, timeout: Duration) -> std::result::Result<Vec<SourceRecord>, SourceError> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }

        let mut records = Vec::new();

        let first = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_elapsed) => return Ok(records),
            Ok(message) => to_record(&message.map_err(consume_error)?),
        };
        records.push(first);

        // Take whatever else is ready without waiting again.
        while records.len() < self.options.max_poll_records {
            match tokio::time::timeout(Duration::ZERO, self.consumer.recv()).await {
                Err(_elapsed) => break,
                Ok(Ok(message)) => records.push(to_record(&message)),
                Ok(Err(err)) => {
                    self.defer_error(err);
                    break;
                }
            }
        }

        debug!(records = records.len(), "Polled records");
        Ok(records)
    }

    fn assignment(&self) -> std::result::Result<Vec<PartitionPosition>, SourceError> {
        let assignment = self.consumer.assignment().map_err(assignment_error)?;
        let positions = self.consumer.position().map_err(assignment_error)?;

        let partitions = assignment
            .elements()
            .iter()
            .map(|elem| {
                let position = positions
                    .find_partition(elem.topic(), elem.partition())
                    .and_then(|p| match p.offset() {
                        Offset::Offset(offset) => Some(offset),
                        _ => None,
                    });

                PartitionPosition {
                    topic: elem.topic().to_string(),
                    partition: elem.partition(),
                    position,
                }
            })
            .collect();

        Ok(partitions)
    }

    async fn commit(&mut self, offsets: &[TopicPartitionOffset]) -> std::result::Result<(), SourceError> {
        let mut list = TopicPartitionList::new();
        for offset in offsets {
            list.add_partition_offset(&offset.topic, offset.partition, Offset::Offset(offset.offset))
                .map_err(commit_error)?;
        }

        // Synchronous so the offsets are durable before the next poll.
        self.consumer
            .commit(&list, KafkaCommitMode::Sync)
            .map_err(commit_error)
    }

    async fn close(&mut self) -> std::result::Result<(), SourceError> {
        if self.options.commit_mode == CommitMode::Auto {
            match self.consumer.commit_consumer_state(KafkaCommitMode::Sync) {
                Ok(()) => {}
                Err(err) if err.rdkafka_error_code() == Some(RDKafkaErrorCode::NoOffset) => {}
                Err(err) => return Err(commit_error(err)),
            }
        }

        self.consumer.unsubscribe();
        info!(group_id = %self.options.group_id, "Kafka consumer closed");
        Ok(())
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> SourceRecord {
    SourceRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        payload: message.payload().map(<[u8]>::to_vec),
    }
}

impl KafkaSourceOptions {
    pub fn new(bootstrap_servers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: group_id.into(),
            ..Default::default()
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let auto_commit = match self.commit_mode {
            CommitMode::Auto => "true",
            CommitMode::AfterFlush => "false",
        };

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", auto_commit)
            .set("enable.partition.eof", "false")
            .set(
                "session.timeout.ms",
                self.session_timeout.as_millis().to_string(),
            );

        if let Some(client_id) = &self.client_id {
            config.set("client.id", client_id);
        }

        config
    }
}

impl Default for KafkaSourceOptions {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            group_id: "riffle-ingestor".to_string(),
            client_id: None,
            auto_offset_reset: "earliest".to_string(),
            commit_mode: CommitMode::Auto,
            max_poll_records: 500,
            session_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_auto_commit() {
        let options = KafkaSourceOptions::new("kafka:29092", "minio-consumer-group");
        let config = options.client_config();

        assert_eq!(config.get("bootstrap.servers"), Some("kafka:29092"));
        assert_eq!(config.get("group.id"), Some("minio-consumer-group"));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(config.get("enable.auto.commit"), Some("true"));
        assert_eq!(config.get("session.timeout.ms"), Some("30000"));
        assert_eq!(config.get("client.id"), None);
    }

    #[test]
    fn test_client_config_after_flush() {
        let options = KafkaSourceOptions {
            commit_mode: CommitMode::AfterFlush,
            client_id: Some("riffle-1".to_string()),
            ..KafkaSourceOptions::default()
        };
        let config = options.client_config();

        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("client.id"), Some("riffle-1"));
    }

    #[tokio::test]
    async fn test_fatal_error_is_reported_by_next_poll() {
        let mut source =
            KafkaSource::new(KafkaSourceOptions::new("127.0.0.1:1", "riffle-test")).unwrap();

        source.defer_error(KafkaError::MessageConsumption(
            RDKafkaErrorCode::AllBrokersDown,
        ));

        let err = source.poll(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, SourceError::Connection { .. }));
        assert!(err.is_fatal());

        // Reported once.
        assert!(source.poll(Duration::from_millis(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_error_is_not_deferred() {
        let mut source =
            KafkaSource::new(KafkaSourceOptions::new("127.0.0.1:1", "riffle-test")).unwrap();

        source.defer_error(KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure,
        ));

        assert!(source.pending_error.is_none());
        assert!(source.poll(Duration::from_millis(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_consumer_without_broker() {
        // librdkafka connects lazily, creating the consumer does not need a broker.
        let source = KafkaSource::new(KafkaSourceOptions::new("127.0.0.1:1", "riffle-test")).unwrap();
        assert!(source.assignment().unwrap().is_empty());
    }
}
