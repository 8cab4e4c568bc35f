use rdkafka::{
    ClientContext, TopicPartitionList,
    consumer::ConsumerContext,
    error::KafkaResult,
};
use tracing::{debug, warn};

/// Consumer context reporting librdkafka commits through `tracing`.
pub struct LoggingConsumerContext;

impl ClientContext for LoggingConsumerContext {}

impl ConsumerContext for LoggingConsumerContext {
    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!(partitions = offsets.count(), "Offsets committed"),
            Err(err) => warn!(error = %err, "Offset commit failed"),
        }
    }
}
