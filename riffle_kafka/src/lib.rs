//! Kafka record source backed by librdkafka.

mod context;
mod error;
mod source;

pub use error::{KafkaSourceError, Result};
pub use source::{KafkaSource, KafkaSourceOptions};
