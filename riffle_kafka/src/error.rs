use rdkafka::{error::KafkaError, types::RDKafkaErrorCode};
use riffle_ingestor_core::SourceError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum KafkaSourceError {
    #[snafu(display("Failed to create Kafka consumer for {bootstrap_servers}"))]
    CreateConsumer {
        bootstrap_servers: String,
        source: KafkaError,
    },
}

pub type Result<T, E = KafkaSourceError> = std::result::Result<T, E>;

/// Error codes after which librdkafka will not recover on its own.
fn is_connection_error(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::AllBrokersDown
                | RDKafkaErrorCode::Authentication
                | RDKafkaErrorCode::SaslAuthenticationFailed
                | RDKafkaErrorCode::Fatal
        )
    )
}

pub(crate) fn consume_error(err: KafkaError) -> SourceError {
    if is_connection_error(&err) {
        return SourceError::Connection {
            message: err.to_string(),
        };
    }

    SourceError::Consume {
        message: err.to_string(),
    }
}

pub(crate) fn commit_error(err: KafkaError) -> SourceError {
    SourceError::Commit {
        message: err.to_string(),
    }
}

pub(crate) fn assignment_error(err: KafkaError) -> SourceError {
    SourceError::Assignment {
        message: err.to_string(),
    }
}
