use riffle_connect_admin::ConnectError;
use riffle_ingestor_core::IngestorError;
use riffle_kafka::KafkaSourceError;
use riffle_object_store::StoreError;
use riffle_observability::ObservabilityError;
use snafu::Snafu;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("Object store error during {operation}"))]
    ObjectStore {
        operation: &'static str,
        source: StoreError,
    },
    #[snafu(display("Kafka error"))]
    Kafka { source: KafkaSourceError },
    #[snafu(display("Ingestion failed"))]
    Ingestion { source: IngestorError },
    #[snafu(display("Kafka Connect operation {operation} failed"))]
    Connect {
        operation: &'static str,
        source: ConnectError,
    },
    #[snafu(display("Connector {name} is not running, state is {state}"))]
    ConnectorNotRunning { name: String, state: String },
    #[snafu(display("JSON encode error"))]
    Json { source: serde_json::Error },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
