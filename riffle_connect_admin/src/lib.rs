//! Administration of Debezium connectors through the Kafka Connect REST API.
//!
//! This is a setup utility: the ingestion pipeline never talks to Kafka
//! Connect, it only consumes the topics the connector produces.

mod client;
mod error;
mod postgres;
mod reconcile;
mod types;

pub use client::ConnectClient;
pub use error::{ConnectError, Result};
pub use postgres::PostgresConnectorConfig;
pub use reconcile::{ReconcileAction, ReconcileOptions, ReconcileReport, reconcile};
pub use types::{
    ConnectInfo, ConnectorDefinition, ConnectorState, ConnectorStatus, CreateOutcome,
    InstanceStatus, TaskStatus,
};
