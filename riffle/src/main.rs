use clap::{Parser, Subcommand};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    connector::ConnectorCommands,
    error::{ObservabilitySnafu, Result},
    ingest::IngestArgs,
};

mod connector;
mod error;
mod ingest;

#[derive(Parser)]
#[command(name = "riffle")]
#[command(about = "Stream Debezium change events into Parquet files on object storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume CDC topics and write batches to the bucket until interrupted
    Ingest {
        #[clap(flatten)]
        inner: IngestArgs,
    },
    /// Manage the Debezium connector through Kafka Connect
    Connector {
        #[command(subcommand)]
        inner: ConnectorCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _observability = riffle_observability::init_observability(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
    .context(ObservabilitySnafu {})?;

    let ct = CancellationToken::new();

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ct_clone.cancel();
    });

    match cli.command {
        Commands::Ingest { inner } => inner.run(ct).await,
        Commands::Connector { inner } => inner.run(ct).await,
    }
}
