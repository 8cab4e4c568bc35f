use std::time::Duration;

use clap::{Args, Subcommand};
use riffle_connect_admin::{
    ConnectClient, ConnectorState, ConnectorStatus, CreateOutcome, PostgresConnectorConfig,
    ReconcileOptions, reconcile,
};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ConnectSnafu, ConnectorNotRunningSnafu, JsonSnafu, Result};

const MAX_TRACE_CHARS: usize = 200;

/// Arguments for reaching the Kafka Connect REST API.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Base URL of the Kafka Connect REST API
    #[arg(long, env = "DEBEZIUM_CONNECT_URL", default_value = "http://localhost:8083")]
    pub connect_url: String,
    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
}

/// Settings of the Debezium Postgres connector.
#[derive(Args, Clone)]
pub struct PostgresArgs {
    #[arg(long, env = "POSTGRES_HOST")]
    pub postgres_host: String,
    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,
    #[arg(long, env = "POSTGRES_USER")]
    pub postgres_user: String,
    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pub postgres_password: String,
    #[arg(long, env = "POSTGRES_DB")]
    pub postgres_db: String,
    /// Connector name
    #[arg(long, default_value = "postgres-connector")]
    pub name: String,
    /// Prefix of the topics the connector publishes to
    #[arg(long, default_value = "banking_server")]
    pub topic_prefix: String,
    /// Captured tables as `schema.table`, comma separated
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "public.customers,public.accounts,public.transactions"
    )]
    pub tables: Vec<String>,
}

#[derive(Subcommand)]
pub enum ConnectorCommands {
    /// Check that Kafka Connect is reachable
    Health {
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// List registered connectors
    List {
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Show the state of a connector and its tasks
    Status {
        /// Connector name
        name: String,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Print the configuration of a connector
    Config {
        /// Connector name
        name: String,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Register the Postgres connector
    Create {
        #[clap(flatten)]
        postgres: PostgresArgs,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Pause a connector
    Pause {
        /// Connector name
        name: String,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Resume a paused connector
    Resume {
        /// Connector name
        name: String,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Restart a connector
    Restart {
        /// Connector name
        name: String,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Delete a connector
    Delete {
        /// Connector name
        name: String,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
    /// Create, resume or restart the Postgres connector until it runs
    Setup {
        #[clap(flatten)]
        postgres: PostgresArgs,
        /// Delete and create the connector even if it exists
        #[arg(long)]
        recreate: bool,
        #[clap(flatten)]
        connect: ConnectArgs,
    },
}

impl ConnectorCommands {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        match self {
            ConnectorCommands::Health { connect } => {
                let client = connect.client()?;
                let info = client.health().await.context(ConnectSnafu {
                    operation: "health",
                })?;

                println!("Kafka Connect {} is running at {}", info.version, client.base_url());
                println!("Commit: {}", info.commit);
                println!("Kafka cluster: {}", info.kafka_cluster_id);

                Ok(())
            }
            ConnectorCommands::List { connect } => {
                let client = connect.client()?;
                let connectors = client
                    .list()
                    .await
                    .context(ConnectSnafu { operation: "list" })?;

                if connectors.is_empty() {
                    println!("No connectors");
                }

                for name in connectors {
                    println!("{name}");
                }

                Ok(())
            }
            ConnectorCommands::Status { name, connect } => {
                let client = connect.client()?;
                let status = client.status(&name).await.context(ConnectSnafu {
                    operation: "status",
                })?;

                print_status(&status);

                Ok(())
            }
            ConnectorCommands::Config { name, connect } => {
                let client = connect.client()?;
                let definition = client.config(&name).await.context(ConnectSnafu {
                    operation: "config",
                })?;

                let json = serde_json::to_string_pretty(&definition).context(JsonSnafu {})?;
                println!("{json}");

                Ok(())
            }
            ConnectorCommands::Create { postgres, connect } => {
                let client = connect.client()?;
                let definition = postgres.to_config().to_definition();

                match client.create(&definition).await.context(ConnectSnafu {
                    operation: "create",
                })? {
                    CreateOutcome::Created => println!("Created connector {}", definition.name),
                    CreateOutcome::AlreadyExists => {
                        println!("Connector {} already exists", definition.name)
                    }
                }

                Ok(())
            }
            ConnectorCommands::Pause { name, connect } => {
                let client = connect.client()?;
                client
                    .pause(&name)
                    .await
                    .context(ConnectSnafu { operation: "pause" })?;
                println!("Paused connector {name}");
                Ok(())
            }
            ConnectorCommands::Resume { name, connect } => {
                let client = connect.client()?;
                client.resume(&name).await.context(ConnectSnafu {
                    operation: "resume",
                })?;
                println!("Resumed connector {name}");
                Ok(())
            }
            ConnectorCommands::Restart { name, connect } => {
                let client = connect.client()?;
                client.restart(&name).await.context(ConnectSnafu {
                    operation: "restart",
                })?;
                println!("Restarted connector {name}");
                Ok(())
            }
            ConnectorCommands::Delete { name, connect } => {
                let client = connect.client()?;
                client.delete(&name).await.context(ConnectSnafu {
                    operation: "delete",
                })?;
                println!("Deleted connector {name}");
                Ok(())
            }
            ConnectorCommands::Setup {
                postgres,
                recreate,
                connect,
            } => {
                let client = connect.client()?;
                let config = postgres.to_config();
                let definition = config.to_definition();
                let options = ReconcileOptions {
                    recreate,
                    ..Default::default()
                };

                let report = tokio::select! {
                    report = reconcile(&client, &definition, &options) => {
                        report.context(ConnectSnafu { operation: "setup" })?
                    }
                    _ = ct.cancelled() => {
                        warn!("Connector setup interrupted");
                        return Ok(());
                    }
                };

                println!("Connector {}: {:?}", definition.name, report.action);
                println!("Topics: {}", config.topics().join(", "));

                let Some(status) = report.status else {
                    return Ok(());
                };

                print_status(&status);

                if status.state() == &ConnectorState::Failed || status.failed_tasks().count() > 0 {
                    return ConnectorNotRunningSnafu {
                        name: status.name.clone(),
                        state: status.state().to_string(),
                    }
                    .fail();
                }

                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for PostgresArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresArgs")
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_user", &self.postgres_user)
            .field("postgres_password", &"<redacted>")
            .field("postgres_db", &self.postgres_db)
            .field("name", &self.name)
            .field("topic_prefix", &self.topic_prefix)
            .field("tables", &self.tables)
            .finish()
    }
}

impl ConnectArgs {
    fn client(&self) -> Result<ConnectClient> {
        ConnectClient::new(&self.connect_url, Duration::from_millis(self.timeout_ms))
            .context(ConnectSnafu { operation: "client" })
    }
}

impl PostgresArgs {
    fn to_config(&self) -> PostgresConnectorConfig {
        PostgresConnectorConfig {
            name: self.name.clone(),
            port: self.postgres_port,
            topic_prefix: self.topic_prefix.clone(),
            tables: self
                .tables
                .iter()
                .map(|table| table.trim().to_string())
                .filter(|table| !table.is_empty())
                .collect(),
            ..PostgresConnectorConfig::new(
                &self.postgres_host,
                &self.postgres_user,
                &self.postgres_password,
                &self.postgres_db,
            )
        }
    }
}

fn print_status(status: &ConnectorStatus) {
    println!(
        "{}: {} on {}",
        status.name, status.connector.state, status.connector.worker_id
    );

    for task in &status.tasks {
        println!("  task {}: {} on {}", task.id, task.state, task.worker_id);
        if let Some(trace) = &task.trace {
            let trace: String = trace.chars().take(MAX_TRACE_CHARS).collect();
            println!("    {trace}");
        }
    }
}
