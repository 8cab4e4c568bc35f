use std::time::Duration;

use tracing::{info, warn};

use crate::{
    client::ConnectClient,
    error::Result,
    types::{ConnectorDefinition, ConnectorState, ConnectorStatus, CreateOutcome},
};

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Delete and create the connector even if it exists.
    pub recreate: bool,
    /// Wait after a resume or delete before looking at the connector again.
    pub settle_delay: Duration,
    /// Wait after a restart.
    pub restart_delay: Duration,
    /// Wait after creating the connector before reading its status.
    pub init_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Recreated,
    /// Another client created the connector between listing and creating.
    AlreadyExists,
    Resumed,
    Restarted,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub action: ReconcileAction,
    /// Connector status once the action settled, if it could be read.
    pub status: Option<ConnectorStatus>,
}

/// Brings the connector to a running state.
///
/// A missing connector is created, a paused one resumed and a failed one
/// restarted. Any other state is left alone.
pub async fn reconcile(
    client: &ConnectClient,
    definition: &ConnectorDefinition,
    options: &ReconcileOptions,
) -> Result<ReconcileReport> {
    let info = client.health().await?;
    info!(url = %client.base_url(), version = %info.version, "Kafka Connect is running");

    let name = &definition.name;
    let existing = client.list().await?;
    info!(connectors = ?existing, "Existing connectors");

    let action = if !existing.contains(name) {
        create(client, definition, options, ReconcileAction::Created).await?
    } else if options.recreate {
        info!(%name, "Recreating connector");
        client.delete(name).await?;
        tokio::time::sleep(options.settle_delay).await;
        create(client, definition, options, ReconcileAction::Recreated).await?
    } else {
        let status = client.status(name).await?;
        match status.state() {
            ConnectorState::Paused => {
                info!(%name, "Connector is paused, resuming");
                client.resume(name).await?;
                tokio::time::sleep(options.settle_delay).await;
                ReconcileAction::Resumed
            }
            ConnectorState::Failed => {
                warn!(%name, "Connector failed, restarting");
                client.restart(name).await?;
                tokio::time::sleep(options.restart_delay).await;
                ReconcileAction::Restarted
            }
            state => {
                info!(%name, %state, "Connector already exists");
                return Ok(ReconcileReport {
                    action: ReconcileAction::Unchanged,
                    status: Some(status),
                });
            }
        }
    };

    let status = match client.status(name).await {
        Ok(status) => Some(status),
        Err(err) => {
            warn!(%name, error = %err, "Failed to read connector status");
            None
        }
    };

    Ok(ReconcileReport { action, status })
}

async fn create(
    client: &ConnectClient,
    definition: &ConnectorDefinition,
    options: &ReconcileOptions,
    action: ReconcileAction,
) -> Result<ReconcileAction> {
    let name = &definition.name;

    match client.create(definition).await? {
        CreateOutcome::Created => {
            info!(%name, "Connector created, waiting for it to initialize");
            tokio::time::sleep(options.init_delay).await;
            Ok(action)
        }
        CreateOutcome::AlreadyExists => {
            warn!(%name, "Connector already exists");
            Ok(ReconcileAction::AlreadyExists)
        }
    }
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            recreate: false,
            settle_delay: Duration::from_secs(2),
            restart_delay: Duration::from_secs(3),
            init_delay: Duration::from_secs(3),
        }
    }
}
