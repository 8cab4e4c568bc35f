use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Response of the Kafka Connect root endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectInfo {
    pub version: String,
    pub commit: String,
    pub kafka_cluster_id: Option<String>,
}

/// A connector as submitted to, and returned by, Kafka Connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    pub name: String,
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ConnectorState {
    Running,
    Paused,
    Failed,
    Unassigned,
    Restarting,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectorStatus {
    pub name: String,
    pub connector: InstanceStatus,
    #[serde(default)]
    pub tasks: Vec<TaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceStatus {
    pub state: ConnectorState,
    pub worker_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskStatus {
    pub id: u32,
    pub state: ConnectorState,
    pub worker_id: String,
    /// Stack trace of a failed task.
    pub trace: Option<String>,
}

impl ConnectorStatus {
    pub fn state(&self) -> &ConnectorState {
        &self.connector.state
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskStatus> {
        self.tasks
            .iter()
            .filter(|task| task.state == ConnectorState::Failed)
    }
}

impl From<String> for ConnectorState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "RUNNING" => ConnectorState::Running,
            "PAUSED" => ConnectorState::Paused,
            "FAILED" => ConnectorState::Failed,
            "UNASSIGNED" => ConnectorState::Unassigned,
            "RESTARTING" => ConnectorState::Restarting,
            _ => ConnectorState::Unknown(state),
        }
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorState::Running => f.write_str("RUNNING"),
            ConnectorState::Paused => f.write_str("PAUSED"),
            ConnectorState::Failed => f.write_str("FAILED"),
            ConnectorState::Unassigned => f.write_str("UNASSIGNED"),
            ConnectorState::Restarting => f.write_str("RESTARTING"),
            ConnectorState::Unknown(state) => f.write_str(state),
        }
    }
}
