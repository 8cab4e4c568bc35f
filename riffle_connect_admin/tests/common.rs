#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use riffle_connect_admin::ConnectClient;
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct MockConnector {
    pub config: Value,
    pub state: String,
}

/// In-memory stand-in for the Kafka Connect REST API.
#[derive(Clone, Default)]
pub struct MockConnect {
    connectors: Arc<Mutex<BTreeMap<String, MockConnector>>>,
}

impl MockConnect {
    pub fn insert(&self, name: &str, state: &str) {
        self.connectors.lock().unwrap().insert(
            name.to_string(),
            MockConnector {
                config: json!({}),
                state: state.to_string(),
            },
        );
    }

    pub fn state_of(&self, name: &str) -> Option<String> {
        self.connectors
            .lock()
            .unwrap()
            .get(name)
            .map(|connector| connector.state.clone())
    }

    pub fn config_of(&self, name: &str) -> Option<Value> {
        self.connectors
            .lock()
            .unwrap()
            .get(name)
            .map(|connector| connector.config.clone())
    }

    fn set_state(&self, name: &str, state: &str) -> Result<(), Response> {
        let mut connectors = self.connectors.lock().unwrap();
        let connector = connectors.get_mut(name).ok_or_else(|| not_found(name))?;
        connector.state = state.to_string();
        Ok(())
    }

    fn into_router(self) -> Router {
        Router::new()
            .route("/", get(root))
            .route("/connectors", get(list).post(create))
            .route("/connectors/{name}", get(config).delete(delete))
            .route("/connectors/{name}/status", get(status))
            .route("/connectors/{name}/pause", put(pause))
            .route("/connectors/{name}/resume", put(resume))
            .route("/connectors/{name}/restart", post(restart))
            .with_state(self)
    }
}

/// Serves a [`MockConnect`] on a random local port.
pub async fn start_mock_connect() -> (ConnectClient, MockConnect) {
    let mock = MockConnect::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let app = mock.clone().into_router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ConnectClient::new(format!("http://{address}/"), Duration::from_secs(5)).unwrap();
    (client, mock)
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error_code": 404, "message": format!("Connector {name} not found")})),
    )
        .into_response()
}

async fn root() -> Json<Value> {
    Json(json!({"version": "3.7.0", "commit": "95a4b2b1e2cb2b0e", "kafka_cluster_id": "Zq4xU8"}))
}

async fn list(State(mock): State<MockConnect>) -> Json<Vec<String>> {
    Json(mock.connectors.lock().unwrap().keys().cloned().collect())
}

async fn create(State(mock): State<MockConnect>, Json(body): Json<Value>) -> Response {
    let Some(name) = body["name"]
        .as_str()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error_code": 400, "message": "Connector name is missing"})),
        )
            .into_response();
    };

    let mut connectors = mock.connectors.lock().unwrap();
    if connectors.contains_key(&name) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error_code": 409, "message": format!("Connector {name} already exists")})),
        )
            .into_response();
    }

    connectors.insert(
        name,
        MockConnector {
            config: body["config"].clone(),
            state: "RUNNING".to_string(),
        },
    );

    (StatusCode::CREATED, Json(body)).into_response()
}

async fn config(State(mock): State<MockConnect>, Path(name): Path<String>) -> Response {
    match mock.config_of(&name) {
        Some(config) => Json(json!({
            "name": name,
            "config": config,
            "tasks": [{"connector": name, "task": 0}],
            "type": "source",
        }))
        .into_response(),
        None => not_found(&name),
    }
}

async fn status(State(mock): State<MockConnect>, Path(name): Path<String>) -> Response {
    let Some(state) = mock.state_of(&name) else {
        return not_found(&name);
    };

    let mut task = json!({"id": 0, "state": state, "worker_id": "connect:8083"});
    if state == "FAILED" {
        task["trace"] = json!("org.apache.kafka.connect.errors.ConnectException: replication slot is active");
    }

    Json(json!({
        "name": name,
        "connector": {"state": state, "worker_id": "connect:8083"},
        "tasks": [task],
        "type": "source",
    }))
    .into_response()
}

async fn pause(State(mock): State<MockConnect>, Path(name): Path<String>) -> Response {
    match mock.set_state(&name, "PAUSED") {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(response) => response,
    }
}

async fn resume(State(mock): State<MockConnect>, Path(name): Path<String>) -> Response {
    match mock.set_state(&name, "RUNNING") {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(response) => response,
    }
}

async fn restart(State(mock): State<MockConnect>, Path(name): Path<String>) -> Response {
    match mock.set_state(&name, "RUNNING") {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

async fn delete(State(mock): State<MockConnect>, Path(name): Path<String>) -> Response {
    match mock.connectors.lock().unwrap().remove(&name) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(&name),
    }
}
