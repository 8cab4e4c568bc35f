use std::{collections::BTreeSet, time::Duration};

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    error::{ClientSnafu, ConnectError, NotFoundSnafu, RequestSnafu, Result},
    types::{ConnectInfo, ConnectorDefinition, ConnectorStatus, CreateOutcome},
};

/// Client for the Kafka Connect REST API.
#[derive(Debug, Clone)]
pub struct ConnectClient {
    client: reqwest::Client,
    base_url: String,
}

impl ConnectClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(ClientSnafu)?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<ConnectInfo> {
        let operation = "check Kafka Connect health";
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .context(RequestSnafu { operation })?;

        let response = expect_status(operation, response, &[StatusCode::OK]).await?;
        json(operation, response).await
    }

    pub async fn list(&self) -> Result<BTreeSet<String>> {
        let operation = "list connectors";
        let response = self
            .client
            .get(self.connectors_url())
            .send()
            .await
            .context(RequestSnafu { operation })?;

        let response = expect_status(operation, response, &[StatusCode::OK]).await?;
        json(operation, response).await
    }

    /// Submits a new connector. A connector with the same name is left untouched.
    pub async fn create(&self, definition: &ConnectorDefinition) -> Result<CreateOutcome> {
        let operation = "create connector";
        let response = self
            .client
            .post(self.connectors_url())
            .json(definition)
            .send()
            .await
            .context(RequestSnafu { operation })?;

        match response.status() {
            StatusCode::CREATED => Ok(CreateOutcome::Created),
            StatusCode::CONFLICT => Ok(CreateOutcome::AlreadyExists),
            _ => Err(response_error(operation, response).await),
        }
    }

    pub async fn status(&self, name: &str) -> Result<ConnectorStatus> {
        let operation = "get connector status";
        let response = self
            .client
            .get(format!("{}/status", self.connector_url(name)))
            .send()
            .await
            .context(RequestSnafu { operation })?;

        let response = expect_connector_status(operation, name, response, &[StatusCode::OK]).await?;
        json(operation, response).await
    }

    pub async fn config(&self, name: &str) -> Result<ConnectorDefinition> {
        let operation = "get connector config";
        let response = self
            .client
            .get(self.connector_url(name))
            .send()
            .await
            .context(RequestSnafu { operation })?;

        let response = expect_connector_status(operation, name, response, &[StatusCode::OK]).await?;
        json(operation, response).await
    }

    pub async fn pause(&self, name: &str) -> Result<()> {
        let operation = "pause connector";
        let response = self
            .client
            .put(format!("{}/pause", self.connector_url(name)))
            .send()
            .await
            .context(RequestSnafu { operation })?;

        expect_connector_status(operation, name, response, &[StatusCode::ACCEPTED]).await?;
        Ok(())
    }

    pub async fn resume(&self, name: &str) -> Result<()> {
        let operation = "resume connector";
        let response = self
            .client
            .put(format!("{}/resume", self.connector_url(name)))
            .send()
            .await
            .context(RequestSnafu { operation })?;

        expect_connector_status(operation, name, response, &[StatusCode::ACCEPTED]).await?;
        Ok(())
    }

    pub async fn restart(&self, name: &str) -> Result<()> {
        let operation = "restart connector";
        let response = self
            .client
            .post(format!("{}/restart", self.connector_url(name)))
            .send()
            .await
            .context(RequestSnafu { operation })?;

        expect_connector_status(
            operation,
            name,
            response,
            &[StatusCode::OK, StatusCode::ACCEPTED, StatusCode::NO_CONTENT],
        )
        .await?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let operation = "delete connector";
        let response = self
            .client
            .delete(self.connector_url(name))
            .send()
            .await
            .context(RequestSnafu { operation })?;

        expect_connector_status(operation, name, response, &[StatusCode::NO_CONTENT]).await?;
        Ok(())
    }

    fn connectors_url(&self) -> String {
        format!("{}/connectors", self.base_url)
    }

    fn connector_url(&self, name: &str) -> String {
        format!("{}/connectors/{name}", self.base_url)
    }
}

async fn json<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
    response.json::<T>().await.context(RequestSnafu { operation })
}

async fn expect_status(
    operation: &'static str,
    response: Response,
    expected: &[StatusCode],
) -> Result<Response> {
    if expected.contains(&response.status()) {
        return Ok(response);
    }

    Err(response_error(operation, response).await)
}

/// Like [`expect_status`], mapping 404 to [`ConnectError::NotFound`].
async fn expect_connector_status(
    operation: &'static str,
    name: &str,
    response: Response,
    expected: &[StatusCode],
) -> Result<Response> {
    if response.status() == StatusCode::NOT_FOUND {
        return NotFoundSnafu { name }.fail();
    }

    expect_status(operation, response, expected).await
}

async fn response_error(operation: &'static str, response: Response) -> ConnectError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    debug!(operation, %status, %body, "Unexpected Kafka Connect response");

    // Kafka Connect reports errors as {"error_code": .., "message": ".."}.
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_string))
        .unwrap_or(body);

    ConnectError::Response {
        operation,
        status,
        message,
    }
}
