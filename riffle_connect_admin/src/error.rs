use reqwest::StatusCode;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("Failed to build HTTP client"))]
    Client { source: reqwest::Error },
    #[snafu(display("Request to {operation} failed"))]
    Request {
        operation: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("Connector {name} not found"))]
    NotFound { name: String },
    #[snafu(display("Failed to {operation}: status={status}, message={message}"))]
    Response {
        operation: &'static str,
        status: StatusCode,
        message: String,
    },
}

pub type Result<T, E = ConnectError> = std::result::Result<T, E>;
