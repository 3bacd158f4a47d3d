use reqwest::{header::CONTENT_TYPE, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Failures talking to the database-service. Messages never carry the
/// service address; the address is only logged.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("database-service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("database-service rejected the request: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// `{ "success": bool, "data": ..., "message": ... }` wrapper used by every
/// database-service route.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    data: Option<Value>,
    message: Option<String>,
}

pub struct DbServiceClient {
    client: Client,
    base_url: String,
}

impl DbServiceClient {
    pub fn new(config: &AppConfig) -> Result<Self, DbError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DbError::Transport(e.without_url().to_string()))?;

        Ok(Self {
            client,
            base_url: config.database_service_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {} {}", method, url);

        let mut req = self
            .client
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(|e| transport_error(&url, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport_error(&url, e))?;
        let envelope = serde_json::from_str::<Envelope>(&text).ok();

        if !status.is_success() {
            let message = envelope
                .and_then(|env| env.message)
                .unwrap_or_else(|| truncate(&text));
            error!("database-service error ({}) for {}: {}", status, url, message);

            return Err(match status {
                StatusCode::NOT_FOUND => DbError::NotFound(message),
                StatusCode::CONFLICT => DbError::Conflict(message),
                StatusCode::PRECONDITION_FAILED => DbError::PreconditionFailed(message),
                _ => DbError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let envelope = envelope.ok_or_else(|| {
            error!("database-service returned a non-envelope body for {}", url);
            DbError::InvalidResponse("response is not a JSON envelope".to_string())
        })?;

        if !envelope.success {
            let message = envelope.message.unwrap_or_else(|| "request rejected".to_string());
            warn!("database-service rejected {}: {}", url, message);
            return Err(DbError::Rejected(message));
        }

        serde_json::from_value(envelope.data.unwrap_or(Value::Null))
            .map_err(|e| DbError::InvalidResponse(format!("failed to decode payload: {}", e)))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> DbError {
    if err.is_timeout() {
        warn!("Request to {} timed out", url);
        return DbError::Timeout;
    }

    error!("Request to {} failed: {}", url, err);
    DbError::Transport(err.without_url().to_string())
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_MESSAGE_LEN {
        return text.to_string();
    }

    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
