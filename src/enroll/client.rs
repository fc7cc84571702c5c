//! HTTP client for the enrollment backend API.

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::retry::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RETRIES, calculate_backoff,
    is_transient_network_error, is_transient_status,
};
use crate::frame::CaptureBatch;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Registration uploads several JPEGs, so the overall timeout is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    reg_id: &'a str,
    #[serde(rename = "imagesData")]
    images_data: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    registration_id: &'a str,
}

/// `{"message": "..."}` bodies returned by most endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollError {
    #[error("Cannot register an empty batch")]
    EmptyBatch,

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend rejected request (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response from backend: {0}")]
    InvalidResponse(String),

    #[error("Network error: {message} (after {attempts} attempts)")]
    Network { message: String, attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct EnrollClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl EnrollClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, EnrollError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EnrollError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        })
    }

    /// Override how transient failures are retried.
    pub fn with_retry(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = backoff_base;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a student with the frames of one capture.
    ///
    /// The backend rejects a batch in which it finds no face; that surfaces
    /// as [`EnrollError::Api`] carrying the backend's message.
    pub async fn register(
        &self,
        name: &str,
        reg_id: &str,
        batch: &CaptureBatch,
    ) -> Result<ApiMessage, EnrollError> {
        if name.trim().is_empty() {
            return Err(EnrollError::MissingField("name"));
        }
        if reg_id.trim().is_empty() {
            return Err(EnrollError::MissingField("reg_id"));
        }
        if batch.is_empty() {
            return Err(EnrollError::EmptyBatch);
        }

        let body = RegisterRequest {
            name,
            reg_id,
            images_data: batch.data_urls(),
        };
        log::info!("Registering {} with {} frames", reg_id, batch.len());
        let value = self.send(Method::POST, "register", &[], Some(&body)).await?;
        parse_message(value)
    }

    /// Look a student up by registration ID. The body is returned as-is.
    pub async fn login(&self, registration_id: &str) -> Result<Value, EnrollError> {
        if registration_id.trim().is_empty() {
            return Err(EnrollError::MissingField("registration_id"));
        }
        self.send(
            Method::POST,
            "login",
            &[],
            Some(&LoginRequest { registration_id }),
        )
        .await
    }

    /// Remove every enrolled student on the backend.
    pub async fn delete_all_students(&self) -> Result<ApiMessage, EnrollError> {
        let value = self.send::<()>(Method::POST, "delete_all_students", &[], None).await?;
        parse_message(value)
    }

    /// Per-student monitoring reports.
    ///
    /// Accepts both a bare array and a `{"reports": [...]}` envelope.
    pub async fn student_reports(&self) -> Result<Vec<Value>, EnrollError> {
        let value = self.send::<()>(Method::GET, "report", &[], None).await?;
        parse_reports(value)
    }

    /// Students currently seen by the monitoring camera, keyed by ID.
    pub async fn current_students(&self) -> Result<Value, EnrollError> {
        self.send::<()>(Method::GET, "students", &[], None).await
    }

    /// Live monitoring state for one student.
    pub async fn monitoring_status(&self, registration_id: &str) -> Result<Value, EnrollError> {
        if registration_id.trim().is_empty() {
            return Err(EnrollError::MissingField("registration_id"));
        }
        self.send::<()>(
            Method::GET,
            "monitoring_status",
            &[("registration_id", registration_id)],
            None,
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Value, EnrollError> {
        let url = self.url(path);
        let mut attempt = 0;

        loop {
            let mut request = self.http.request(method.clone(), &url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let failure = match request.send().await {
                Ok(response) if is_transient_status(response.status()) => {
                    format!("HTTP {}", response.status())
                }
                Ok(response) => return read_response(response).await,
                Err(e) if is_transient_network_error(&e) => e.to_string(),
                Err(e) => return Err(EnrollError::Http(e)),
            };

            if attempt >= self.max_retries {
                log::error!(
                    "{} {} failed after {} attempts: {}",
                    method,
                    url,
                    attempt + 1,
                    failure
                );
                return Err(EnrollError::Network {
                    message: failure,
                    attempts: attempt + 1,
                });
            }

            let delay = calculate_backoff(attempt, self.backoff_base, self.backoff_max);
            log::warn!(
                "{} {} failed ({}), attempt {}/{}. Retrying in {:?}",
                method,
                url,
                failure,
                attempt + 1,
                self.max_retries + 1,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn read_response(response: reqwest::Response) -> Result<Value, EnrollError> {
    let status = response.status();
    let text = response.text().await?;
    let value = if text.trim().is_empty() {
        Some(Value::Null)
    } else {
        serde_json::from_str::<Value>(&text).ok()
    };

    if status.is_success() {
        return value.ok_or(EnrollError::InvalidResponse(text));
    }

    let message = value
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text.clone()
            }
        });
    log::error!("Backend returned {}: {}", status, message);
    Err(EnrollError::Api {
        status: status.as_u16(),
        message,
    })
}

/// The backend reports failures under `error` or `message`.
fn error_message(value: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key)?.as_str().map(str::to_owned))
}

fn parse_reports(value: Value) -> Result<Vec<Value>, EnrollError> {
    match value {
        Value::Array(reports) => Ok(reports),
        Value::Object(mut map) => match map.remove("reports") {
            Some(Value::Array(reports)) => Ok(reports),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(EnrollError::InvalidResponse(other.to_string())),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(EnrollError::InvalidResponse(other.to_string())),
    }
}

fn parse_message(value: Value) -> Result<ApiMessage, EnrollError> {
    if value.is_null() {
        return Ok(ApiMessage::default());
    }
    serde_json::from_value(value.clone()).map_err(|_| EnrollError::InvalidResponse(value.to_string()))
}
