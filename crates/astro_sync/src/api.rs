//! Remote API boundary
//!
//! The coordinator only sees [`ApiClient`]; [`HttpApiClient`] is the reqwest
//! implementation used by the CLI.

use crate::{Result, SyncError};
use astro_common::sanitizer::LogSanitizer;
use astro_common::HttpMethod;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// HTTP status the server uses to reject a write that conflicts with its state
pub const CONFLICT_STATUS: u16 = 409;

/// One outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub timeout: Duration,
    /// Additional attempts after a transport failure
    pub retries: u32,
}

impl ApiRequest {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            body: None,
            timeout: Duration::from_secs(30),
            retries: 0,
        }
    }
}

/// Outcome of a request that reached the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub success: bool,
    pub status: Option<u16>,
    pub body: Option<Value>,
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(body: Option<Value>) -> Self {
        Self {
            success: true,
            status: Some(200),
            body,
            error: None,
        }
    }

    pub fn failed(status: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: Some(status),
            body: None,
            error: Some(error.into()),
        }
    }

    /// A 409 carrying the server's current version of the resource
    pub fn conflict(server_body: Option<Value>) -> Self {
        Self {
            success: false,
            status: Some(CONFLICT_STATUS),
            body: server_body,
            error: Some("Conflict".to_string()),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status == Some(CONFLICT_STATUS)
    }
}

/// Sends queued mutations to the remote service
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// `Err` means the server was never reached; HTTP error statuses come back
    /// as an unsuccessful [`ApiResponse`].
    async fn request(&self, url: &str, request: ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed [`ApiClient`]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    sanitizer: LogSanitizer,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            auth_token: None,
            sanitizer: LogSanitizer::new(),
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Absolute urls pass through; anything else is joined onto the base url
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    async fn send_once(
        &self,
        url: &str,
        request: &ApiRequest,
    ) -> std::result::Result<ApiResponse, reqwest::Error> {
        let mut builder = self
            .client
            .request(to_reqwest(request.method), url)
            .timeout(request.timeout);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        };

        Ok(ApiResponse {
            success: status.is_success(),
            status: Some(status.as_u16()),
            body,
            error: (!status.is_success()).then(|| format!("HTTP {}", status)),
        })
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn request(&self, url: &str, request: ApiRequest) -> Result<ApiResponse> {
        let full_url = self.resolve_url(url);
        let mut last_error = String::new();

        for attempt in 0..=request.retries {
            match self.send_once(&full_url, &request).await {
                Ok(response) => {
                    tracing::debug!(
                        "{} {} -> {:?}",
                        request.method,
                        self.sanitizer.sanitize(&full_url),
                        response.status
                    );
                    return Ok(response);
                }
                Err(e) => {
                    last_error = self.sanitizer.sanitize(&e.to_string());
                    tracing::warn!(
                        "{} {} failed (attempt {}/{}): {}",
                        request.method,
                        self.sanitizer.sanitize(&full_url),
                        attempt + 1,
                        request.retries + 1,
                        last_error
                    );
                }
            }
        }

        Err(SyncError::Request(last_error))
    }
}
