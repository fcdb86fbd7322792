//! HTTP transport for the tmcloud API.
//!
//! Callers build `ApiRequest`s against API-relative paths; a `Transport`
//! turns them into responses. The reqwest-backed transport is used in
//! production, tests script a mock.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// Request timeout for API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Version prefix for every API path
pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    /// Single-file multipart upload
    File {
        field: String,
        filename: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API prefix, e.g. `/users/me`
    pub path: String,
    pub bearer: Option<String>,
    pub body: Body,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            bearer: None,
            body: Body::Empty,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            bearer: None,
            body: Body::Empty,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn file(mut self, field: &str, filename: &str, bytes: Vec<u8>) -> Self {
        self.body = Body::File {
            field: field.to_string(),
            filename: filename.to_string(),
            bytes,
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends API requests.
///
/// Implementations return `Error::Connectivity` for failures below HTTP
/// (connect, TLS, body read). Any HTTP status, including errors, is a
/// successful send.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// `Transport` backed by reqwest
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(concat!("tmcloud/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Connectivity(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request.path);
        tracing::debug!("{:?} {}", request.method, url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::File {
                field,
                filename,
                bytes,
            } => builder.multipart(Form::new().part(field, Part::bytes(bytes).file_name(filename))),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Connectivity(format!("Failed to read response body: {}", e)))?;

        tracing::debug!("{} -> {}", url, status);

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}
