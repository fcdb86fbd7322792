//! Typed wrappers over the tmcloud REST endpoints used by login and sync.

use super::http_client::{ApiRequest, ApiResponse, Transport};
use super::types::*;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Decode a successful JSON body.
pub fn decode_json<T: DeserializeOwned>(response: &ApiResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| Error::Decode(e.to_string()))
}

/// Map a non-success response onto the error taxonomy.
///
/// 401/403 become `Error::Auth`; everything else is `Error::Protocol`,
/// carrying the structured error code when the body has one.
pub fn error_from_response(response: &ApiResponse) -> Error {
    match protocol_error(response) {
        Error::Protocol {
            status: 401 | 403,
            message,
            ..
        } => Error::Auth(if message.is_empty() {
            "token rejected".to_string()
        } else {
            message
        }),
        other => other,
    }
}

/// `Error::Protocol` for a non-success response, whatever its status.
pub fn protocol_error(response: &ApiResponse) -> Error {
    let envelope = serde_json::from_slice::<ErrorEnvelope>(&response.body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| String::from_utf8_lossy(&response.body).trim().to_string());

    Error::Protocol {
        status: response.status,
        code: envelope.map(|e| e.error.code),
        message,
    }
}

/// Client for the document catalog and identity endpoints.
#[derive(Clone)]
pub struct CloudClient {
    transport: Arc<dyn Transport>,
}

impl CloudClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(error_from_response(&response));
        }
        decode_json(&response)
    }

    /// Caller identity and organization memberships.
    pub async fn whoami(&self, token: &str) -> Result<WhoAmI> {
        self.send_json(ApiRequest::get("/users/me").bearer(token))
            .await
    }

    pub async fn list_documents(&self, token: &str, org_id: &str) -> Result<Vec<RemoteDocument>> {
        self.send_json(ApiRequest::get(format!("/org/{}/models", org_id)).bearer(token))
            .await
    }

    /// Fetch a document by short-name. A 404 is `Ok(None)`.
    pub async fn get_document(
        &self,
        token: &str,
        org_id: &str,
        slug: &str,
    ) -> Result<Option<RemoteDocument>> {
        let request = ApiRequest::get(format!("/org/{}/models/{}", org_id, slug)).bearer(token);
        let response = self.transport.send(request).await?;

        match response.status {
            404 => Ok(None),
            _ if response.is_success() => decode_json(&response).map(Some),
            _ => Err(error_from_response(&response)),
        }
    }

    pub async fn list_versions(
        &self,
        token: &str,
        org_id: &str,
        slug: &str,
    ) -> Result<Vec<RemoteDocumentVersion>> {
        self.send_json(
            ApiRequest::get(format!("/org/{}/models/{}/versions", org_id, slug)).bearer(token),
        )
        .await
    }

    pub async fn create_document(
        &self,
        token: &str,
        org_id: &str,
        name: &str,
        description: &str,
    ) -> Result<RemoteDocument> {
        let body = CreateDocumentRequest {
            name: name.to_string(),
            description: description.to_string(),
        };
        let body = serde_json::to_value(body).map_err(|e| Error::Decode(e.to_string()))?;

        self.send_json(
            ApiRequest::post(format!("/org/{}/models", org_id))
                .bearer(token)
                .json(body),
        )
        .await
    }

    /// Upload file bytes as a new version of a document.
    pub async fn upload_document(
        &self,
        token: &str,
        org_id: &str,
        slug: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteDocumentVersion> {
        self.send_json(
            ApiRequest::post(format!("/org/{}/models/{}/upload", org_id, slug))
                .bearer(token)
                .file("file", filename, bytes),
        )
        .await
    }
}
