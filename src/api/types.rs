//! Wire types for the tmcloud API.

use serde::{Deserialize, Serialize};

/// Response from `POST /auth/device`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    /// Seconds until the device code expires
    pub expires_in: u64,
    /// Suggested polling interval in seconds
    #[serde(default)]
    pub interval: u64,
}

/// Successful response from `POST /auth/device/poll`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Token lifetime in seconds, when the server sets one
    #[serde(default)]
    pub expires_in: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Structured error body: `{"error": {"code", "message", "status"}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub organization: Organization,
    #[serde(default)]
    pub role: String,
}

/// Response from `GET /users/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmI {
    pub user: User,
    #[serde(default)]
    pub organizations: Vec<Membership>,
}

impl WhoAmI {
    /// Find a membership by organization slug.
    pub fn org_by_slug(&self, slug: &str) -> Option<&Organization> {
        self.organizations
            .iter()
            .map(|m| &m.organization)
            .find(|org| org.slug == slug)
    }

    /// Find a membership by organization id or slug.
    pub fn org_by_id_or_slug(&self, key: &str) -> Option<&Organization> {
        self.organizations
            .iter()
            .map(|m| &m.organization)
            .find(|org| org.id == key || org.slug == key)
    }
}

/// A threat model document in the remote catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One uploaded version of a remote document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDocumentVersion {
    pub id: String,
    pub version: String,
    /// SHA-256 of the uploaded bytes, hex encoded
    pub content_hash: String,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body of `POST /org/{orgId}/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
    pub description: String,
}
