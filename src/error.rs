//! Error types shared by the authenticator, credential store and reconciler.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for tmcloud operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Backend-block invariant that a document failed to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentIssue {
    #[error("no backend block found")]
    NoBackendBlock,

    #[error("multiple backend blocks found ({0}), only one is supported")]
    MultipleBackendBlocks(usize),

    #[error("backend block is named {found:?}, expected {expected:?}")]
    WrongBackendName { found: String, expected: String },

    #[error("backend block is missing an organization")]
    MissingOrganization,
}

/// Errors that can occur in tmcloud operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (DNS, TLS, connection reset, body read).
    #[error("could not reach the tmcloud API: {0}")]
    Connectivity(String),

    /// Unexpected HTTP status or structured error body.
    #[error("API error ({status}){}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Protocol {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to decode API response: {0}")]
    Decode(String),

    /// The device authorization window elapsed before the user approved it.
    #[error("device authorization expired after {waited_secs}s")]
    Timeout { waited_secs: u64 },

    /// The bearer token was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("no token found{}", .org.as_deref().map(|o| format!(" for organization {o}")).unwrap_or_default())]
    NoToken { org: Option<String> },

    #[error("organization {0} not found in token store")]
    NotFound(String),

    /// Neither the secure vault nor the fallback file could be written.
    #[error("credential storage failed: {0}")]
    Storage(String),

    #[error("invalid backend configuration: {0}")]
    Configuration(#[from] DocumentIssue),

    #[error("you are not a member of organization {0:?}")]
    Membership(String),

    /// The document short-name declared in the backend block does not exist remotely.
    #[error("document {name:?} not found in organization {org_id}")]
    DocumentNotFound { org_id: String, name: String },

    /// The backend block already declares a document.
    #[error("backend block already declares document {0:?}")]
    AlreadySet(String),

    #[error("failed to parse document: {0}")]
    Parse(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is worth retrying inside a deadline.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}
