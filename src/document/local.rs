//! A local document as read from disk: bytes, fingerprint and backend block.

use super::checksum::fingerprint;
use super::parser::{BackendBlock, DocumentParser, ParsedDocument};
use crate::error::{DocumentIssue, Error, Result};
use crate::fs::FileSystem;
use std::path::{Path, PathBuf};

/// Backend name a document must declare to sync with tmcloud
pub const BACKEND_NAME: &str = "tmcloud";

/// Check the backend-block invariants and return the single block.
pub fn validate_backend(parsed: &ParsedDocument) -> std::result::Result<&BackendBlock, DocumentIssue> {
    let backend = match parsed.backends.as_slice() {
        [] => return Err(DocumentIssue::NoBackendBlock),
        [only] => only,
        many => return Err(DocumentIssue::MultipleBackendBlocks(many.len())),
    };

    if backend.name != BACKEND_NAME {
        return Err(DocumentIssue::WrongBackendName {
            found: backend.name.clone(),
            expected: BACKEND_NAME.to_string(),
        });
    }

    if backend.organization.as_deref().unwrap_or("").is_empty() {
        return Err(DocumentIssue::MissingOrganization);
    }

    Ok(backend)
}

#[derive(Debug, Clone)]
pub struct LocalDocument {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub fingerprint: String,
    pub parsed: ParsedDocument,
    /// Organization slug from the backend block
    pub organization: String,
    /// Document short-name from the backend block, if declared
    pub document: Option<String>,
}

impl LocalDocument {
    /// Read, fingerprint and parse `path`, then enforce the backend invariants.
    pub fn load(fs: &dyn FileSystem, parser: &dyn DocumentParser, path: &Path) -> Result<Self> {
        let bytes = fs.read(path).map_err(|e| Error::io(path, e))?;
        let fingerprint = fingerprint(&bytes);

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| Error::Parse(format!("{} is not valid UTF-8: {}", path.display(), e)))?;
        let parsed = parser.parse(text)?;

        let backend = validate_backend(&parsed)?;
        let organization = backend.organization.clone().unwrap_or_default();
        let document = backend.document.clone();

        tracing::debug!(
            "Loaded {} (sha256 {}), organization {}, document {:?}",
            path.display(),
            fingerprint,
            organization,
            document
        );

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            fingerprint,
            parsed,
            organization,
            document,
        })
    }

    /// Name for a newly created remote document.
    pub fn display_name(&self) -> String {
        self.parsed
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.file_stem())
    }

    pub fn description(&self) -> String {
        self.parsed.description.clone().unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.hcl".to_string())
    }

    fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string())
    }
}
