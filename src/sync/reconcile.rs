//! Comparing a local document against the remote catalog.

use crate::api::CloudClient;
use crate::auth::AccessCredential;
use crate::document::{fingerprints_match, BackendRewriter, DocumentParser, LocalDocument};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use std::path::Path;
use std::sync::Arc;

/// Where a local document stands relative to the remote catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    /// Id of the declared organization, resolved through the caller's memberships
    pub organization_id: String,
    /// Slug of the matched remote document
    pub document: Option<String>,
    /// Version whose fingerprint equals the local one and which is current
    pub version: Option<String>,
    /// Version whose fingerprint matches but which has since been superseded
    pub stale_version: Option<String>,
}

/// Validates and pushes local documents.
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) client: CloudClient,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) parser: Arc<dyn DocumentParser>,
    pub(crate) rewriter: BackendRewriter,
}

impl Reconciler {
    pub fn new(
        client: CloudClient,
        fs: Arc<dyn FileSystem>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        let rewriter = BackendRewriter::new(Arc::clone(&fs));
        Self {
            client,
            fs,
            parser,
            rewriter,
        }
    }

    /// Read and check a document without touching the network.
    pub fn load_local(&self, path: &Path) -> Result<LocalDocument> {
        LocalDocument::load(self.fs.as_ref(), self.parser.as_ref(), path)
    }

    /// Validate the document at `path` against the remote catalog.
    pub async fn validate_document(
        &self,
        credential: &AccessCredential,
        path: &Path,
    ) -> Result<ReconciliationOutcome> {
        let local = self.load_local(path)?;
        self.reconcile(&credential.access_token, &local).await
    }

    /// Compare an already loaded document with the remote catalog.
    ///
    /// Calls are strictly sequential: memberships, then the document, then
    /// its versions. A declared document that does not exist remotely is
    /// [`Error::DocumentNotFound`].
    pub async fn reconcile(&self, token: &str, local: &LocalDocument) -> Result<ReconciliationOutcome> {
        tracing::debug!("Checking membership in {}", local.organization);
        let me = self.client.whoami(token).await?;

        let org = me
            .org_by_slug(&local.organization)
            .ok_or_else(|| Error::Membership(local.organization.clone()))?;

        let mut outcome = ReconciliationOutcome {
            organization_id: org.id.clone(),
            ..Default::default()
        };

        let Some(name) = local.document.as_deref() else {
            return Ok(outcome);
        };

        tracing::debug!("Looking up document {} in {}", name, org.id);
        let document = self
            .client
            .get_document(token, &org.id, name)
            .await?
            .ok_or_else(|| Error::DocumentNotFound {
                org_id: org.id.clone(),
                name: name.to_string(),
            })?;
        outcome.document = Some(document.slug.clone());

        let versions = self
            .client
            .list_versions(token, &org.id, &document.slug)
            .await?;

        let mut matching = versions
            .iter()
            .filter(|v| fingerprints_match(&v.content_hash, &local.fingerprint));

        // Same bytes may have been uploaded more than once
        let current = matching.clone().find(|v| v.is_current);
        match (current, matching.next()) {
            (Some(version), _) => {
                outcome.version = Some(version.version.clone());
            }
            (None, Some(stale)) => {
                tracing::warn!(
                    "{} matches version {} of {}, which is no longer current",
                    local.path.display(),
                    stale.version,
                    document.slug
                );
                outcome.stale_version = Some(stale.version.clone());
            }
            (None, None) => {
                tracing::debug!("No remote version of {} matches local content", document.slug);
            }
        }

        Ok(outcome)
    }
}
