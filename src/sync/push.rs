//! Pushing a local document: create, upload or nothing.

use super::reconcile::{ReconciliationOutcome, Reconciler};
use crate::auth::AccessCredential;
use crate::document::rewrite::{insert_document_line, replace_document_line};
use crate::document::LocalDocument;
use crate::error::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct PushOptions {
    /// Record a newly created document's slug in the local backend block
    pub update_local: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self { update_local: true }
    }
}

/// What a push should do, decided from the reconciliation result alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushPlan {
    /// No remote document yet. `declared` is the short-name the file asked for, if any.
    Create {
        org_id: String,
        declared: Option<String>,
    },
    /// Remote document exists but does not hold this content as its current version
    Upload {
        org_id: String,
        slug: String,
        stale_version: Option<String>,
    },
    UpToDate {
        org_id: String,
        slug: String,
        version: String,
    },
}

/// Map a reconciliation result to a push plan.
///
/// A missing declared document is recoverable and becomes a create; every
/// other error, membership failures included, aborts the push.
pub fn plan_push(reconciled: Result<ReconciliationOutcome>) -> Result<PushPlan> {
    let outcome = match reconciled {
        Ok(outcome) => outcome,
        Err(Error::DocumentNotFound { org_id, name }) => {
            return Ok(PushPlan::Create {
                org_id,
                declared: Some(name),
            })
        }
        Err(e) => return Err(e),
    };

    Ok(match (outcome.document, outcome.version) {
        (None, _) => PushPlan::Create {
            org_id: outcome.organization_id,
            declared: None,
        },
        (Some(slug), Some(version)) => PushPlan::UpToDate {
            org_id: outcome.organization_id,
            slug,
            version,
        },
        (Some(slug), None) => PushPlan::Upload {
            org_id: outcome.organization_id,
            slug,
            stale_version: outcome.stale_version,
        },
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    Created,
    Uploaded,
    UpToDate,
}

/// Result of a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub action: PushAction,
    pub organization_id: String,
    pub slug: String,
    pub version: Option<String>,
    pub rewrote_local: bool,
    pub stale_version: Option<String>,
}

impl Reconciler {
    /// Bring the remote catalog in line with the document at `path`.
    pub async fn push(
        &self,
        credential: &AccessCredential,
        path: &Path,
        options: PushOptions,
    ) -> Result<PushReport> {
        let token = credential.access_token.as_str();
        let local = self.load_local(path)?;
        let reconciled = self.reconcile(token, &local).await;

        match plan_push(reconciled)? {
            PushPlan::UpToDate {
                org_id,
                slug,
                version,
            } => {
                tracing::info!("{} is up to date at version {}", slug, version);
                Ok(PushReport {
                    action: PushAction::UpToDate,
                    organization_id: org_id,
                    slug,
                    version: Some(version),
                    rewrote_local: false,
                    stale_version: None,
                })
            }
            PushPlan::Upload {
                org_id,
                slug,
                stale_version,
            } => {
                let version = self
                    .client
                    .upload_document(token, &org_id, &slug, &local.file_name(), local.bytes.clone())
                    .await?;
                tracing::info!("Uploaded {} as version {}", slug, version.version);
                Ok(PushReport {
                    action: PushAction::Uploaded,
                    organization_id: org_id,
                    slug,
                    version: Some(version.version),
                    rewrote_local: false,
                    stale_version,
                })
            }
            PushPlan::Create { org_id, declared } => {
                self.create_and_upload(token, &org_id, &local, declared, options)
                    .await
            }
        }
    }

    async fn create_and_upload(
        &self,
        token: &str,
        org_id: &str,
        local: &LocalDocument,
        declared: Option<String>,
        options: PushOptions,
    ) -> Result<PushReport> {
        let name = local.display_name();

        // A backend block the rewrite cannot edit must fail before anything is created
        if options.update_local {
            let text = String::from_utf8_lossy(&local.bytes);
            match declared.as_deref() {
                None => insert_document_line(&text, &name)?,
                Some(_) => replace_document_line(&text, &name)?,
            };
        }

        let created = self
            .client
            .create_document(token, org_id, &name, &local.description())
            .await?;
        tracing::info!("Created document {} ({}) in {}", created.slug, name, org_id);

        let rewrote_local = match declared.as_deref() {
            _ if !options.update_local => false,
            None => {
                self.rewriter.insert_document(&local.path, &created.slug)?;
                true
            }
            Some(existing) if existing != created.slug => {
                tracing::warn!(
                    "Declared document {} was created as {}, updating {}",
                    existing,
                    created.slug,
                    local.path.display()
                );
                self.rewriter.replace_document(&local.path, &created.slug)?;
                true
            }
            Some(_) => false,
        };

        // Upload what is on disk now so the next push sees a match
        let bytes = if rewrote_local {
            self.fs
                .read(&local.path)
                .map_err(|e| Error::io(&local.path, e))?
        } else {
            local.bytes.clone()
        };

        let version = self
            .client
            .upload_document(token, org_id, &created.slug, &local.file_name(), bytes)
            .await?;
        tracing::info!("Uploaded {} as version {}", created.slug, version.version);

        Ok(PushReport {
            action: PushAction::Created,
            organization_id: org_id.to_string(),
            slug: created.slug,
            version: Some(version.version),
            rewrote_local,
            stale_version: None,
        })
    }
}
