//! Turning a fresh token into stored per-organization credentials.

use super::credentials::{CredentialStore, StorageBackend};
use crate::api::types::Organization;
use crate::api::CloudClient;
use crate::error::{Error, Result};
use chrono::Utc;

/// Outcome of storing a token.
#[derive(Debug, Clone)]
pub struct StoredLogin {
    pub email: String,
    pub organizations: Vec<Organization>,
    pub backend: StorageBackend,
}

/// Validate `token` against the service and store it for the caller's
/// organizations.
///
/// With `pin`, the token is stored only for that organization (matched by
/// id or slug); otherwise for every organization the caller belongs to.
pub async fn store_token(
    client: &CloudClient,
    store: &CredentialStore,
    token: &str,
    token_type: &str,
    expires_in: Option<i64>,
    pin: Option<&str>,
) -> Result<StoredLogin> {
    let me = client.whoami(token).await?;

    let organizations: Vec<Organization> = match pin.filter(|p| !p.is_empty()) {
        Some(key) => vec![me
            .org_by_id_or_slug(key)
            .cloned()
            .ok_or_else(|| Error::Membership(key.to_string()))?],
        None => me
            .organizations
            .iter()
            .map(|m| m.organization.clone())
            .collect(),
    };

    if organizations.is_empty() {
        return Err(Error::Membership(format!(
            "{} belongs to no organization",
            me.user.email
        )));
    }

    let expires_at = expires_in.map(|secs| Utc::now().timestamp().saturating_add(secs));

    let mut backend = StorageBackend::Keychain;
    for org in &organizations {
        backend = store.set_credential(&org.id, token, token_type, &org.name, &org.slug, expires_at)?;
        tracing::info!("Stored token for organization {} ({})", org.slug, org.id);
    }

    Ok(StoredLogin {
        email: me.user.email,
        organizations,
        backend,
    })
}
