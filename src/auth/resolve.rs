use super::credentials::{AccessCredential, CredentialStore};
use crate::api::CloudClient;
use crate::error::{Error, Result};

/// Pick the organization and credential a command should use.
///
/// Precedence: the explicit flag, then the environment override, then the
/// stored default. The flag and the override may name an organization by
/// id, slug or name. When none of those names an organization but tokens are
/// stored, the service's first membership for a stored token decides.
pub async fn resolve_credential(
    store: &CredentialStore,
    client: &CloudClient,
    explicit: Option<&str>,
    env_override: Option<&str>,
) -> Result<(String, AccessCredential)> {
    let pinned = explicit
        .filter(|o| !o.is_empty())
        .or(env_override.filter(|o| !o.is_empty()));

    let tokens = store.list_credentials();

    if let Some(org) = pinned {
        let key = tokens.org_key(org).unwrap_or(org);
        return tokens.resolve(Some(key));
    }

    if tokens.default_org().is_some() {
        return tokens.resolve(None);
    }

    let Some(credential) = tokens.tokens.values().next().cloned() else {
        return Err(Error::NoToken { org: None });
    };

    let me = client.whoami(&credential.access_token).await?;
    let first = me
        .organizations
        .first()
        .map(|m| m.organization.clone())
        .ok_or_else(|| Error::Membership(format!("{} belongs to no organization", me.user.email)))?;

    tracing::debug!("No default organization, using first membership {}", first.slug);

    let credential = tokens
        .tokens
        .get(&first.id)
        .cloned()
        .unwrap_or(AccessCredential {
            org_name: first.name.clone(),
            org_slug: first.slug.clone(),
            ..credential
        });

    Ok((first.id, credential))
}
