//! Multi-organization token store.
//!
//! The whole store is one JSON blob. Writes go to the OS keychain; when the
//! keychain rejects the write, the same blob goes to an owner-only file in
//! the config directory instead. Reads try the keychain first, then the
//! file, and the first blob that decodes wins.

use super::vault::SecretVault;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Current token store schema version
pub const STORE_VERSION: u32 = 2;

/// Access token for one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredential {
    pub access_token: String,
    pub token_type: String,
    pub org_name: String,
    /// Organization slug, as documents and `--org` name it
    #[serde(default)]
    pub org_slug: String,
    /// Unix timestamp (seconds) after which the token should be revalidated
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl AccessCredential {
    /// Whether the token is past its expiry. Expired tokens stay usable.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now().timestamp())
    }
}

/// Persisted token store.
///
/// Invariants: `default_org` is empty or names a key of `tokens`; a store
/// holding exactly one token after a removal defaults to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStore {
    pub version: u32,
    #[serde(default)]
    pub default_org: String,
    pub tokens: BTreeMap<String, AccessCredential>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            default_org: String::new(),
            tokens: BTreeMap::new(),
        }
    }
}

impl TokenStore {
    /// Decode a persisted blob. Legacy single-token layouts and other
    /// schema versions are rejected.
    pub fn decode(blob: &str) -> std::result::Result<Self, String> {
        let store: Self = serde_json::from_str(blob).map_err(|e| e.to_string())?;
        if store.version != STORE_VERSION {
            return Err(format!(
                "unsupported token store version {} (expected {})",
                store.version, STORE_VERSION
            ));
        }
        Ok(store)
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Storage(format!("Failed to serialize token store: {}", e)))
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn default_org(&self) -> Option<&str> {
        Some(self.default_org.as_str()).filter(|org| !org.is_empty())
    }

    /// Insert or replace a credential; the first organization becomes the default.
    pub fn upsert(&mut self, org_id: &str, credential: AccessCredential) {
        self.tokens.insert(org_id.to_string(), credential);
        if self.default_org.is_empty() {
            self.default_org = org_id.to_string();
        }
    }

    pub fn remove(&mut self, org_id: &str) -> Result<()> {
        if self.tokens.remove(org_id).is_none() {
            return Err(Error::NotFound(org_id.to_string()));
        }

        if self.default_org == org_id {
            self.default_org.clear();
        }

        if self.tokens.len() == 1 {
            if let Some(only) = self.tokens.keys().next() {
                self.default_org = only.clone();
            }
        } else if self.tokens.is_empty() {
            self.default_org.clear();
        }

        Ok(())
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.default_org.clear();
    }

    pub fn set_default(&mut self, org_id: &str) -> Result<()> {
        if !self.tokens.contains_key(org_id) {
            return Err(Error::NotFound(org_id.to_string()));
        }
        self.default_org = org_id.to_string();
        Ok(())
    }

    /// Store key for an organization given by id, slug or name.
    ///
    /// Ids match exactly; slugs and then names match ignoring case.
    pub fn org_key(&self, key: &str) -> Option<&str> {
        if let Some((id, _)) = self.tokens.get_key_value(key) {
            return Some(id.as_str());
        }
        let by_slug = self
            .tokens
            .iter()
            .find(|(_, c)| !c.org_slug.is_empty() && c.org_slug.eq_ignore_ascii_case(key));
        by_slug
            .or_else(|| {
                self.tokens
                    .iter()
                    .find(|(_, c)| c.org_name.eq_ignore_ascii_case(key))
            })
            .map(|(id, _)| id.as_str())
    }

    /// Look up a credential by organization, or the default when `org_id` is empty.
    pub fn resolve(&self, org_id: Option<&str>) -> Result<(String, AccessCredential)> {
        if self.is_empty() {
            return Err(Error::NoToken {
                org: org_id.map(str::to_string),
            });
        }

        let org = match org_id.filter(|o| !o.is_empty()) {
            Some(org) => org,
            None => self.default_org().ok_or(Error::NoToken { org: None })?,
        };

        self.tokens
            .get(org)
            .map(|credential| (org.to_string(), credential.clone()))
            .ok_or_else(|| Error::NoToken {
                org: Some(org.to_string()),
            })
    }
}

/// Where a store write ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Keychain,
    /// The keychain write failed and the store went to this file.
    File(PathBuf),
}

/// Reads and writes the token store through injected vault and filesystem
/// capabilities.
#[derive(Clone)]
pub struct CredentialStore {
    vault: Arc<dyn SecretVault>,
    fs: Arc<dyn FileSystem>,
    file_path: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(
        vault: Arc<dyn SecretVault>,
        fs: Arc<dyn FileSystem>,
        file_path: Option<PathBuf>,
    ) -> Self {
        Self {
            vault,
            fs,
            file_path,
        }
    }

    pub fn file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }

    /// Load the store, or an empty one when nothing readable is persisted.
    pub fn load(&self) -> TokenStore {
        match self.vault.load() {
            Ok(Some(blob)) => match TokenStore::decode(&blob) {
                Ok(store) => return store,
                Err(e) => tracing::warn!("Ignoring unreadable token store in keychain: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::debug!("Keychain read failed: {}", e),
        }

        if let Some(path) = self.file_path.as_ref().filter(|p| self.fs.exists(p)) {
            match self.fs.read(path) {
                Ok(bytes) => match TokenStore::decode(&String::from_utf8_lossy(&bytes)) {
                    Ok(store) => {
                        tracing::debug!("Read token store from {}", path.display());
                        return store;
                    }
                    Err(e) => tracing::warn!(
                        "Ignoring unreadable token store at {}: {}",
                        path.display(),
                        e
                    ),
                },
                Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
            }
        }

        TokenStore::default()
    }

    /// Persist the whole store to the keychain, or to the fallback file.
    ///
    /// Only one backend holds the store after a successful save.
    pub fn save(&self, store: &TokenStore) -> Result<StorageBackend> {
        let blob = store.encode()?;

        let vault_err = match self.vault.save(&blob) {
            Ok(()) => {
                if let Some(path) = self.file_path.as_ref().filter(|p| self.fs.exists(p)) {
                    if let Err(e) = self.fs.remove(path) {
                        tracing::warn!("Failed to remove stale token file {}: {}", path.display(), e);
                    }
                }
                tracing::info!("Saved {} token(s) to keychain", store.tokens.len());
                return Ok(StorageBackend::Keychain);
            }
            Err(e) => e,
        };

        let path = self.file_path.as_ref().ok_or_else(|| {
            Error::Storage(format!(
                "keychain: {}; no config directory for the fallback file",
                vault_err
            ))
        })?;

        tracing::warn!(
            "Secure storage unavailable ({}), storing tokens in {}",
            vault_err,
            path.display()
        );

        self.fs.write_private(path, blob.as_bytes()).map_err(|e| {
            Error::Storage(format!(
                "keychain: {}; file {}: {}",
                vault_err,
                path.display(),
                e
            ))
        })?;

        // A stale keychain blob would shadow the file on the next read
        if let Err(e) = self.vault.delete() {
            tracing::debug!("Could not clear keychain entry: {}", e);
        }

        tracing::info!("Saved {} token(s) to {}", store.tokens.len(), path.display());
        Ok(StorageBackend::File(path.clone()))
    }

    fn update(&self, apply: impl FnOnce(&mut TokenStore) -> Result<()>) -> Result<StorageBackend> {
        let mut store = self.load();
        apply(&mut store)?;
        self.save(&store)
    }

    /// Add or replace the token for an organization.
    pub fn set_credential(
        &self,
        org_id: &str,
        token: &str,
        token_type: &str,
        org_name: &str,
        org_slug: &str,
        expires_at: Option<i64>,
    ) -> Result<StorageBackend> {
        let credential = AccessCredential {
            access_token: token.to_string(),
            token_type: token_type.to_string(),
            org_name: org_name.to_string(),
            org_slug: org_slug.to_string(),
            expires_at,
        };
        self.update(|store| {
            store.upsert(org_id, credential);
            Ok(())
        })
    }

    /// Token for `org_id`, or for the default organization when `None` or empty.
    pub fn get_credential(&self, org_id: Option<&str>) -> Result<(String, AccessCredential)> {
        self.load().resolve(org_id)
    }

    pub fn list_credentials(&self) -> TokenStore {
        self.load()
    }

    pub fn remove_credential(&self, org_id: &str) -> Result<StorageBackend> {
        self.update(|store| store.remove(org_id))
    }

    pub fn remove_all(&self) -> Result<StorageBackend> {
        self.update(|store| {
            store.clear();
            Ok(())
        })
    }

    pub fn get_default(&self) -> Option<String> {
        self.load().default_org().map(str::to_string)
    }

    pub fn set_default(&self, org_id: &str) -> Result<StorageBackend> {
        self.update(|store| store.set_default(org_id))
    }
}
