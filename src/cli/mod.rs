//! Command implementations for the tmcloud binary.

pub mod auth;
pub mod sync;
pub mod tokens;

use std::sync::Arc;
use tmcloud::api::{CloudClient, ReqwestTransport, Transport};
use tmcloud::auth::{resolve_credential, AccessCredential, CredentialStore, KeyringVault, StorageBackend};
use tmcloud::config::Settings;
use tmcloud::document::HclParser;
use tmcloud::fs::OsFs;
use tmcloud::sync::Reconciler;
use tmcloud::{Error, Result};

/// Production wiring shared by every command.
pub struct App {
    pub settings: Settings,
    pub transport: Arc<dyn Transport>,
    pub client: CloudClient,
    pub store: CredentialStore,
}

impl App {
    pub fn new(settings: Settings) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&settings.api_url)?);
        let client = CloudClient::new(Arc::clone(&transport));
        let store = CredentialStore::new(
            Arc::new(KeyringVault::default()),
            Arc::new(OsFs),
            settings.token_file(),
        );

        tracing::debug!("Using API at {}", settings.api_url);

        Ok(Self {
            settings,
            transport,
            client,
            store,
        })
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.client.clone(), Arc::new(OsFs), Arc::new(HclParser))
    }

    /// Organization and credential for a command, honoring `--org` and `TMCLOUD_ORG`.
    pub async fn credential(&self, org: Option<&str>) -> Result<(String, AccessCredential)> {
        resolve_credential(
            &self.store,
            &self.client,
            org,
            self.settings.org_override.as_deref(),
        )
        .await
    }

    /// Map an organization id, slug or stored name to its store key.
    pub fn org_key(&self, org: &str) -> String {
        let tokens = self.store.list_credentials();
        tokens.org_key(org).unwrap_or(org).to_string()
    }
}

/// Tell the user when tokens ended up in the fallback file.
pub fn report_backend(backend: &StorageBackend) {
    if let StorageBackend::File(path) = backend {
        eprintln!(
            "Warning: secure storage unavailable, tokens saved to {}",
            path.display()
        );
    }
}

/// Follow-up advice for errors the user can fix.
pub fn hint(error: &Error) -> Option<&'static str> {
    match error {
        Error::NoToken { .. } | Error::Auth(_) => Some("Run `tmcloud login` to sign in."),
        Error::Timeout { .. } => Some("The code expired before it was approved. Run `tmcloud login` again."),
        Error::Configuration(_) => Some(
            "Add a single block like:\n\n  backend \"tmcloud\" {\n    organization = \"<org-slug>\"\n  }",
        ),
        Error::Connectivity(_) => Some("Check your network connection and TMCLOUD_API_URL."),
        _ => None,
    }
}
