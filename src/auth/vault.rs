use keyring::Entry;
use thiserror::Error;

/// Keychain service name for the token store entry
pub const SERVICE_NAME: &str = "tmcloud";

/// Keychain account holding the serialized token store
pub const ACCOUNT_NAME: &str = "token-store";

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct VaultError(pub String);

/// A single opaque secret held by the OS credential vault.
pub trait SecretVault: Send + Sync {
    /// Read the secret. `Ok(None)` means the vault works but holds nothing.
    fn load(&self) -> Result<Option<String>, VaultError>;

    fn save(&self, secret: &str) -> Result<(), VaultError>;

    /// Remove the secret. Deleting a missing entry is not an error.
    fn delete(&self) -> Result<(), VaultError>;
}

/// Vault backed by macOS Keychain, Windows Credential Manager or the
/// Linux kernel keyring.
#[derive(Debug, Clone)]
pub struct KeyringVault {
    service: String,
    account: String,
}

impl Default for KeyringVault {
    fn default() -> Self {
        Self::new(SERVICE_NAME, ACCOUNT_NAME)
    }
}

impl KeyringVault {
    pub fn new(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, VaultError> {
        Entry::new(&self.service, &self.account)
            .map_err(|e| VaultError(format!("Keychain unavailable: {}", e)))
    }
}

impl SecretVault for KeyringVault {
    fn load(&self) -> Result<Option<String>, VaultError> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                tracing::debug!("Read token store from keychain ({})", self.service);
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError(format!("Failed to read keychain entry: {}", e))),
        }
    }

    fn save(&self, secret: &str) -> Result<(), VaultError> {
        self.entry()?
            .set_password(secret)
            .map_err(|e| VaultError(format!("Failed to write keychain entry: {}", e)))?;
        tracing::debug!("Stored token store in keychain ({})", self.service);
        Ok(())
    }

    fn delete(&self) -> Result<(), VaultError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError(format!("Failed to delete keychain entry: {}", e))),
        }
    }
}
