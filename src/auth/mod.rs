//! Authentication module.
//!
//! This module provides:
//! - `device`: Device authorization flow and its polling loop
//! - `credentials`: Per-organization token store with keychain/file fallback
//! - `vault`: OS keychain access
//! - `login`: Storing a fresh token for the caller's organizations
//! - `resolve`: Choosing which organization a command acts on

pub mod credentials;
pub mod device;
pub mod login;
pub mod resolve;
pub mod vault;

pub use credentials::{AccessCredential, CredentialStore, StorageBackend, TokenStore, STORE_VERSION};
pub use device::{DeviceAuthenticator, DeviceAuthorizationSession};
pub use login::{store_token, StoredLogin};
pub use resolve::resolve_credential;
pub use vault::{KeyringVault, SecretVault, VaultError};
