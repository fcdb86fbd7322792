//! Test doubles for the transport, vault and filesystem capabilities.

use crate::api::{ApiRequest, ApiResponse, Method, Transport};
use crate::auth::vault::{SecretVault, VaultError};
use crate::error::{Error, Result};
use crate::fs::{FileSystem, OsFs};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn request_key(request: &ApiRequest) -> String {
    let method = match request.method {
        Method::Get => "GET",
        Method::Post => "POST",
    };
    format!("{} {}", method, request.path)
}

/// Scripted transport keyed by `"METHOD /path"`.
///
/// Each key holds a queue of outcomes; the last outcome repeats once the
/// queue is down to one entry.
#[derive(Default)]
pub struct MockTransport {
    scripted: Mutex<HashMap<String, VecDeque<Result<ApiResponse>>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, key: &str, status: u16, body: serde_json::Value) {
        self.push(
            key,
            Ok(ApiResponse {
                status,
                body: body.to_string().into_bytes(),
            }),
        );
    }

    pub fn fail(&self, key: &str, message: &str) {
        self.push(key, Err(Error::Connectivity(message.to_string())));
    }

    fn push(&self, key: &str, outcome: Result<ApiResponse>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.requests().iter().map(request_key).collect()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == key).count()
    }
}

fn clone_outcome(outcome: &Result<ApiResponse>) -> Result<ApiResponse> {
    match outcome {
        Ok(response) => Ok(response.clone()),
        Err(e) => Err(Error::Connectivity(e.to_string())),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let key = request_key(&request);
        self.requests.lock().unwrap().push(request);

        let mut scripted = self.scripted.lock().unwrap();
        let queue = scripted
            .get_mut(&key)
            .ok_or_else(|| Error::Connectivity(format!("unscripted request: {}", key)))?;

        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .map(clone_outcome)
                .unwrap_or_else(|| Err(Error::Connectivity(format!("unscripted request: {}", key))))
        }
    }
}

/// In-memory vault.
#[derive(Default)]
pub struct MemoryVault {
    secret: Mutex<Option<String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.secret.lock().unwrap().clone()
    }

    pub fn set_contents(&self, secret: &str) {
        *self.secret.lock().unwrap() = Some(secret.to_string());
    }
}

impl SecretVault for MemoryVault {
    fn load(&self) -> std::result::Result<Option<String>, VaultError> {
        Ok(self.contents())
    }

    fn save(&self, secret: &str) -> std::result::Result<(), VaultError> {
        self.set_contents(secret);
        Ok(())
    }

    fn delete(&self) -> std::result::Result<(), VaultError> {
        *self.secret.lock().unwrap() = None;
        Ok(())
    }
}

/// Vault that is never available, like a headless host without a keychain.
#[derive(Default)]
pub struct FailingVault;

impl SecretVault for FailingVault {
    fn load(&self) -> std::result::Result<Option<String>, VaultError> {
        Err(VaultError("platform secure storage failure".to_string()))
    }

    fn save(&self, _secret: &str) -> std::result::Result<(), VaultError> {
        Err(VaultError("platform secure storage failure".to_string()))
    }

    fn delete(&self) -> std::result::Result<(), VaultError> {
        Err(VaultError("platform secure storage failure".to_string()))
    }
}

/// Vault that reads fine but rejects writes, like a keychain entry that
/// exceeds the platform size limit.
#[derive(Default)]
pub struct ReadOnlyVault {
    inner: MemoryVault,
}

impl ReadOnlyVault {
    pub fn with_contents(secret: &str) -> Self {
        let inner = MemoryVault::new();
        inner.set_contents(secret);
        Self { inner }
    }

    pub fn contents(&self) -> Option<String> {
        self.inner.contents()
    }
}

impl SecretVault for ReadOnlyVault {
    fn load(&self) -> std::result::Result<Option<String>, VaultError> {
        self.inner.load()
    }

    fn save(&self, _secret: &str) -> std::result::Result<(), VaultError> {
        Err(VaultError("secret too large for platform vault".to_string()))
    }

    fn delete(&self) -> std::result::Result<(), VaultError> {
        self.inner.delete()
    }
}

/// Real filesystem that can be told to fail writes to one path, or removals.
///
/// A failing write leaves half of the new contents on disk before
/// returning the error, the way an interrupted write would.
#[derive(Default)]
pub struct FlakyFs {
    fail_writes_to: Mutex<Option<PathBuf>>,
    fail_private_writes: Mutex<bool>,
    fail_removes: Mutex<bool>,
}

impl FlakyFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_to(&self, path: &Path) {
        *self.fail_writes_to.lock().unwrap() = Some(path.to_path_buf());
    }

    pub fn fail_private_writes(&self) {
        *self.fail_private_writes.lock().unwrap() = true;
    }

    pub fn fail_removes(&self) {
        *self.fail_removes.lock().unwrap() = true;
    }
}

impl FileSystem for FlakyFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        OsFs.read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.fail_writes_to.lock().unwrap().as_deref() == Some(path) {
            OsFs.write(path, &contents[..contents.len() / 2])?;
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        OsFs.write(path, contents)
    }

    fn write_private(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if *self.fail_private_writes.lock().unwrap() {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only config dir"));
        }
        OsFs.write_private(path, contents)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        OsFs.copy(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if *self.fail_removes.lock().unwrap() {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "file is locked"));
        }
        OsFs.remove(path)
    }

    fn exists(&self, path: &Path) -> bool {
        OsFs.exists(path)
    }
}
