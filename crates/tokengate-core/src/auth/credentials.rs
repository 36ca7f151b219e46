use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Keychain service name used when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "tokengate";

/// The single key the bearer token is stored under
pub const CREDENTIAL_KEY: &str = "userToken";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Secure storage failure: {0}")]
    Platform(String),
}

impl From<keyring::Error> for StorageError {
    fn from(err: keyring::Error) -> Self {
        StorageError::Platform(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Synchronous secret storage. Implementations must treat a missing key as
/// `Ok(None)` on read and as success on delete.
pub trait SecretBackend: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn delete(&self, key: &str) -> StorageResult<()>;
}

/// OS keychain backend (Keychain, Secret Service, Credential Manager)
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> StorageResult<Entry> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl SecretBackend for KeyringBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process backend. Nothing survives the process.
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.data
            .lock()
            .map_err(|_| StorageError::Platform("memory store lock poisoned".to_string()))
    }
}

impl SecretBackend for MemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Async access to the one persisted bearer token.
/// Clone is cheap - the backend is shared.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecretBackend>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self { backend }
    }

    /// Read the stored token. A missing entry is `Ok(None)`.
    pub async fn get(&self) -> StorageResult<Option<String>> {
        let value = self.run(|backend| backend.get(CREDENTIAL_KEY)).await?;
        debug!(present = value.is_some(), "Credential read");
        Ok(value)
    }

    /// Store the token, replacing any previous one
    pub async fn set(&self, token: &str) -> StorageResult<()> {
        let token = token.to_string();
        self.run(move |backend| backend.set(CREDENTIAL_KEY, &token))
            .await?;
        debug!("Credential stored");
        Ok(())
    }

    /// Remove the stored token. Deleting an absent token succeeds.
    pub async fn delete(&self) -> StorageResult<()> {
        self.run(|backend| backend.delete(CREDENTIAL_KEY)).await?;
        debug!("Credential deleted");
        Ok(())
    }

    // Keychain calls block, so they go to the blocking pool
    async fn run<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SecretBackend) -> StorageResult<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || op(&*backend))
            .await
            .map_err(|e| StorageError::Platform(format!("storage task failed: {}", e)))?
    }
}
