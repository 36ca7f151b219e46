//! Explicitly constructed owner of the shared client, store and handler slot.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError, ExpiryHandlerSlot};
use crate::auth::{CredentialStore, KeyringBackend, SecretBackend};
use crate::config::ClientSettings;

/// Build one per process and hand it to whatever builds the
/// [`SessionCoordinator`](crate::SessionCoordinator).
#[derive(Clone)]
pub struct ClientContext {
    settings: ClientSettings,
    store: CredentialStore,
    expiry: ExpiryHandlerSlot,
    api: ApiClient,
}

impl ClientContext {
    pub fn new(settings: ClientSettings, backend: Arc<dyn SecretBackend>) -> Result<Self, ApiError> {
        let store = CredentialStore::new(backend);
        let expiry = ExpiryHandlerSlot::new();
        let api = ApiClient::new(&settings, store.clone(), expiry.clone())?;
        Ok(Self {
            settings,
            store,
            expiry,
            api,
        })
    }

    /// Context backed by the OS keychain under the configured service name
    pub fn with_keyring(settings: ClientSettings) -> Result<Self, ApiError> {
        let backend = Arc::new(KeyringBackend::new(settings.keyring_service.clone()));
        Self::new(settings, backend)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn expiry(&self) -> &ExpiryHandlerSlot {
        &self.expiry
    }
}
