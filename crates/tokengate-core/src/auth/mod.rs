//! Authentication module for managing the user session and its credential.
//!
//! This module provides:
//! - `CredentialStore`: secure OS-level storage of the bearer token via keyring
//! - `Credential` / `Claims`: the token and its decoded role claim
//! - `SessionCoordinator`: bootstrap, login and logout of the session
//!
//! Only the raw token is persisted; the decoded role lives in memory.

pub mod claims;
pub mod credentials;
pub mod error;
pub mod session;

pub use claims::{Claims, Credential, CredentialRejection, DecodeError};
pub use credentials::{
    CredentialStore, KeyringBackend, MemoryBackend, SecretBackend, StorageError, CREDENTIAL_KEY,
};
pub use error::{AuthError, FieldErrors, LoginError};
pub use session::{SessionCoordinator, SessionPhase, SessionState};
