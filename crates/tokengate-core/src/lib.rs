//! Session lifecycle and authenticated request pipeline for the inventory
//! management backend.
//!
//! This crate provides:
//! - `CredentialStore`: encrypted-at-rest storage of the bearer token
//! - `ApiClient`: the shared HTTP client that attaches the token and
//!   reports rejected sessions
//! - `SessionCoordinator`: in-memory session state, login and logout
//! - `ClientContext`: owner of the shared pieces the above are wired through

pub mod api;
pub mod auth;
pub mod config;
pub mod context;

pub use api::{ApiClient, ApiError, ExpiryHandlerSlot};
pub use auth::{
    AuthError, Claims, Credential, CredentialStore, DecodeError, FieldErrors, KeyringBackend,
    LoginError, MemoryBackend, SecretBackend, SessionCoordinator, SessionPhase, SessionState,
    StorageError,
};
pub use config::{ClientSettings, Config};
pub use context::ClientContext;
