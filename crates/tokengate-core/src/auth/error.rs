use thiserror::Error;

use crate::api::{ApiError, ErrorEnvelope};

use super::claims::{CredentialRejection, DecodeError};
use super::credentials::StorageError;

/// Shown when the server gave no structured payload (connect failure, timeout)
pub const CONNECTION_ERROR_MESSAGE: &str = "No se pudo conectar con el servidor.";

/// Shown when the server's error payload has no title
pub const DEFAULT_LOGIN_ERROR_MESSAGE: &str = "Error al iniciar sesión.";

/// Shown when a login succeeded on the wire but returned an unusable token
pub const INVALID_TOKEN_MESSAGE: &str = "Token recibido no contiene un rol.";

/// Shown when a login is attempted over an active session
pub const ALREADY_AUTHENTICATED_MESSAGE: &str = "Ya existe una sesión activa. Cierre sesión primero.";

/// Per-field validation messages from the login endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub email: Vec<String>,
    pub password: Vec<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.email.is_empty() && self.password.is_empty()
    }

    /// Collect messages for the recognized fields; other fields are dropped
    fn from_envelope(envelope: &ErrorEnvelope) -> Self {
        let mut errors = Self::default();
        for entry in &envelope.result {
            match entry.field.as_str() {
                "email" => errors.email = entry.descriptions.clone(),
                "password" => errors.password = entry.descriptions.clone(),
                _ => {}
            }
        }
        errors
    }
}

/// A rejected login, ready to show to the user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{title}")]
pub struct LoginError {
    pub title: String,
    pub description: Option<String>,
    pub field_errors: FieldErrors,
    pub status: Option<u16>,
}

impl LoginError {
    pub fn connection() -> Self {
        Self {
            title: CONNECTION_ERROR_MESSAGE.to_string(),
            description: None,
            field_errors: FieldErrors::default(),
            status: None,
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        match err.envelope() {
            Some(envelope) => Self {
                title: envelope
                    .title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| DEFAULT_LOGIN_ERROR_MESSAGE.to_string()),
                description: envelope.description.clone(),
                field_errors: FieldErrors::from_envelope(envelope),
                status: err.status().map(|s| s.as_u16()),
            },
            None => Self {
                status: err.status().map(|s| s.as_u16()),
                ..Self::connection()
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid token: {0}")]
    Decode(#[from] DecodeError),

    #[error("Token has no role claim")]
    InvalidCredential,

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error("A session is already active")]
    AlreadyAuthenticated,
}

impl From<CredentialRejection> for AuthError {
    fn from(rejection: CredentialRejection) -> Self {
        match rejection {
            CredentialRejection::Decode(e) => AuthError::Decode(e),
            CredentialRejection::MissingRole => AuthError::InvalidCredential,
        }
    }
}

impl AuthError {
    /// Message suitable for a login form
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Login(e) => e.title.clone(),
            AuthError::Decode(_) | AuthError::InvalidCredential => INVALID_TOKEN_MESSAGE.to_string(),
            AuthError::Storage(_) => DEFAULT_LOGIN_ERROR_MESSAGE.to_string(),
            AuthError::AlreadyAuthenticated => ALREADY_AUTHENTICATED_MESSAGE.to_string(),
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AuthError::Login(e) if !e.field_errors.is_empty() => Some(&e.field_errors),
            _ => None,
        }
    }
}
