//! Bearer token decoding.
//!
//! Tokens are standard three-segment signed tokens. The signature is never
//! checked here - the issuing server is trusted - only the claims segment is
//! decoded so the session can branch on the user's role.

use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Base64url that accepts segments with or without trailing padding
const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Token must have three segments, found {0}")]
    Segments(usize),

    #[error("Claims segment is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Claims segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decoded claims segment.
///
/// Only `role` is typed strictly. The standard claims are display-only, so a
/// value of an unexpected type is read as absent instead of failing decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "subject_or_none")]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "seconds_or_none")]
    pub iat: Option<i64>,
    #[serde(default, deserialize_with = "seconds_or_none")]
    pub exp: Option<i64>,
}

// Numeric subjects (user ids) are kept as their decimal text
fn subject_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// NumericDate may carry a fractional part; it is truncated to whole seconds
fn seconds_or_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite() && secs.abs() < i64::MAX as f64)
            .map(|secs| secs.trunc() as i64)
    }))
}

impl Claims {
    /// Decode the claims segment of a token without verifying its signature
    pub fn decode(token: &str) -> Result<Self, DecodeError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(DecodeError::Segments(segments.len()));
        }
        let bytes = CLAIMS_ENGINE.decode(segments[1])?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The role claim, if present and non-empty
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref().filter(|r| !r.is_empty())
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Informational only; expiry is enforced by the server
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// A bearer token whose claims decoded and carry a role.
///
/// Holding a `Credential` means the role is known, so session state can never
/// have one without the other.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    claims: Claims,
}

/// Why a raw token could not become a `Credential`
#[derive(Debug)]
pub enum CredentialRejection {
    Decode(DecodeError),
    MissingRole,
}

impl Credential {
    pub fn parse(token: impl Into<String>) -> Result<Self, CredentialRejection> {
        let token = token.into();
        let claims = Claims::decode(&token).map_err(CredentialRejection::Decode)?;
        if claims.role().is_none() {
            return Err(CredentialRejection::MissingRole);
        }
        Ok(Self { token, claims })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> &str {
        // parse() guarantees the role is present
        self.claims.role().unwrap_or_default()
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}
