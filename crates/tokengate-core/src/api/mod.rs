//! REST API client module for the inventory management backend.
//!
//! This module provides the `ApiClient`, the single shared HTTP client every
//! request goes through. It attaches the stored bearer token to outgoing
//! requests and reports 401 responses to the registered expiry handler.

pub mod client;
pub mod error;
pub mod expiry;
pub mod models;

pub use client::{ApiClient, LOGIN_PATH};
pub use error::{ApiError, ErrorBody};
pub use expiry::{ExpiryHandler, ExpiryHandlerSlot};
pub use models::{ErrorEnvelope, FieldError, LoginRequest, LoginResult, Message};
