//! API client for communicating with the inventory management REST API.
//!
//! Every request passes through two steps around the actual send:
//! - outbound: the stored token, if any, is attached as a bearer header
//! - inbound: a 401 fires the registered expiry handler, then the original
//!   error is returned to the caller unchanged

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::config::ClientSettings;

use super::expiry::ExpiryHandlerSlot;
use super::models::{LoginRequest, LoginResult, Message};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, relative to the base URL
pub const LOGIN_PATH: &str = "/api/auth/login";

/// API client shared by the whole process.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and the store and handler slot are shared handles.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: CredentialStore,
    expiry: ExpiryHandlerSlot,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        settings: &ClientSettings,
        store: CredentialStore,
        expiry: ExpiryHandlerSlot,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            store,
            expiry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Start a request against a path relative to the base URL.
    /// Send it with [`ApiClient::send`] so it goes through the pipeline.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send a request through the pipeline
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = self.authorize(request).await;
        let result = match request.send().await {
            Ok(response) => Self::check_response(response).await,
            Err(e) => Err(ApiError::NetworkError(e)),
        };
        self.intercept(result)
    }

    /// Attach the stored token. A missing token, or a store that can't be
    /// read, sends the request without one and leaves it to the server.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.get().await {
            Ok(Some(token)) => request.bearer_auth(token),
            Ok(None) => request,
            Err(e) => {
                warn!(error = %e, "Could not read credential, sending unauthenticated");
                request
            }
        }
    }

    fn intercept(&self, result: Result<Response, ApiError>) -> Result<Response, ApiError> {
        if let Err(ref e) = result {
            if e.is_unauthorized() {
                let handled = self.expiry.fire();
                warn!(handled, "Request rejected with 401, session expired");
            }
        }
        result
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            debug!(status = %status, error = %err, "Request failed");
            Err(err)
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let response = self.send(self.request(Method::GET, path)).await?;
        Self::parse_json(response, path).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "POST");
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        Self::parse_json(response, path).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "PUT");
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        Self::parse_json(response, path).await
    }

    /// DELETE a resource. Any response body is discarded.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        debug!(path, "DELETE");
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    // ===== Authentication =====

    /// Exchange an email and password for a bearer token
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let message: Message<LoginResult> = self
            .post(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        Ok(message.result.jwt)
    }
}
