//! The user session: bootstrap from storage, login, logout.
//!
//! State is published through a `watch` channel as whole snapshots, so an
//! observer never sees a credential without its role or the other way round.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::context::ClientContext;

use super::claims::Credential;
use super::credentials::CredentialStore;
use super::error::{AuthError, LoginError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Bootstrapping,
    Authenticated { role: String },
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    credential: Option<Credential>,
    is_bootstrapping: bool,
}

impl SessionState {
    fn bootstrapping() -> Self {
        Self {
            credential: None,
            is_bootstrapping: true,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn role(&self) -> Option<&str> {
        self.credential.as_ref().map(Credential::role)
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn is_bootstrapping(&self) -> bool {
        self.is_bootstrapping
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.credential, self.is_bootstrapping) {
            (Some(credential), _) => SessionPhase::Authenticated {
                role: credential.role().to_string(),
            },
            (None, true) => SessionPhase::Bootstrapping,
            (None, false) => SessionPhase::Unauthenticated,
        }
    }
}

struct Inner {
    api: ApiClient,
    store: CredentialStore,
    state: watch::Sender<SessionState>,
}

/// Owns the in-memory session. Clone is cheap - clones share state.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    /// Create the coordinator and register its logout as the context's
    /// session-expired handler.
    pub fn new(ctx: &ClientContext) -> Self {
        let (state, _) = watch::channel(SessionState::bootstrapping());
        let coordinator = Self {
            inner: Arc::new(Inner {
                api: ctx.api().clone(),
                store: ctx.store().clone(),
                state,
            }),
        };
        coordinator.register_expiry_handler(ctx);
        coordinator
    }

    // The handler only enqueues the logout; the failing request's caller
    // gets its error without waiting for it.
    fn register_expiry_handler(&self, ctx: &ClientContext) {
        let weak = Arc::downgrade(&self.inner);
        ctx.expiry().set(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let coordinator = SessionCoordinator { inner };
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = coordinator.logout().await {
                            warn!(error = %e, "Forced logout could not clear stored credential");
                        }
                    });
                }
                Err(_) => warn!("Session expired outside a runtime, logout skipped"),
            }
        });
    }

    /// Restore the session from storage. Never fails and never touches the
    /// network; anything unusable in storage is deleted.
    pub async fn bootstrap(&self) -> SessionPhase {
        match self.restore().await {
            Ok(Some(credential)) => {
                info!(role = credential.role(), "Session restored");
                self.inner.state.send_modify(|s| {
                    s.credential = Some(credential);
                    s.is_bootstrapping = false;
                });
            }
            Ok(None) => {
                debug!("No stored session");
                self.finish_bootstrap();
            }
            Err(e) => {
                warn!(error = %e, "Stored session unusable, clearing it");
                if let Err(e) = self.inner.store.delete().await {
                    warn!(error = %e, "Failed to delete unusable credential");
                }
                self.finish_bootstrap();
            }
        }
        self.phase()
    }

    async fn restore(&self) -> Result<Option<Credential>, AuthError> {
        match self.inner.store.get().await? {
            Some(token) => Ok(Some(Credential::parse(token)?)),
            None => Ok(None),
        }
    }

    fn finish_bootstrap(&self) {
        self.inner.state.send_modify(|s| s.is_bootstrapping = false);
    }

    /// Log in with an email and password.
    ///
    /// The returned token must carry a role claim; it is persisted before the
    /// session is published. On any failure the session is left as it was.
    /// An active session must be logged out first; logging in over it fails
    /// with `AlreadyAuthenticated` before any request is sent.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if self.has_credential() {
            warn!("Login attempted with an active session");
            return Err(AuthError::AlreadyAuthenticated);
        }

        let token = match self.inner.api.authenticate(email, password).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Login failed");
                return Err(LoginError::from_api_error(&e).into());
            }
        };

        let credential = Credential::parse(token).map_err(|rejection| {
            let err = AuthError::from(rejection);
            error!(error = %err, "Login returned an unusable token");
            err
        })?;

        self.inner.store.set(credential.token()).await?;

        info!(role = credential.role(), "Login successful");
        self.inner.state.send_modify(|s| s.credential = Some(credential));
        Ok(())
    }

    /// Delete the stored credential and clear the session.
    ///
    /// Safe to call repeatedly. The in-memory session is cleared even if the
    /// storage delete fails; that failure is still returned.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let deleted = self.inner.store.delete().await;

        let was_authenticated = self.inner.state.send_if_modified(|s| s.credential.take().is_some());
        if was_authenticated {
            info!("Logged out");
        } else {
            debug!("Logout with no active session");
        }

        deleted.map_err(AuthError::from)
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receive every published session state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.borrow().phase()
    }

    pub fn current_role(&self) -> Option<String> {
        self.inner.state.borrow().role().map(str::to_string)
    }

    pub fn has_credential(&self) -> bool {
        self.inner.state.borrow().has_credential()
    }

    pub fn is_bootstrapping(&self) -> bool {
        self.inner.state.borrow().is_bootstrapping()
    }
}
