//! The session-expired callback slot shared by the client and the session.

use std::sync::{Arc, RwLock};

pub type ExpiryHandler = Arc<dyn Fn() + Send + Sync>;

/// Holds at most one handler. Registering again replaces the previous one.
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct ExpiryHandlerSlot {
    handler: Arc<RwLock<Option<ExpiryHandler>>>,
}

impl ExpiryHandlerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut slot = self.handler.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(handler));
    }

    pub fn is_set(&self) -> bool {
        self.handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Invoke the handler if one is registered. Returns whether one ran.
    pub fn fire(&self) -> bool {
        // Release the lock before calling so the handler may re-register
        let handler = self
            .handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}
