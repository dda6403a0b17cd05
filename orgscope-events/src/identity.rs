//! Acting-user lookup.

use std::sync::{Arc, RwLock};

/// Supplies the identity of whoever is performing the current mutation.
pub trait IdentityProvider: Send + Sync {
    /// `None` when no session is active.
    fn current_actor(&self) -> Option<String>;
}

/// No session: every mutation is attributed to nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn current_actor(&self) -> Option<String> {
        None
    }
}

/// Session-scoped actor that can be switched at sign-in and sign-out.
#[derive(Debug, Clone, Default)]
pub struct SessionIdentity {
    actor: Arc<RwLock<Option<String>>>,
}

impl SessionIdentity {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: Arc::new(RwLock::new(Some(actor.into()))),
        }
    }

    pub fn sign_in(&self, actor: impl Into<String>) {
        if let Ok(mut current) = self.actor.write() {
            *current = Some(actor.into());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut current) = self.actor.write() {
            *current = None;
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_actor(&self) -> Option<String> {
        self.actor.read().ok().and_then(|a| a.clone())
    }
}
