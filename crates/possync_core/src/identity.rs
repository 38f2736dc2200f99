//! Who is acting.

use crate::error::CoreResult;
use crate::keys;
use possync_storage::{JsonStoreExt, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A signed-in user.
///
/// The `user_id` scopes every remote pull and push; `username` is what the
/// audit log records as the actor name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id, used as the remote owner id.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Role, e.g. "admin" or "cashier".
    pub role: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role: role.into(),
        }
    }

    /// Returns the `(id, name)` pair recorded in audit entries.
    pub fn actor(&self) -> (&str, &str) {
        (&self.user_id, &self.username)
    }
}

/// Resolves the current identity at the moment of asking.
pub trait IdentityProvider: Send + Sync {
    /// Returns the current identity, or `None` if nobody is signed in.
    fn current_identity(&self) -> Option<Identity>;
}

/// An identity fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    /// Always resolves to `identity`.
    pub fn new(identity: Identity) -> Self {
        Self(Some(identity))
    }

    /// Never resolves.
    pub fn none() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

/// The signed-in user as persisted in the local store.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Creates a session over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persists `identity` as the current user.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub fn sign_in(&self, identity: &Identity) -> CoreResult<()> {
        self.store.set_json(keys::CURRENT_USER, identity)?;
        Ok(())
    }

    /// Forgets the current user.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be removed.
    pub fn sign_out(&self) -> CoreResult<()> {
        self.store.remove(keys::CURRENT_USER)?;
        Ok(())
    }
}

impl IdentityProvider for SessionStore {
    fn current_identity(&self) -> Option<Identity> {
        match self.store.get_json(keys::CURRENT_USER) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "unreadable session, treating as signed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use possync_storage::InMemoryStore;

    #[test]
    fn static_identity_resolves() {
        let alice = Identity::new("u1", "alice", "admin");
        assert_eq!(StaticIdentity::new(alice.clone()).current_identity(), Some(alice));
        assert_eq!(StaticIdentity::none().current_identity(), None);
    }

    #[test]
    fn session_sign_in_and_out() {
        let session = SessionStore::new(Arc::new(InMemoryStore::new()));
        assert!(session.current_identity().is_none());

        let bob = Identity::new("u2", "bob", "cashier");
        session.sign_in(&bob).unwrap();
        assert_eq!(session.current_identity(), Some(bob));

        session.sign_out().unwrap();
        assert!(session.current_identity().is_none());
    }

    #[test]
    fn corrupted_session_reads_as_signed_out() {
        let store = Arc::new(InMemoryStore::new());
        store.set(keys::CURRENT_USER, b"not json").unwrap();
        assert!(SessionStore::new(store).current_identity().is_none());
    }

    #[test]
    fn actor_pair() {
        let carol = Identity::new("u3", "carol", "cashier");
        assert_eq!(carol.actor(), ("u3", "carol"));
    }
}
