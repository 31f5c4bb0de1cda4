//! Session Identity Store: one random identifier per browsing session.

use crate::SessionId;
use crate::session::storage::SessionStorage;

use rand::Rng as _;

/// Random base-36 characters after the `user_` prefix (about 41 bits).
const ID_RANDOM_CHARS: usize = 8;

/// Assigns and remembers the session identifier under a fixed storage key.
pub struct IdentityStore<'a> {
    storage: &'a dyn SessionStorage,
    key: &'a str,
}

impl<'a> IdentityStore<'a> {
    pub fn new(storage: &'a dyn SessionStorage, key: &'a str) -> Self {
        Self { storage, key }
    }

    /// Return the stored identifier, generating and persisting one on first use.
    pub fn get_or_create(&self) -> SessionId {
        if let Some(existing) = self.storage.get(self.key).filter(|id| !id.is_empty()) {
            return SessionId::new(existing);
        }

        let id = generate_session_id();
        if let Err(error) = self.storage.set(self.key, &id) {
            // The id still holds for this process; it just won't survive a reload.
            tracing::warn!(%error, session_id = %id, "failed to persist session id");
        }
        tracing::info!(session_id = %id, "new session id assigned");
        SessionId::new(id)
    }
}

fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_RANDOM_CHARS)
        .map(|_| {
            let digit = rng.random_range(0..36u32);
            std::char::from_digit(digit, 36).unwrap_or('0')
        })
        .collect();
    format!("user_{suffix}")
}
