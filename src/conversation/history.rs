//! Conversation Log Store: persists the ordered message history per session.

use crate::conversation::Message;
use crate::session::Session;

/// Reads and overwrites the serialized log of one session.
///
/// Failures never propagate: a corrupted log loads as absent and a failed
/// write is logged, so the engine stays usable either way.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    session: Session,
}

impl ConversationStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Load the persisted log, or `None` when absent or unreadable.
    pub fn load(&self) -> Option<Vec<Message>> {
        let key = self.session.log_key();
        let raw = self.session.storage().get(&key)?;

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                tracing::debug!(
                    session_id = %self.session.id(),
                    count = messages.len(),
                    "conversation log restored"
                );
                Some(messages)
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    session_id = %self.session.id(),
                    "discarding corrupted conversation log"
                );
                None
            }
        }
    }

    /// Overwrite the persisted log with `messages`. Last write wins.
    pub fn save(&self, messages: &[Message]) {
        let encoded = match serde_json::to_string(messages) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::warn!(%error, session_id = %self.session.id(), "failed to encode conversation log");
                return;
            }
        };

        if let Err(error) = self.session.storage().set(&self.session.log_key(), &encoded) {
            tracing::warn!(%error, session_id = %self.session.id(), "failed to persist conversation log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::conversation::Origin;
    use crate::session::{MemoryStorage, SessionStorage};
    use std::sync::Arc;

    fn open(storage: &MemoryStorage) -> ConversationStore {
        ConversationStore::new(Session::open(
            Arc::new(storage.clone()),
            StorageConfig::default(),
        ))
    }

    #[test]
    fn absent_log_loads_as_none() {
        let storage = MemoryStorage::new();
        assert!(open(&storage).load().is_none());
    }

    #[test]
    fn round_trip_preserves_order_and_timestamps() {
        let storage = MemoryStorage::new();
        let store = open(&storage);
        let messages = vec![
            Message::agent("Hi! How can we help?"),
            Message::user("Do you offer financing?"),
            Message::agent("Yes!"),
            Message::agent("We have flexible options."),
        ];

        store.save(&messages);
        let restored = open(&storage).load().expect("log should restore");

        assert_eq!(restored, messages);
        assert_eq!(restored[1].origin, Origin::User);
    }

    #[test]
    fn corrupted_log_loads_as_none() {
        let storage = MemoryStorage::new();
        let store = open(&storage);
        let key = Session::open(Arc::new(storage.clone()), StorageConfig::default()).log_key();
        storage.set(&key, "[{\"origin\":").expect("set");

        assert!(store.load().is_none());
    }

    #[test]
    fn save_overwrites_previous_log() {
        let storage = MemoryStorage::new();
        let store = open(&storage);

        store.save(&[Message::agent("first")]);
        store.save(&[Message::agent("first"), Message::user("second")]);

        assert_eq!(store.load().expect("log").len(), 2);
    }
}
