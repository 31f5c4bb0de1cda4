//! Session context: the browsing-session identity plus its storage.

pub mod identity;
pub mod storage;

pub use identity::IdentityStore;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};

use crate::SessionId;
use crate::config::StorageConfig;

use std::sync::Arc;

/// Explicit session context handed to the dispatch engine.
///
/// Replaces ambient session storage: everything the engine persists goes
/// through `storage`, keyed by `id`.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    storage: Arc<dyn SessionStorage>,
    keys: StorageConfig,
}

impl Session {
    /// Open the session backed by `storage`, assigning an id on first use.
    pub fn open(storage: Arc<dyn SessionStorage>, keys: StorageConfig) -> Self {
        let id = IdentityStore::new(storage.as_ref(), &keys.identity_key).get_or_create();
        Self { id, storage, keys }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Storage key of this session's conversation log.
    pub fn log_key(&self) -> String {
        format!("{}{}", self.keys.log_key_prefix, self.id)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
