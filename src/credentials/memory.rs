//! In-process credential store.
//!
//! Sessions live only as long as the process. Suitable for a single instance.

use super::{CredentialStore, SessionRecord};
use anyhow::Result;
use dashmap::DashMap;

/// Concurrent in-memory session map.
pub struct MemoryCredentialStore {
    /// Primary storage: session_id -> SessionRecord
    sessions: DashMap<String, SessionRecord>,
    /// Secondary index: owner_identity -> session_id
    identities: DashMap<String, String>,
}

impl MemoryCredentialStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            identities: DashMap::new(),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.get(session_id).map(|r| r.clone()))
    }

    fn put(&self, record: &SessionRecord) -> Result<()> {
        let previous = self
            .sessions
            .insert(record.session_id.clone(), record.clone());

        // Drop a stale index entry if this id used to belong to someone else
        if let Some(previous) = previous {
            if previous.owner_identity != record.owner_identity {
                self.identities
                    .remove_if(&previous.owner_identity, |_, id| *id == record.session_id);
            }
        }

        self.identities
            .insert(record.owner_identity.clone(), record.session_id.clone());
        Ok(())
    }

    fn find_by_identity(&self, owner_identity: &str) -> Result<Option<SessionRecord>> {
        let session_id = match self.identities.get(owner_identity) {
            Some(id) => id.value().clone(),
            None => return Ok(None),
        };
        self.get(&session_id)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}
