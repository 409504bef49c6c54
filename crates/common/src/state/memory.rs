use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::object::{ContentHash, Locality, ObjectLink};
use crate::share::Share;

use super::{Fact, StateContainer, StateError};

#[derive(Debug, Default)]
struct MemoryStateInner {
    shares: BTreeMap<Uuid, Share>,
    directories: HashMap<ContentHash, Vec<ObjectLink>>,
    // None records a hash whose locality could not be determined
    locality: HashMap<ContentHash, Option<Locality>>,
    // most recent facts, oldest first
    facts: VecDeque<Fact>,
}

/// How many raw facts a [`MemoryState`] remembers
pub const FACT_LOG_CAPACITY: usize = 1024;

/// In-memory state container. Keeps the merged view of every fact it
///  is handed, and the last [`FACT_LOG_CAPACITY`] facts in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    inner: Arc<Mutex<MemoryStateInner>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the container with existing shares
    pub fn with_shares(shares: impl IntoIterator<Item = Share>) -> Self {
        let state = Self::new();
        {
            let mut inner = state.inner.lock();
            for share in shares {
                inner.shares.insert(share.id(), share);
            }
        }
        state
    }

    pub fn shares(&self) -> Vec<Share> {
        self.inner.lock().shares.values().cloned().collect()
    }

    /// The most recently recorded facts, oldest first
    pub fn facts(&self) -> Vec<Fact> {
        self.inner.lock().facts.iter().cloned().collect()
    }

    pub fn directory(&self, hash: &ContentHash) -> Option<Vec<ObjectLink>> {
        self.inner.lock().directories.get(hash).cloned()
    }

    /// Latest locality known for a hash. `Some(None)` means the
    ///  hash was recorded as not local without a stat.
    pub fn locality(&self, hash: &ContentHash) -> Option<Option<Locality>> {
        self.inner.lock().locality.get(hash).copied()
    }

    /// Whether the latest fact about `hash` says it is local
    pub fn is_local(&self, hash: &ContentHash) -> Option<bool> {
        self.locality(hash)
            .map(|locality| locality.map(|l| l.is_local).unwrap_or(false))
    }

    fn update<F>(&self, id: Uuid, f: F) -> Result<Share, StateError>
    where
        F: FnOnce(&mut Share) -> Result<(), StateError>,
    {
        let mut inner = self.inner.lock();
        let share = inner
            .shares
            .get_mut(&id)
            .ok_or(StateError::ShareNotFound(id))?;
        f(share)?;
        Ok(share.clone())
    }
}

#[async_trait]
impl StateContainer for MemoryState {
    async fn record_fact(&self, fact: Fact) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        match &fact {
            Fact::DirectoryMetadata { hash, links } => {
                inner.directories.insert(hash.clone(), links.clone());
            }
            Fact::Locality { hash, locality } => {
                inner.locality.insert(hash.clone(), Some(*locality));
            }
            Fact::NotLocal { hash } => {
                inner.locality.insert(hash.clone(), None);
            }
        }
        if inner.facts.len() == FACT_LOG_CAPACITY {
            inner.facts.pop_front();
        }
        inner.facts.push_back(fact);
        Ok(())
    }

    async fn share(&self, id: Uuid) -> Result<Share, StateError> {
        self.inner
            .lock()
            .shares
            .get(&id)
            .cloned()
            .ok_or(StateError::ShareNotFound(id))
    }

    async fn store_share(&self, share: Share) -> Result<Share, StateError> {
        self.inner.lock().shares.insert(share.id(), share.clone());
        Ok(share)
    }

    async fn set_share_hash(&self, id: Uuid, hash: ContentHash) -> Result<Share, StateError> {
        self.update(id, |share| Ok(share.set_hash(hash)?))
    }

    async fn set_recipient_notified(
        &self,
        id: Uuid,
        public_key: &str,
    ) -> Result<Share, StateError> {
        self.update(id, |share| Ok(share.mark_notified(public_key)?))
    }

    async fn list_shares(&self) -> Result<Vec<Share>, StateError> {
        Ok(self.shares())
    }
}
