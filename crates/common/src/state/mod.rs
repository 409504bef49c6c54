//! Application state collaborator
//!
//! The graph components never own application state. They report what
//! they learn as [`Fact`]s and read/write shares through the
//! [`StateContainer`] trait; how and where that state is kept is up to
//! the implementation. The only consistency assumed is read-your-writes
//! within a single operation.

mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::object::{ContentHash, Locality, ObjectLink};
use crate::share::{Share, ShareError};

pub use memory::{MemoryState, FACT_LOG_CAPACITY};

/// Something learned about a hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    /// The direct links of a directory
    DirectoryMetadata {
        hash: ContentHash,
        links: Vec<ObjectLink>,
    },
    /// A validated locality answer
    Locality { hash: ContentHash, locality: Locality },
    /// Locality could not be determined, the hash counts as not local
    NotLocal { hash: ContentHash },
}

impl Fact {
    pub fn hash(&self) -> &ContentHash {
        match self {
            Fact::DirectoryMetadata { hash, .. } => hash,
            Fact::Locality { hash, .. } => hash,
            Fact::NotLocal { hash } => hash,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("share not found: {0}")]
    ShareNotFound(Uuid),
    #[error("share error: {0}")]
    Share(#[from] ShareError),
    #[error("state container error: {0}")]
    Default(#[from] anyhow::Error),
}

#[async_trait]
pub trait StateContainer: Send + Sync + std::fmt::Debug {
    /// Merge a fact about a hash
    async fn record_fact(&self, fact: Fact) -> Result<(), StateError>;

    /// Read the current version of a share
    async fn share(&self, id: Uuid) -> Result<Share, StateError>;

    /// Insert or replace a share, returning what is now stored
    async fn store_share(&self, share: Share) -> Result<Share, StateError>;

    /// Assign the published hash of a share. Fails if the share
    ///  already has one.
    async fn set_share_hash(&self, id: Uuid, hash: ContentHash) -> Result<Share, StateError>;

    /// Mark a recipient of a share as notified
    async fn set_recipient_notified(&self, id: Uuid, public_key: &str)
        -> Result<Share, StateError>;

    async fn list_shares(&self) -> Result<Vec<Share>, StateError>;
}
