//! Content store collaborator
//!
//! The graph components only ever talk to a store through the
//! [`ContentStore`] trait, which mirrors the coarse primitives a
//! content-addressed network exposes: list the links of a directory,
//! stat locality, pin, import from the filesystem, create and patch
//! directories, and fetch content.
//!
//! Two implementations live here:
//! - [`MemoryStore`]: deterministic in-memory store with call counters
//!   and failure injection, used to exercise the graph components
//! - [`BlobsStore`]: iroh-blobs backed store with a persisted pin set

mod blobs;
mod block;
mod import;
mod memory;
mod pins;

use std::fmt::Debug;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};

use crate::object::{ContentHash, HashError, LocalityStat, ObjectLink};

pub use blobs::{BlobsStore, BlobsStoreError};
pub use block::DirectoryBlock;
pub use import::path_size;
pub use memory::{MemoryStore, PatchCall};
pub use pins::Pins;

/// Bytes of a file, as the store streams them out
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("content store unreachable: {0}")]
    Transport(String),
    #[error("no known content for {0}")]
    NotFound(ContentHash),
    #[error("stat for {hash} is incomplete: {reason}")]
    MissingSize {
        hash: ContentHash,
        reason: &'static str,
    },
    #[error("{0} is not a directory")]
    NotDirectory(ContentHash),
    #[error("{0} is a directory")]
    IsDirectory(ContentHash),
    #[error("invalid link name {0:?}")]
    InvalidName(String),
    #[error("invalid hash: {0}")]
    Hash(#[from] HashError),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("content store error: {0}")]
    Default(#[from] anyhow::Error),
}

impl StoreError {
    /// Failures that only tell us the content could not be reached,
    ///  as opposed to the store giving a malformed answer
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            StoreError::Transport(_)
                | StoreError::NotFound(_)
                | StoreError::Io(_)
                | StoreError::Default(_)
        )
    }
}

/// Options for importing a path from the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOptions {
    /// Descend into directories
    pub recursive: bool,
    /// Entry names that are skipped wherever they appear
    pub denylist: Vec<String>,
}

impl Default for AddOptions {
    fn default() -> Self {
        crate::config::SyncConfig::default().add_options()
    }
}

impl AddOptions {
    pub fn is_denied(&self, name: &str) -> bool {
        self.denylist.iter().any(|denied| denied == name)
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync + Debug {
    /// List the direct links of a directory
    async fn list_children(&self, hash: &ContentHash) -> Result<Vec<ObjectLink>, StoreError>;

    /// Report how much of a hash (cumulatively) is present locally
    async fn stat_locality(&self, hash: &ContentHash) -> Result<LocalityStat, StoreError>;

    /// Ask the store to retrieve and retain a hash.
    ///  Returns once the request is acknowledged, not once the
    ///  content has arrived.
    async fn pin_add(&self, hash: &ContentHash) -> Result<(), StoreError>;

    /// Import a file or directory from disk, returning the hash
    ///  of the top-level object
    async fn add_from_filesystem(
        &self,
        path: &Path,
        options: &AddOptions,
    ) -> Result<ContentHash, StoreError>;

    async fn new_empty_directory(&self) -> Result<ContentHash, StoreError>;

    /// Add a link to a directory. Content addressing means this
    ///  never mutates `dir`, it returns the hash of a new directory.
    async fn patch_add_link(
        &self,
        dir: &ContentHash,
        name: &str,
        child: &ContentHash,
    ) -> Result<ContentHash, StoreError>;

    /// Stream the bytes of a file
    async fn fetch(&self, hash: &ContentHash) -> Result<ByteStream, StoreError>;

    /// Store a raw blob
    async fn add_bytes(&self, data: Bytes) -> Result<ContentHash, StoreError>;

    /// Hashes currently pinned
    async fn pins(&self) -> Result<Vec<ContentHash>, StoreError>;

    /// Fetch a whole file into memory
    async fn fetch_bytes(&self, hash: &ContentHash) -> Result<Bytes, StoreError> {
        let chunks: Vec<Bytes> = self.fetch(hash).await?.try_collect().await?;
        Ok(chunks.concat().into())
    }
}
