use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::object::ContentHash;
use crate::store::{ContentStore, StoreError};

use super::Share;

/// What other peers see of a share: enough to find its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareDescription {
    pub title: String,
    pub description: String,
    pub author: Option<String>,
    /// Hash of the wrapper directory
    pub content: ContentHash,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("codec error: {0}")]
    Codec(String),
}

impl ShareDescription {
    pub fn encode(&self) -> Result<Vec<u8>, PublishError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| PublishError::Codec(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, PublishError> {
        serde_ipld_dagcbor::from_slice(data).map_err(|e| PublishError::Codec(e.to_string()))
    }
}

/// Publishes share descriptions, returning the hash they are known by
#[async_trait]
pub trait SharePublisher: Send + Sync {
    async fn publish(&self, description: &ShareDescription) -> Result<ContentHash, PublishError>;
}

/// Publishes descriptions as DAG-CBOR blobs in a content store
#[derive(Debug, Clone)]
pub struct StorePublisher<S> {
    store: S,
}

impl<S> StorePublisher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ContentStore> SharePublisher for StorePublisher<S> {
    async fn publish(&self, description: &ShareDescription) -> Result<ContentHash, PublishError> {
        let data = description.encode()?;
        let hash = self.store.add_bytes(Bytes::from(data)).await?;
        tracing::info!("publish: share {:?} published as {}", description.title, hash);
        Ok(hash)
    }
}

/// Fetch and decode a published share description
pub async fn fetch_share_description<S: ContentStore + ?Sized>(
    store: &S,
    hash: &ContentHash,
) -> Result<Share, PublishError> {
    tracing::debug!("fetch share description: {}", hash);
    let data = store.fetch_bytes(hash).await?;
    let description = ShareDescription::decode(&data)?;
    Ok(Share::from_description(hash.clone(), description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_publish_then_fetch() {
        let store = MemoryStore::new();
        let publisher = StorePublisher::new(store.clone());
        let description = ShareDescription {
            title: "notes".into(),
            description: "meeting notes".into(),
            author: None,
            content: ContentHash::of(b"wrapper"),
        };

        let hash = publisher.publish(&description).await.unwrap();
        let share = fetch_share_description(&store, &hash).await.unwrap();

        assert_eq!(share.hash(), Some(&hash));
        assert_eq!(share.title(), "notes");
        assert_eq!(share.to_description().unwrap(), description);
    }

    #[tokio::test]
    async fn test_fetch_garbage_is_a_codec_error() {
        let store = MemoryStore::new();
        let hash = store.insert_file(b"definitely not cbor".to_vec());
        assert!(matches!(
            fetch_share_description(&store, &hash).await,
            Err(PublishError::Codec(_))
        ));
    }
}
