use clap::Args;
use iroh::discovery::pkarr::dht::DhtDiscovery;
use iroh::{Endpoint, NodeId, SecretKey};

use common::store::StoreError;

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Fetch {
    /// Node id to fetch from, in addition to the configured peers (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error("invalid peer id {0}: {1}")]
    InvalidPeer(String, String),
    #[error("no peers to fetch from, pass --peer or add peers to config.toml")]
    NoPeers,
    #[error("failed to bind endpoint: {0}")]
    Endpoint(String),
    #[error("fetch failed: {0}")]
    Store(#[from] StoreError),
}

/// Parse configured and given peer ids
pub fn peer_ids(configured: &[String], extra: &[String]) -> Result<Vec<NodeId>, FetchError> {
    configured
        .iter()
        .chain(extra)
        .map(|peer| {
            peer.parse::<NodeId>()
                .map_err(|e| FetchError::InvalidPeer(peer.clone(), e.to_string()))
        })
        .collect()
}

/// Bind an ephemeral endpoint that finds peers through the DHT
pub async fn endpoint() -> Result<Endpoint, FetchError> {
    let secret_key = SecretKey::from_bytes(&rand::random::<[u8; 32]>());
    let discovery = DhtDiscovery::builder()
        .secret_key(secret_key.clone())
        .build()
        .map_err(|e| FetchError::Endpoint(e.to_string()))?;
    Endpoint::builder()
        .secret_key(secret_key)
        .discovery(discovery)
        .bind()
        .await
        .map_err(|e| FetchError::Endpoint(e.to_string()))
}

#[async_trait::async_trait]
impl crate::op::Op for Fetch {
    type Error = FetchError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let peers = peer_ids(&services.app.config.peers, &self.peers)?;
        if peers.is_empty() {
            return Err(FetchError::NoPeers);
        }

        let endpoint = endpoint().await?;
        let fetched = services.store.fetch_pinned(peers, &endpoint).await?;
        endpoint.close().await;

        Ok(format!("Fetched {} blobs", fetched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_peer_is_rejected() {
        let err = peer_ids(&[], &["not-a-node-id".to_string()]).unwrap_err();
        assert!(matches!(err, FetchError::InvalidPeer(peer, _) if peer == "not-a-node-id"));
        assert!(peer_ids(&[], &[]).unwrap().is_empty());
    }
}
