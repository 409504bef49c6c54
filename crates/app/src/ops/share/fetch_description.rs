use clap::Args;

use common::object::ContentHash;
use common::share::{fetch_share_description, PublishError};
use common::state::{StateContainer, StateError};
use common::store::StoreError;

use crate::ops::fetch::{endpoint, peer_ids, FetchError};
use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct FetchDescription {
    /// Hash a share was published under
    pub hash: ContentHash,

    /// Node id to fetch the description from (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchDescriptionError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to download description: {0}")]
    Download(#[from] StoreError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for FetchDescription {
    type Error = FetchDescriptionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;

        let peers = peer_ids(&services.app.config.peers, &self.peers)?;
        if !peers.is_empty() {
            let endpoint = endpoint().await?;
            let downloaded = services
                .store
                .download_hash(&self.hash, peers, &endpoint)
                .await;
            endpoint.close().await;
            downloaded?;
        }

        let share = fetch_share_description(&services.store, &self.hash).await?;
        let share = services.state.store_share(share).await?;

        Ok(format!(
            "Received share {} ({}) from {}",
            share.title(),
            share.id(),
            share.author().unwrap_or("unknown author")
        ))
    }
}
