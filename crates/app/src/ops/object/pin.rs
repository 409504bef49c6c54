use clap::Args;

use common::graph::DownloadError;
use common::object::ContentHash;

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Pin {
    /// Hash to retain, directories are fetched with everything below them
    pub hash: ContentHash,
}

#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}

#[async_trait::async_trait]
impl crate::op::Op for Pin {
    type Error = PinError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        services.driver().trigger_download(&self.hash).await?;
        Ok(format!("Pinned {}", self.hash))
    }
}
