use clap::Args;

use common::graph::DownloadError;
use common::state::StateError;

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Download {
    /// Share id or a unique prefix of it
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadOpError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}

#[async_trait::async_trait]
impl crate::op::Op for Download {
    type Error = DownloadOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let share = services.state.find(&self.id)?;
        let requested = services.driver().download_share(&share).await?;

        Ok(format!(
            "Pinned {} items of {}, run `arbore fetch` to pull them from peers",
            requested,
            share.title()
        ))
    }
}
