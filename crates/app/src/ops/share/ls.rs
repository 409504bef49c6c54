use clap::Args;

use common::state::{StateContainer, StateError};

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Only list favorites
    #[arg(long)]
    pub favorites: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let mut shares = services.state.list_shares().await?;
        shares.retain(|share| !self.favorites || share.favorite());
        shares.sort_by_key(|share| share.created_at());

        if shares.is_empty() {
            return Ok("No shares".to_string());
        }

        let lines: Vec<String> = shares
            .iter()
            .map(|share| {
                format!(
                    "{}  {:<8}  {}  {}",
                    &share.id().to_string()[..8],
                    format!("{:?}", share.status()).to_lowercase(),
                    share.created_at().format("%Y-%m-%d %H:%M"),
                    share.title()
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }
}
