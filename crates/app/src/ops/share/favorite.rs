use clap::Args;

use common::state::{StateContainer, StateError};

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Favorite {
    /// Share id or a unique prefix of it
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FavoriteError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Favorite {
    type Error = FavoriteError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let mut share = services.state.find(&self.id)?;
        share.toggle_favorite();
        let share = services.state.store_share(share).await?;

        let verb = if share.favorite() { "Starred" } else { "Unstarred" };
        Ok(format!("{} {}", verb, share.title()))
    }
}
