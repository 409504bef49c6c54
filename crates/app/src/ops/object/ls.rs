use clap::Args;

use common::graph::ResolveError;
use common::object::ContentHash;

use crate::ops::render_tree;
use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Directory hash to list
    pub hash: ContentHash,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[async_trait::async_trait]
impl crate::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let tree = services.resolver().resolve(&self.hash).await?;
        Ok(render_tree(&tree))
    }
}
