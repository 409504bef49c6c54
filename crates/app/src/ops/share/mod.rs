use clap::{Args, Subcommand};

pub mod create;
pub mod download;
pub mod export;
pub mod favorite;
pub mod fetch_description;
pub mod ls;
pub mod show;

use crate::op::Op;

crate::command_enum! {
    (Create, create::Create),
    (Ls, ls::Ls),
    (Show, show::Show),
    (Export, export::Export),
    (Download, download::Download),
    (Favorite, favorite::Favorite),
    (FetchDescription, fetch_description::FetchDescription),
}

pub type ShareCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Shares {
    #[command(subcommand)]
    pub command: ShareCommand,
}

#[async_trait::async_trait]
impl Op for Shares {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
