use clap::{Args, Subcommand};

pub mod local;
pub mod ls;
pub mod pin;

use crate::op::Op;

crate::command_enum! {
    (Ls, ls::Ls),
    (Local, local::Local),
    (Pin, pin::Pin),
}

pub type ObjectCommand = Command;

/// Inspect raw objects in the local store
#[derive(Args, Debug, Clone)]
pub struct Object {
    #[command(subcommand)]
    pub command: ObjectCommand,
}

#[async_trait::async_trait]
impl Op for Object {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
