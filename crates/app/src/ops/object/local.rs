use clap::Args;

use common::graph::{LocalityError, ResolveError};
use common::object::ContentHash;

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Local {
    /// Hash to check
    pub hash: ContentHash,
}

#[derive(Debug, thiserror::Error)]
pub enum LocalError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Locality(#[from] LocalityError),
}

#[async_trait::async_trait]
impl crate::op::Op for Local {
    type Error = LocalError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let node = services.resolver().resolve(&self.hash).await?;
        let report = services.tracker().check_local(&node).await?;

        let mut output = vec![format!(
            "{} is {} ({} checked)",
            self.hash,
            if report.is_local { "local" } else { "not local" },
            report.checked
        )];
        for (hash, err) in &report.failures {
            output.push(format!("- {}: {}", hash.short(), err));
        }
        Ok(output.join("\n"))
    }
}
