use std::path::PathBuf;

use clap::Args;
use futures::StreamExt;

use common::share::{BuildError, BuildEvent, Contact, ShareRequest};

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Create {
    /// Title of the share
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Public key of a recipient (repeatable)
    #[arg(long = "recipient")]
    pub recipients: Vec<String>,

    /// Files and directories to share
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("share build ended without completing")]
    Incomplete,
}

#[async_trait::async_trait]
impl crate::op::Op for Create {
    type Error = CreateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let builder = services.builder();

        let request = ShareRequest {
            title: self.title.clone(),
            description: self.description.clone(),
            author: services.app.config.author.clone(),
            recipients: self.recipients.iter().map(Contact::new).collect(),
            paths: self.paths.clone(),
        };

        let events = builder.build(request);
        futures::pin_mut!(events);

        let mut share = None;
        while let Some(event) = events.next().await {
            match event? {
                BuildEvent::Progress(progress) => {
                    tracing::info!(
                        "adding {} ({:.0}% -> {:.0}%)",
                        progress.adding,
                        progress.progress * 100.0,
                        progress.next_progress * 100.0
                    );
                }
                BuildEvent::Complete(complete) => share = Some(complete),
            }
        }
        let share = share.ok_or(CreateError::Incomplete)?;

        let notified = share
            .recipients()
            .values()
            .filter(|recipient| recipient.notified())
            .count();
        Ok(format!(
            "Created share {} ({})\n- Hash: {}\n- Size: {} B\n- Notified: {}/{}",
            share.title(),
            share.id(),
            share
                .hash()
                .map(|hash| hash.to_string())
                .unwrap_or_else(|| "unpublished".to_string()),
            share.content().and_then(|content| content.size()).unwrap_or(0),
            notified,
            share.recipients().len()
        ))
    }
}
