use std::path::PathBuf;

use clap::Args;
use futures::StreamExt;

use common::share::{ExportError, ExportEvent};
use common::state::StateError;

use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Export {
    /// Share id or a unique prefix of it
    pub id: String,

    /// Directory to write the share into, existing files are never overwritten
    pub destination: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportOpError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[async_trait::async_trait]
impl crate::op::Op for Export {
    type Error = ExportOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let share = services.state.find(&self.id)?;
        let exporter = services.exporter();

        let events = exporter.export(share, &self.destination);
        futures::pin_mut!(events);

        let mut summary = String::new();
        while let Some(event) = events.next().await {
            match event? {
                ExportEvent::Exporting { name } => tracing::info!("exporting {}", name),
                ExportEvent::Finished { files, bytes } => {
                    summary = format!(
                        "Exported {} files ({} B) to {}",
                        files,
                        bytes,
                        self.destination.display()
                    );
                }
            }
        }
        Ok(summary)
    }
}
