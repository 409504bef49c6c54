use clap::Args;

use common::state::StateError;

use crate::ops::render_tree;
use crate::services::{Services, ServicesError};

#[derive(Args, Debug, Clone)]
pub struct Show {
    /// Share id or a unique prefix of it
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Show {
    type Error = ShowError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let services = Services::load(ctx).await?;
        let share = services.state.find(&self.id)?;

        let mut output = vec![
            format!("{} ({})", share.title(), share.id()),
            format!("- Status: {:?}", share.status()),
            format!("- Created: {}", share.created_at().to_rfc3339()),
        ];
        if !share.description().is_empty() {
            output.push(format!("- Description: {}", share.description()));
        }
        if let Some(author) = share.author() {
            output.push(format!("- Author: {}", author));
        }
        if let Some(hash) = share.hash() {
            output.push(format!("- Hash: {}", hash));
        }
        for recipient in share.recipients().values() {
            let mark = if recipient.notified() { "notified" } else { "pending" };
            output.push(format!("- Recipient: {} ({})", recipient.public_key(), mark));
        }

        match share.content() {
            Some(content) if content.is_resolved() => {
                output.push(String::new());
                output.push(render_tree(content));
            }
            Some(content) => output.push(format!("- Content: {} (not resolved)", content.hash())),
            None => output.push("- Content: none".to_string()),
        }

        Ok(output.join("\n"))
    }
}
