use std::path::PathBuf;

use clap::Args;

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Name published as the author of new shares
    #[arg(long)]
    pub author: Option<String>,

    /// Node id to fetch content from (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Store requests a traversal keeps in flight
    #[arg(long, default_value_t = common::config::DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,

    /// Write daily rolling logs to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            author: self.author.clone(),
            peers: self.peers.clone(),
            max_in_flight: self.max_in_flight,
            log_dir: self.log_dir.clone(),
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized arbore directory at: {}\n\
             - Blobs: {}\n\
             - Shares: {}\n\
             - Outbox: {}\n\
             - Config: {}\n\
             - Peers: {}",
            state.arbore_dir.display(),
            state.blobs_path.display(),
            state.shares_path.display(),
            state.outbox_path.display(),
            state.config_path.display(),
            state.config.peers.len()
        );

        Ok(output)
    }
}
