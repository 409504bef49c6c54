use async_trait::async_trait;

use super::Share;

/// Delivers a published share to one recipient
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_share(&self, share: &Share, public_key: &str) -> Result<(), anyhow::Error>;
}
