use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::object::ContentHash;
use common::share::{Notifier, Share};
use serde::{Deserialize, Serialize};

/// A share notification waiting to be picked up for a recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub recipient: String,
    pub share: ContentHash,
    pub title: String,
    pub queued_at: DateTime<Utc>,
}

/// Notifier that queues one JSON file per recipient and share in the
///  outbox directory, for whatever transport delivers them
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, public_key: &str, hash: &ContentHash) -> PathBuf {
        // keys may come from anywhere, keep the file name tame
        let key: String = public_key
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(32)
            .collect();
        self.dir.join(format!("{}-{}.json", key, hash.short()))
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send_share(&self, share: &Share, public_key: &str) -> Result<(), anyhow::Error> {
        let hash = share
            .hash()
            .ok_or_else(|| anyhow::anyhow!("share {} is not published", share.id()))?;
        let entry = OutboxEntry {
            recipient: public_key.to_string(),
            share: hash.clone(),
            title: share.title().to_string(),
            queued_at: Utc::now(),
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.entry_path(public_key, hash);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&entry)?).await?;
        tracing::info!("queued share {} for {} at {}", hash, public_key, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_queues_entry() {
        let temp = TempDir::new().unwrap();
        let notifier = OutboxNotifier::new(temp.path().join("outbox"));
        let mut share = Share::create("notes", "");
        share.set_hash(ContentHash::of(b"published")).unwrap();

        notifier.send_share(&share, "bob/../key").await.unwrap();

        let path = notifier.entry_path("bob/../key", share.hash().unwrap());
        assert_eq!(path.parent(), Some(temp.path().join("outbox").as_path()));
        let entry: OutboxEntry = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(entry.recipient, "bob/../key");
        assert_eq!(entry.title, "notes");
    }

    #[tokio::test]
    async fn test_unpublished_share_is_refused() {
        let temp = TempDir::new().unwrap();
        let notifier = OutboxNotifier::new(temp.path().to_path_buf());
        let share = Share::create("notes", "");
        assert!(notifier.send_share(&share, "bob").await.is_err());
    }
}
