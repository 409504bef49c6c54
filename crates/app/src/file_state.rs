use std::path::{Path, PathBuf};

use async_trait::async_trait;
use common::object::ContentHash;
use common::share::Share;
use common::state::{Fact, MemoryState, StateContainer, StateError};
use uuid::Uuid;

/// State container keeping shares in a JSON file.
///  Facts only live for the duration of the process.
#[derive(Debug, Clone)]
pub struct FileState {
    inner: MemoryState,
    path: PathBuf,
}

impl FileState {
    pub async fn load(path: &Path) -> Result<Self, StateError> {
        let shares: Vec<Share> = match tokio::fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data).map_err(anyhow::Error::from)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(anyhow::Error::from(e).into()),
        };
        tracing::debug!("loaded {} shares from {}", shares.len(), path.display());
        Ok(Self {
            inner: MemoryState::with_shares(shares),
            path: path.to_path_buf(),
        })
    }

    /// Find a share by its id, or by a unique prefix of it
    pub fn find(&self, query: &str) -> Result<Share, StateError> {
        let matches: Vec<Share> = self
            .inner
            .shares()
            .into_iter()
            .filter(|share| share.id().to_string().starts_with(query))
            .collect();
        match matches.as_slice() {
            [share] => Ok(share.clone()),
            [] => Err(anyhow::anyhow!("no share matches {}", query).into()),
            _ => Err(anyhow::anyhow!("{} matches more than one share", query).into()),
        }
    }

    async fn save(&self) -> Result<(), StateError> {
        let data = serde_json::to_vec_pretty(&self.inner.shares()).map_err(anyhow::Error::from)?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }
}

#[async_trait]
impl StateContainer for FileState {
    async fn record_fact(&self, fact: Fact) -> Result<(), StateError> {
        self.inner.record_fact(fact).await
    }

    async fn share(&self, id: Uuid) -> Result<Share, StateError> {
        self.inner.share(id).await
    }

    async fn store_share(&self, share: Share) -> Result<Share, StateError> {
        let share = self.inner.store_share(share).await?;
        self.save().await?;
        Ok(share)
    }

    async fn set_share_hash(&self, id: Uuid, hash: ContentHash) -> Result<Share, StateError> {
        let share = self.inner.set_share_hash(id, hash).await?;
        self.save().await?;
        Ok(share)
    }

    async fn set_recipient_notified(
        &self,
        id: Uuid,
        public_key: &str,
    ) -> Result<Share, StateError> {
        let share = self.inner.set_recipient_notified(id, public_key).await?;
        self.save().await?;
        Ok(share)
    }

    async fn list_shares(&self) -> Result<Vec<Share>, StateError> {
        self.inner.list_shares().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use common::object::ObjectNode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_shares_survive_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("shares.json");

        let state = FileState::load(&path).await.unwrap();
        let mut share = Share::create("notes", "weekly");
        share.set_content(ObjectNode::directory(ContentHash::of(b"wrapper")));
        share.add_recipient("bob");
        let share = state.store_share(share).await.unwrap();
        state
            .set_share_hash(share.id(), ContentHash::of(b"published"))
            .await
            .unwrap();

        let reloaded = FileState::load(&path).await.unwrap();
        let loaded = reloaded.share(share.id()).await.unwrap();
        assert_eq!(loaded.hash(), Some(&ContentHash::of(b"published")));
        assert_eq!(loaded.recipients().len(), 1);

        let prefix = share.id().to_string()[..8].to_string();
        assert_eq!(reloaded.find(&prefix).unwrap().id(), share.id());
        assert!(reloaded.find("zzzz").is_err());
    }

    #[tokio::test]
    async fn test_deep_content_survives_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("shares.json");

        let mut content = ObjectNode::file(ContentHash::of(b"leaf"), "leaf.txt", 4);
        for level in (0..150).rev() {
            let name = format!("level-{}", level);
            content = ObjectNode::directory(ContentHash::of(name.as_bytes()))
                .with_name(name)
                .with_size(4)
                .with_children(BTreeMap::from([(content.name().to_string(), content)]));
        }
        let content = ObjectNode::directory(ContentHash::of(b"wrapper"))
            .with_children(BTreeMap::from([(content.name().to_string(), content)]));

        let state = FileState::load(&path).await.unwrap();
        let mut share = Share::create("deep", "nested folders");
        share.set_content(content.clone());
        let share = state.store_share(share).await.unwrap();

        let reloaded = FileState::load(&path).await.unwrap();
        let loaded = reloaded.share(share.id()).await.unwrap();
        assert_eq!(loaded.content(), Some(&content));
        assert_eq!(loaded.content().unwrap().walk().count(), 152);
    }
}
