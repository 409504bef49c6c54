use std::collections::BTreeSet;
use std::ops::Deref;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::object::ContentHash;

use super::StoreError;

/// Set of hashes the store has been asked to retrieve and retain
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pins(BTreeSet<ContentHash>);

impl Deref for Pins {
    type Target = BTreeSet<ContentHash>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Pins {
    pub fn new() -> Self {
        Pins(BTreeSet::new())
    }

    /// Insert a hash, returning whether it was newly pinned
    pub fn insert(&mut self, hash: ContentHash) -> bool {
        self.0.insert(hash)
    }

    pub fn remove(&mut self, hash: &ContentHash) -> bool {
        self.0.remove(hash)
    }

    pub fn to_vec(&self) -> Vec<ContentHash> {
        self.0.iter().cloned().collect()
    }

    /// Load a pin set from a JSON file, empty if the file does not exist yet
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        match tokio::fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| StoreError::Codec(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(self).map_err(|e| StoreError::Codec(e.to_string()))?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pins_persist() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pins.json");

        assert!(Pins::load(&path).await.unwrap().is_empty());

        let mut pins = Pins::new();
        assert!(pins.insert(ContentHash::of(b"a")));
        assert!(!pins.insert(ContentHash::of(b"a")));
        pins.insert(ContentHash::of(b"b"));
        pins.save(&path).await.unwrap();

        let loaded = Pins::load(&path).await.unwrap();
        assert_eq!(loaded, pins);
        assert!(loaded.contains(&ContentHash::of(b"b")));
    }
}
