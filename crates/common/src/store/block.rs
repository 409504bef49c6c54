use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::object::{is_valid_name, ContentHash, ObjectKind, ObjectLink};

use super::StoreError;

/// Prefix marking a blob as an encoded directory
const DIRECTORY_MAGIC: &[u8] = b"arbore/dir\0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct BlockLink {
    hash: ContentHash,
    kind: ObjectKind,
    size: u64,
}

/// On-store representation of a directory: a map of names to links,
///  DAG-CBOR encoded behind a magic prefix. Files are stored as raw
///  blobs, so the prefix is what tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryBlock {
    links: BTreeMap<String, BlockLink>,
}

impl DirectoryBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a link. Names must be a single path component.
    pub fn insert(&mut self, link: ObjectLink) -> Result<(), StoreError> {
        if !is_valid_name(&link.name) {
            return Err(StoreError::InvalidName(link.name));
        }
        self.links.insert(
            link.name,
            BlockLink {
                hash: link.hash,
                kind: link.kind,
                size: link.size,
            },
        );
        Ok(())
    }

    pub fn links(&self) -> Vec<ObjectLink> {
        self.links
            .iter()
            .map(|(name, link)| ObjectLink::new(name, link.hash.clone(), link.kind, link.size))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Bytes of file content reachable from this directory
    pub fn cumulative_size(&self) -> u64 {
        self.links.values().map(|link| link.size).sum()
    }

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let body =
            serde_ipld_dagcbor::to_vec(self).map_err(|e| StoreError::Codec(e.to_string()))?;
        let mut data = Vec::with_capacity(DIRECTORY_MAGIC.len() + body.len());
        data.extend_from_slice(DIRECTORY_MAGIC);
        data.extend_from_slice(&body);
        Ok(data)
    }

    /// Decode a blob. `Ok(None)` means the blob is not a directory.
    pub fn decode(data: &[u8]) -> Result<Option<Self>, StoreError> {
        let Some(body) = data.strip_prefix(DIRECTORY_MAGIC) else {
            return Ok(None);
        };
        let block: Self =
            serde_ipld_dagcbor::from_slice(body).map_err(|e| StoreError::Codec(e.to_string()))?;
        if let Some(name) = block.links.keys().find(|name| !is_valid_name(name)) {
            return Err(StoreError::InvalidName(name.clone()));
        }
        Ok(Some(block))
    }
}
