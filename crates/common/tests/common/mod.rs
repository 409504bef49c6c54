//! Shared test utilities for graph and share integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use common::config::SyncConfig;
use common::graph::ObjectGraphResolver;
use common::object::ContentHash;
use common::share::{Notifier, Share, ShareBuilder, ShareExporter, StorePublisher};
use common::state::MemoryState;
use common::store::MemoryStore;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Install a test subscriber once, honouring RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh in-memory store and state container
pub fn setup() -> (MemoryStore, MemoryState) {
    init_tracing();
    (MemoryStore::new(), MemoryState::new())
}

pub fn resolver(store: &MemoryStore, state: &MemoryState) -> ObjectGraphResolver<MemoryStore, MemoryState> {
    ObjectGraphResolver::new(store.clone(), state.clone(), SyncConfig::default())
}

/// Notifier that remembers who it delivered to
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_share(&self, _share: &Share, public_key: &str) -> Result<(), anyhow::Error> {
        self.sent.lock().push(public_key.to_string());
        Ok(())
    }
}

pub type TestBuilder =
    ShareBuilder<MemoryStore, MemoryState, StorePublisher<MemoryStore>, RecordingNotifier>;

pub fn builder(store: &MemoryStore, state: &MemoryState) -> TestBuilder {
    ShareBuilder::new(
        resolver(store, state),
        StorePublisher::new(store.clone()),
        RecordingNotifier::default(),
    )
}

pub fn exporter(store: &MemoryStore, state: &MemoryState) -> ShareExporter<MemoryStore, MemoryState> {
    ShareExporter::new(resolver(store, state))
}

/// Write files under `root`. Paths ending in `/` are created as
///  empty directories.
pub fn write_tree(root: &Path, files: &[(&str, Vec<u8>)]) {
    for (path, data) in files {
        let full = root.join(path);
        if path.ends_with('/') {
            std::fs::create_dir_all(&full).unwrap();
            continue;
        }
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, data).unwrap();
    }
}

/// Every file and directory below `root`, relative to it,
///  mapped to the file content (`None` for directories)
pub fn read_tree(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    let mut tree = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            if path.is_dir() {
                tree.insert(relative, None);
                pending.push(path);
            } else {
                tree.insert(relative, Some(std::fs::read(&path).unwrap()));
            }
        }
    }
    tree
}

/// A temp directory holding a small photo album
pub fn album() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("album/cover.jpg", vec![1u8; 10]),
            ("album/raw/1.cr2", vec![2u8; 25]),
            ("album/raw/2.cr2", vec![3u8; 25]),
            ("album/raw/edits/1.xmp", b"<xmp/>".to_vec()),
            ("album/empty/", Vec::new()),
            ("album/.DS_Store", b"junk".to_vec()),
            ("readme.md", b"# holiday".to_vec()),
        ],
    );
    temp
}

/// Build a directory out of `(name, hash)` pairs already in the store
pub fn dir(store: &MemoryStore, links: &[(&str, &ContentHash)]) -> ContentHash {
    store
        .insert_directory(links.iter().map(|(name, hash)| (*name, (*hash).clone())))
        .unwrap()
}
