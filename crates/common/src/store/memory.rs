use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::object::{ContentHash, LocalityStat, ObjectKind, ObjectLink};

use super::import::{import_path, BlockSink};
use super::{AddOptions, ByteStream, ContentStore, DirectoryBlock, Pins, StoreError};

/// Size of the chunks `fetch` streams files out in
const FETCH_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
enum Object {
    File(Bytes),
    Directory(DirectoryBlock),
}

/// One recorded `patch_add_link` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCall {
    pub dir: ContentHash,
    pub name: String,
    pub child: ContentHash,
    pub result: ContentHash,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    objects: HashMap<ContentHash, Object>,
    // stat answers that replace the computed ones
    locality: HashMap<ContentHash, LocalityStat>,
    failing_stats: HashSet<ContentHash>,
    failing_lists: HashSet<ContentHash>,
    failing_pins: HashSet<ContentHash>,
    failing_patches: bool,
    failing_fetches: HashSet<ContentHash>,
    stat_calls: HashMap<ContentHash, usize>,
    list_calls: HashMap<ContentHash, usize>,
    patches: Vec<PatchCall>,
    pins: Pins,
}

impl MemoryStoreInner {
    fn insert(&mut self, hash: ContentHash, object: Object) -> ContentHash {
        self.objects.entry(hash.clone()).or_insert(object);
        hash
    }

    fn describe(&self, hash: &ContentHash) -> Result<(ObjectKind, u64), StoreError> {
        match self.objects.get(hash) {
            Some(Object::File(data)) => Ok((ObjectKind::File, data.len() as u64)),
            Some(Object::Directory(block)) => {
                Ok((ObjectKind::Directory, block.cumulative_size()))
            }
            None => Err(StoreError::NotFound(hash.clone())),
        }
    }

    fn directory(&self, hash: &ContentHash) -> Result<&DirectoryBlock, StoreError> {
        match self.objects.get(hash) {
            Some(Object::Directory(block)) => Ok(block),
            Some(Object::File(_)) => Err(StoreError::NotDirectory(hash.clone())),
            None => Err(StoreError::NotFound(hash.clone())),
        }
    }

    fn put_directory(&mut self, block: &DirectoryBlock) -> Result<ContentHash, StoreError> {
        let hash = ContentHash::of(&block.encode()?);
        Ok(self.insert(hash, Object::Directory(block.clone())))
    }
}

/// Deterministic in-memory content store.
///  Hashes are real content hashes, so identical content yields
///  identical hashes and every patch yields a new directory hash.
///  Clones share the same underlying store, which lets tests keep
///  a handle for assertions while components own another.
///
/// Everything present is reported as fully local unless a stat
///  answer is overridden with [`MemoryStore::set_locality`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&self, data: impl Into<Bytes>) -> ContentHash {
        let data = data.into();
        let hash = ContentHash::of(&data);
        self.inner.lock().insert(hash, Object::File(data))
    }

    /// Create a directory linking already present objects
    pub fn insert_directory<I, N>(&self, links: I) -> Result<ContentHash, StoreError>
    where
        I: IntoIterator<Item = (N, ContentHash)>,
        N: Into<String>,
    {
        let mut inner = self.inner.lock();
        let mut block = DirectoryBlock::new();
        for (name, hash) in links {
            let (kind, size) = inner.describe(&hash)?;
            block.insert(ObjectLink::new(name, hash, kind, size))?;
        }
        inner.put_directory(&block)
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.inner.lock().objects.contains_key(hash)
    }

    /// Override the stat answer for a hash, present or not
    pub fn set_locality(&self, hash: &ContentHash, stat: LocalityStat) {
        self.inner.lock().locality.insert(hash.clone(), stat);
    }

    /// Make stat calls for `hash` fail with a transport error
    pub fn fail_stat(&self, hash: &ContentHash) {
        self.inner.lock().failing_stats.insert(hash.clone());
    }

    /// Make list calls for `hash` fail with a transport error
    pub fn fail_list(&self, hash: &ContentHash) {
        self.inner.lock().failing_lists.insert(hash.clone());
    }

    /// Make pin calls for `hash` fail with a transport error
    pub fn fail_pin(&self, hash: &ContentHash) {
        self.inner.lock().failing_pins.insert(hash.clone());
    }

    /// Make every patch call fail with a transport error
    /// Make fetches of `hash` break off with a transport error
    ///  after the content has been streamed
    pub fn fail_fetch(&self, hash: &ContentHash) {
        self.inner.lock().failing_fetches.insert(hash.clone());
    }

    pub fn fail_patches(&self, failing: bool) {
        self.inner.lock().failing_patches = failing;
    }

    pub fn stat_calls(&self, hash: &ContentHash) -> usize {
        self.inner
            .lock()
            .stat_calls
            .get(hash)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_stat_calls(&self) -> usize {
        self.inner.lock().stat_calls.values().sum()
    }

    pub fn list_calls(&self, hash: &ContentHash) -> usize {
        self.inner
            .lock()
            .list_calls
            .get(hash)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_list_calls(&self) -> usize {
        self.inner.lock().list_calls.values().sum()
    }

    /// Every patch call so far, in call order
    pub fn patches(&self) -> Vec<PatchCall> {
        self.inner.lock().patches.clone()
    }

    pub fn is_pinned(&self, hash: &ContentHash) -> bool {
        self.inner.lock().pins.contains(hash)
    }
}

#[async_trait]
impl BlockSink for MemoryStore {
    async fn put_file(&self, data: Bytes) -> Result<ContentHash, StoreError> {
        Ok(self.insert_file(data))
    }

    async fn put_directory(&self, block: &DirectoryBlock) -> Result<ContentHash, StoreError> {
        self.inner.lock().put_directory(block)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_children(&self, hash: &ContentHash) -> Result<Vec<ObjectLink>, StoreError> {
        // let sibling requests interleave like they would against a real store
        tokio::task::yield_now().await;

        let mut inner = self.inner.lock();
        *inner.list_calls.entry(hash.clone()).or_default() += 1;
        if inner.failing_lists.contains(hash) {
            return Err(StoreError::Transport(format!("list {} failed", hash)));
        }
        Ok(inner.directory(hash)?.links())
    }

    async fn stat_locality(&self, hash: &ContentHash) -> Result<LocalityStat, StoreError> {
        tokio::task::yield_now().await;

        let mut inner = self.inner.lock();
        *inner.stat_calls.entry(hash.clone()).or_default() += 1;
        if inner.failing_stats.contains(hash) {
            return Err(StoreError::Transport(format!("stat {} failed", hash)));
        }
        if let Some(stat) = inner.locality.get(hash) {
            return Ok(*stat);
        }
        let (_, size) = inner.describe(hash)?;
        Ok(LocalityStat::complete(size))
    }

    async fn pin_add(&self, hash: &ContentHash) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.failing_pins.contains(hash) {
            return Err(StoreError::Transport(format!("pin {} failed", hash)));
        }
        if !inner.objects.contains_key(hash) && !inner.locality.contains_key(hash) {
            return Err(StoreError::NotFound(hash.clone()));
        }
        inner.pins.insert(hash.clone());
        Ok(())
    }

    async fn add_from_filesystem(
        &self,
        path: &Path,
        options: &AddOptions,
    ) -> Result<ContentHash, StoreError> {
        import_path(self, path, options).await
    }

    async fn new_empty_directory(&self) -> Result<ContentHash, StoreError> {
        self.inner.lock().put_directory(&DirectoryBlock::new())
    }

    async fn patch_add_link(
        &self,
        dir: &ContentHash,
        name: &str,
        child: &ContentHash,
    ) -> Result<ContentHash, StoreError> {
        let mut inner = self.inner.lock();
        if inner.failing_patches {
            return Err(StoreError::Transport(format!("patch {} failed", dir)));
        }
        let mut block = inner.directory(dir)?.clone();
        let (kind, size) = inner.describe(child)?;
        block.insert(ObjectLink::new(name, child.clone(), kind, size))?;
        let result = inner.put_directory(&block)?;
        inner.patches.push(PatchCall {
            dir: dir.clone(),
            name: name.to_string(),
            child: child.clone(),
            result: result.clone(),
        });
        Ok(result)
    }

    async fn fetch(&self, hash: &ContentHash) -> Result<ByteStream, StoreError> {
        let inner = self.inner.lock();
        let data = match inner.objects.get(hash) {
            Some(Object::File(data)) => data.clone(),
            Some(Object::Directory(_)) => return Err(StoreError::IsDirectory(hash.clone())),
            None => return Err(StoreError::NotFound(hash.clone())),
        };
        let mut chunks: Vec<Result<Bytes, StoreError>> = (0..data.len())
            .step_by(FETCH_CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + FETCH_CHUNK_SIZE).min(data.len()))))
            .collect();
        if inner.failing_fetches.contains(hash) {
            chunks.push(Err(StoreError::Transport(format!("fetch {} broke off", hash))));
        }
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn add_bytes(&self, data: Bytes) -> Result<ContentHash, StoreError> {
        Ok(self.insert_file(data))
    }

    async fn pins(&self) -> Result<Vec<ContentHash>, StoreError> {
        Ok(self.inner.lock().pins.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_patch_yields_new_hashes() {
        let store = MemoryStore::new();
        let file = store.insert_file(b"hello".to_vec());

        let empty = store.new_empty_directory().await.unwrap();
        let patched = store.patch_add_link(&empty, "hello.txt", &file).await.unwrap();
        assert_ne!(empty, patched);

        let links = store.list_children(&patched).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "hello.txt");
        assert_eq!(links[0].kind, ObjectKind::File);
        assert_eq!(links[0].size, 5);

        // the empty directory is untouched
        assert!(store.list_children(&empty).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_names_cannot_escape() {
        let store = MemoryStore::new();
        let file = store.insert_file(b"x".to_vec());
        let empty = store.new_empty_directory().await.unwrap();

        for name in ["../x", "/abs"] {
            assert!(matches!(
                store.insert_directory([(name, file.clone())]),
                Err(StoreError::InvalidName(_))
            ));
            assert!(matches!(
                store.patch_add_link(&empty, name, &file).await,
                Err(StoreError::InvalidName(_))
            ));
        }
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_can_break_off() {
        let store = MemoryStore::new();
        let hash = store.insert_file(vec![1u8; 10]);
        store.fail_fetch(&hash);

        let chunks: Vec<_> = store.fetch(&hash).await.unwrap().collect().await;
        assert!(chunks[0].is_ok());
        assert!(matches!(chunks.last(), Some(Err(StoreError::Transport(_)))));
    }

    #[tokio::test]
    async fn test_import_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("album");
        std::fs::create_dir_all(root.join("raw")).unwrap();
        std::fs::write(root.join("cover.jpg"), b"cover").unwrap();
        std::fs::write(root.join("raw/1.cr2"), b"raw-one").unwrap();
        std::fs::write(root.join(".DS_Store"), b"junk").unwrap();

        let store = MemoryStore::new();
        let hash = store
            .add_from_filesystem(&root, &AddOptions::default())
            .await
            .unwrap();

        let links = store.list_children(&hash).await.unwrap();
        let names: Vec<&str> = links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["cover.jpg", "raw"]);
        assert_eq!(links[1].kind, ObjectKind::Directory);
        assert_eq!(links[1].size, 7);

        let stat = store.stat_locality(&hash).await.unwrap();
        assert_eq!(stat, LocalityStat::complete(12));
    }

    #[tokio::test]
    async fn test_fetch_streams_file() {
        let store = MemoryStore::new();
        let data = vec![7u8; FETCH_CHUNK_SIZE * 2 + 3];
        let hash = store.insert_file(data.clone());
        assert_eq!(store.fetch_bytes(&hash).await.unwrap().as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_failure_injection_and_counters() {
        let store = MemoryStore::new();
        let file = store.insert_file(b"x".to_vec());
        store.fail_stat(&file);

        assert!(matches!(
            store.stat_locality(&file).await,
            Err(StoreError::Transport(_))
        ));
        assert_eq!(store.stat_calls(&file), 1);

        let missing = ContentHash::of(b"missing");
        assert!(matches!(
            store.pin_add(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
