use std::future::IntoFuture;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use iroh::{Endpoint, NodeId};
use iroh_blobs::{
    api::{
        blobs::{BlobStatus, Blobs},
        downloader::{Downloader, Shuffled},
        ExportBaoError, RequestError,
    },
    store::{fs::FsStore, mem::MemStore},
    BlobsProtocol, Hash,
};
use parking_lot::Mutex;

use crate::object::{ContentHash, LocalityStat, ObjectKind, ObjectLink};

use super::import::{import_path, BlockSink};
use super::{AddOptions, ByteStream, ContentStore, DirectoryBlock, Pins, StoreError};

const PINS_FILE_NAME: &str = "pins.json";

/// Content store over a local iroh-blob store.
///  Files are raw blobs, directories are [`DirectoryBlock`]s.
///  Pinning records the hash in a pin set persisted next to the
///  blobs; [`BlobsStore::fetch_pinned`] is what actually pulls
///  pinned content from peers.
#[derive(Clone, Debug)]
pub struct BlobsStore {
    pub inner: Arc<BlobsProtocol>,
    pins: Arc<Mutex<Pins>>,
    pins_path: Option<PathBuf>,
}

impl Deref for BlobsStore {
    type Target = Arc<BlobsProtocol>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlobsStoreError {
    #[error("blobs store error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("blob store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export bao error: {0}")]
    ExportBao(#[from] ExportBaoError),
    #[error("request error: {0}")]
    Request(#[from] RequestError),
}

impl From<BlobsStoreError> for StoreError {
    fn from(err: BlobsStoreError) -> Self {
        match err {
            BlobsStoreError::Io(e) => StoreError::Io(e),
            other => StoreError::Transport(other.to_string()),
        }
    }
}

fn to_iroh(hash: &ContentHash) -> Hash {
    Hash::from_bytes(hash.to_bytes())
}

fn from_iroh(hash: Hash) -> ContentHash {
    ContentHash::from_bytes(*hash.as_bytes())
}

impl BlobsStore {
    /// Load a blob store from the given path.
    ///  The pin set lives in `pins.json` inside the same directory.
    pub async fn fs(path: &Path) -> Result<Self, BlobsStoreError> {
        tracing::debug!("BlobsStore::fs called with path: {:?}", path);
        let store = FsStore::load(path).await?;
        let blobs = BlobsProtocol::new(&store, None);
        let pins_path = path.join(PINS_FILE_NAME);
        let pins = Pins::load(&pins_path)
            .await
            .map_err(|e| BlobsStoreError::Default(anyhow!(e)))?;
        tracing::debug!("BlobsStore::fs loaded {} pins", pins.len());
        Ok(Self {
            inner: Arc::new(blobs),
            pins: Arc::new(Mutex::new(pins)),
            pins_path: Some(pins_path),
        })
    }

    /// Load a memory blobs store
    pub async fn memory() -> Result<Self, BlobsStoreError> {
        let store = MemStore::new();
        let blobs = BlobsProtocol::new(&store, None);
        Ok(Self {
            inner: Arc::new(blobs),
            pins: Arc::new(Mutex::new(Pins::new())),
            pins_path: None,
        })
    }

    /// Get a handle to the underlying blobs client against
    ///  the store
    pub fn blobs(&self) -> &Blobs {
        self.inner.store().blobs()
    }

    /// Get a blob as bytes
    pub async fn get(&self, hash: &Hash) -> Result<Bytes, BlobsStoreError> {
        let bytes = self.blobs().get_bytes(*hash).await?;
        Ok(bytes)
    }

    /// Store a vec of bytes as a blob
    pub async fn put(&self, data: Vec<u8>) -> Result<Hash, BlobsStoreError> {
        let hash = self.blobs().add_bytes(data).into_future().await?.hash;
        Ok(hash)
    }

    /// Get the status of a blob
    pub async fn status(&self, hash: &Hash) -> Result<BlobStatus, BlobsStoreError> {
        self.blobs()
            .status(*hash)
            .await
            .map_err(|err| BlobsStoreError::Default(anyhow!(err)))
    }

    /// Get the bytes of a blob that must be fully present
    async fn complete(&self, hash: &ContentHash) -> Result<Bytes, StoreError> {
        match self.status(&to_iroh(hash)).await? {
            BlobStatus::Complete { .. } => Ok(self.get(&to_iroh(hash)).await?),
            _ => Err(StoreError::NotFound(hash.clone())),
        }
    }

    async fn directory(&self, hash: &ContentHash) -> Result<DirectoryBlock, StoreError> {
        let data = self.complete(hash).await?;
        DirectoryBlock::decode(&data)?.ok_or_else(|| StoreError::NotDirectory(hash.clone()))
    }

    async fn describe(&self, hash: &ContentHash) -> Result<(ObjectKind, u64), StoreError> {
        let data = self.complete(hash).await?;
        match DirectoryBlock::decode(&data)? {
            Some(block) => Ok((ObjectKind::Directory, block.cumulative_size())),
            None => Ok((ObjectKind::File, data.len() as u64)),
        }
    }

    async fn save_pins(&self) -> Result<(), StoreError> {
        let Some(path) = &self.pins_path else {
            return Ok(());
        };
        let pins = self.pins.lock().clone();
        pins.save(path).await
    }

    /// Download a single hash from peers
    ///
    /// This checks if the hash exists locally first, then downloads if needed.
    /// Uses the Downloader API with Shuffled content discovery.
    pub async fn download_hash(
        &self,
        hash: &ContentHash,
        peer_ids: Vec<NodeId>,
        endpoint: &Endpoint,
    ) -> Result<(), StoreError> {
        let iroh_hash = to_iroh(hash);
        if matches!(self.status(&iroh_hash).await?, BlobStatus::Complete { .. }) {
            tracing::debug!("download_hash: {} already exists locally", hash.short());
            return Ok(());
        }

        tracing::info!(
            "download_hash: downloading {} from {} peers",
            hash.short(),
            peer_ids.len()
        );
        let downloader = Downloader::new(self.inner.store(), endpoint);
        let discovery = Shuffled::new(peer_ids);
        downloader
            .download(iroh_hash, discovery)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match self.status(&iroh_hash).await? {
            BlobStatus::Complete { .. } => Ok(()),
            _ => {
                tracing::error!("download_hash: {} NOT found after download!", hash.short());
                Err(StoreError::NotFound(hash.clone()))
            }
        }
    }

    /// Pull every pinned hash, and everything below pinned directories,
    ///  from the given peers. Returns how many blobs were fetched or
    ///  already present.
    pub async fn fetch_pinned(
        &self,
        peer_ids: Vec<NodeId>,
        endpoint: &Endpoint,
    ) -> Result<usize, StoreError> {
        let mut pending = self.pins.lock().to_vec();
        let mut fetched = 0;

        while let Some(hash) = pending.pop() {
            self.download_hash(&hash, peer_ids.clone(), endpoint).await?;
            fetched += 1;
            if let Some(block) = DirectoryBlock::decode(&self.complete(&hash).await?)? {
                pending.extend(block.links().into_iter().map(|link| link.hash));
            }
        }

        tracing::info!("fetch_pinned: {} blobs present", fetched);
        Ok(fetched)
    }
}

#[async_trait]
impl BlockSink for BlobsStore {
    async fn put_file(&self, data: Bytes) -> Result<ContentHash, StoreError> {
        Ok(from_iroh(self.put(data.to_vec()).await?))
    }

    async fn put_directory(&self, block: &DirectoryBlock) -> Result<ContentHash, StoreError> {
        Ok(from_iroh(self.put(block.encode()?).await?))
    }
}

#[async_trait]
impl ContentStore for BlobsStore {
    async fn list_children(&self, hash: &ContentHash) -> Result<Vec<ObjectLink>, StoreError> {
        Ok(self.directory(hash).await?.links())
    }

    async fn stat_locality(&self, hash: &ContentHash) -> Result<LocalityStat, StoreError> {
        let size_total = match self.status(&to_iroh(hash)).await? {
            BlobStatus::NotFound => return Err(StoreError::NotFound(hash.clone())),
            BlobStatus::Partial { size } => {
                // without the whole blob we cannot tell a directory from a file,
                //  report it the way a partial file looks
                return Ok(LocalityStat {
                    with_locality: true,
                    local: Some(false),
                    size_local: Some(0),
                    size_total: size,
                });
            }
            BlobStatus::Complete { size } => size,
        };

        let Some(block) = DirectoryBlock::decode(&self.get(&to_iroh(hash)).await?)? else {
            return Ok(LocalityStat::complete(size_total));
        };

        // walk the directory and count the file bytes we hold
        let size_total = block.cumulative_size();
        let mut size_local = 0;
        let mut pending = block.links();
        while let Some(link) = pending.pop() {
            if !matches!(
                self.status(&to_iroh(&link.hash)).await?,
                BlobStatus::Complete { .. }
            ) {
                continue;
            }
            match link.kind {
                ObjectKind::File => size_local += link.size,
                ObjectKind::Directory => {
                    pending.extend(self.directory(&link.hash).await?.links());
                }
            }
        }

        Ok(LocalityStat::partial(size_local, size_total))
    }

    async fn pin_add(&self, hash: &ContentHash) -> Result<(), StoreError> {
        let added = self.pins.lock().insert(hash.clone());
        if added {
            self.save_pins().await?;
        }
        tracing::debug!("pin_add: {} (new: {})", hash.short(), added);
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
        self.put_directory(&DirectoryBlock::new()).await
    }

    async fn patch_add_link(
        &self,
        dir: &ContentHash,
        name: &str,
        child: &ContentHash,
    ) -> Result<ContentHash, StoreError> {
        let mut block = self.directory(dir).await?;
        let (kind, size) = self.describe(child).await?;
        block.insert(ObjectLink::new(name, child.clone(), kind, size))?;
        self.put_directory(&block).await
    }

    async fn fetch(&self, hash: &ContentHash) -> Result<ByteStream, StoreError> {
        let data = self.complete(hash).await?;
        if DirectoryBlock::decode(&data)?.is_some() {
            return Err(StoreError::IsDirectory(hash.clone()));
        }
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn add_bytes(&self, data: Bytes) -> Result<ContentHash, StoreError> {
        self.put_file(data).await
    }

    async fn pins(&self) -> Result<Vec<ContentHash>, StoreError> {
        Ok(self.pins.lock().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_store() -> (BlobsStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let blob_path = temp_dir.path().join("blobs");
        let blobs = BlobsStore::fs(&blob_path).await.unwrap();
        (blobs, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_fetch() {
        let (store, _temp) = setup_test_store().await;

        let hash = store
            .add_bytes(Bytes::from_static(b"Hello, BlobsStore!"))
            .await
            .unwrap();
        assert_eq!(hash, ContentHash::of(b"Hello, BlobsStore!"));

        let data = store.fetch_bytes(&hash).await.unwrap();
        assert_eq!(data.as_ref(), b"Hello, BlobsStore!");
    }

    #[tokio::test]
    async fn test_directory_patch_and_stat() {
        let (store, _temp) = setup_test_store().await;

        let file = store.add_bytes(Bytes::from_static(b"0123456789")).await.unwrap();
        let empty = store.new_empty_directory().await.unwrap();
        let dir = store.patch_add_link(&empty, "digits.txt", &file).await.unwrap();
        assert_ne!(dir, empty);

        let links = store.list_children(&dir).await.unwrap();
        assert_eq!(links, vec![ObjectLink::new("digits.txt", file, ObjectKind::File, 10)]);

        let locality = store.stat_locality(&dir).await.unwrap().validate(&dir).unwrap();
        assert!(locality.is_local);
        assert_eq!(locality.size_total, 10);
    }

    #[tokio::test]
    async fn test_missing_hash_is_not_found() {
        let (store, _temp) = setup_test_store().await;
        let missing = ContentHash::from_bytes([99u8; 32]);
        assert!(matches!(
            store.stat_locality(&missing).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.list_children(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pin_is_persisted() {
        let (store, temp) = setup_test_store().await;
        let hash = ContentHash::from_bytes([7u8; 32]);

        // pinning is only a request, the content does not need to be here
        store.pin_add(&hash).await.unwrap();
        store.pin_add(&hash).await.unwrap();
        assert_eq!(store.pins().await.unwrap(), vec![hash.clone()]);

        let persisted = Pins::load(&temp.path().join("blobs").join(PINS_FILE_NAME))
            .await
            .unwrap();
        assert!(persisted.contains(&hash));
    }
}
