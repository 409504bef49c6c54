use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::object::{is_valid_name, ContentHash, ObjectKind, ObjectLink};

use super::{AddOptions, DirectoryBlock, StoreError};

/// Where an import writes its blocks
#[async_trait]
pub(crate) trait BlockSink: Send + Sync {
    async fn put_file(&self, data: Bytes) -> Result<ContentHash, StoreError>;
    async fn put_directory(&self, block: &DirectoryBlock) -> Result<ContentHash, StoreError>;
}

/// A directory being imported, waiting for its entries
struct Frame {
    name: String,
    entries: Vec<PathBuf>,
    block: DirectoryBlock,
}

impl Frame {
    async fn open(path: &Path, name: String) -> io::Result<Self> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        // popped from the back, so sort descending to visit in name order
        entries.sort_by(|a, b| b.cmp(a));
        Ok(Self {
            name,
            entries,
            block: DirectoryBlock::new(),
        })
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Import a file or directory tree into a sink, post-order,
///  with an explicit stack instead of recursion.
///  Hidden files are included. Denylisted names, symlinks below the
///  root and names that cannot be a link are skipped.
pub(crate) async fn import_path<S: BlockSink + ?Sized>(
    sink: &S,
    root: &Path,
    options: &AddOptions,
) -> Result<ContentHash, StoreError> {
    let metadata = tokio::fs::metadata(root).await?;
    if !metadata.is_dir() {
        let data = tokio::fs::read(root).await?;
        return sink.put_file(data.into()).await;
    }
    if !options.recursive {
        return Err(StoreError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is a directory", root.display()),
        )));
    }

    let mut stack = vec![Frame::open(root, entry_name(root)).await?];

    while let Some(mut frame) = stack.pop() {
        let Some(path) = frame.entries.pop() else {
            // every entry is in, seal the directory
            let hash = sink.put_directory(&frame.block).await?;
            match stack.last_mut() {
                Some(parent) => parent.block.insert(ObjectLink::new(
                    frame.name,
                    hash,
                    ObjectKind::Directory,
                    frame.block.cumulative_size(),
                ))?,
                None => return Ok(hash),
            }
            continue;
        };

        let name = entry_name(&path);
        if options.is_denied(&name) {
            tracing::debug!("import: skipping denylisted {}", path.display());
            stack.push(frame);
            continue;
        }
        if !is_valid_name(&name) {
            tracing::warn!("import: skipping {}, not a usable name", path.display());
            stack.push(frame);
            continue;
        }

        let metadata = tokio::fs::symlink_metadata(&path).await?;
        if metadata.is_symlink() {
            tracing::debug!("import: skipping symlink {}", path.display());
            stack.push(frame);
            continue;
        }
        if metadata.is_dir() {
            let child = Frame::open(&path, name).await?;
            stack.push(frame);
            stack.push(child);
        } else {
            let data = tokio::fs::read(&path).await?;
            let size = data.len() as u64;
            let hash = sink.put_file(data.into()).await?;
            frame
                .block
                .insert(ObjectLink::new(name, hash, ObjectKind::File, size))?;
            stack.push(frame);
        }
    }

    Err(StoreError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("import of {} finished without a root", root.display()),
    )))
}

/// Total size in bytes of the files under `path` that an import
///  with `options` would pick up
pub async fn path_size(path: &Path, options: &AddOptions) -> io::Result<u64> {
    let mut total = 0;
    let mut pending = vec![path.to_path_buf()];

    while let Some(current) = pending.pop() {
        let metadata = if current == path {
            tokio::fs::metadata(&current).await?
        } else {
            tokio::fs::symlink_metadata(&current).await?
        };
        if metadata.is_symlink() {
            continue;
        }
        if !metadata.is_dir() {
            total += metadata.len();
            continue;
        }
        if current != path && !options.recursive {
            continue;
        }
        let mut dir = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if options.is_denied(&name) || !is_valid_name(&name) {
                continue;
            }
            pending.push(entry.path());
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_path_size_skips_denylist() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("a.jpg"), vec![0u8; 100]).unwrap();
        std::fs::write(root.join("nested/b.jpg"), vec![0u8; 50]).unwrap();
        std::fs::write(root.join("Thumbs.db"), vec![0u8; 1000]).unwrap();
        std::fs::write(root.join("nested/.DS_Store"), vec![0u8; 1000]).unwrap();

        let size = path_size(&root, &AddOptions::default()).await.unwrap();
        assert_eq!(size, 150);
    }

    #[tokio::test]
    async fn test_path_size_single_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        std::fs::write(&file, b"0123456789").unwrap();
        assert_eq!(path_size(&file, &AddOptions::default()).await.unwrap(), 10);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_loops_are_skipped() {
        use crate::store::{ContentStore, MemoryStore};

        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("nested/a.jpg"), vec![0u8; 10]).unwrap();
        std::os::unix::fs::symlink(&root, root.join("nested/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("nested/a.jpg"), root.join("alias.jpg")).unwrap();

        assert_eq!(path_size(&root, &AddOptions::default()).await.unwrap(), 10);

        let store = MemoryStore::new();
        let hash = store
            .add_from_filesystem(&root, &AddOptions::default())
            .await
            .unwrap();
        let top = store.list_children(&hash).await.unwrap();
        let names: Vec<&str> = top.iter().map(|link| link.name.as_str()).collect();
        assert_eq!(names, vec!["nested"]);

        let nested = store.list_children(&top[0].hash).await.unwrap();
        let names: Vec<&str> = nested.iter().map(|link| link.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg"]);
    }
}
