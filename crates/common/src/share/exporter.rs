use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use futures::stream::{self, Stream, TryStreamExt};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::graph::{ObjectGraphResolver, ResolveError};
use crate::object::{is_valid_name, ContentHash, ObjectNode};
use crate::state::StateContainer;
use crate::store::{ContentStore, StoreError};

use super::Share;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    /// A top-level item is about to be written
    Exporting { name: String },
    /// Everything was written
    Finished { files: usize, bytes: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("share {0} has no content")]
    NoContent(Uuid),
    #[error("{} already exists", .0.display())]
    Conflict(PathBuf),
    #[error("refusing to write {0:?}, it is not a plain name")]
    InvalidName(String),
    #[error("failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to fetch {hash}: {source}")]
    Fetch { hash: ContentHash, source: StoreError },
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

impl ExportError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::AlreadyExists {
            ExportError::Conflict(path.to_path_buf())
        } else {
            ExportError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

enum Phase {
    Start,
    Announce,
    Write,
    Done,
}

struct Export {
    share: Share,
    destination: PathBuf,
    phase: Phase,
    items: VecDeque<ObjectNode>,
    files: usize,
    bytes: u64,
}

/// Writes the content of a share to disk, one top-level item at a time.
///  Files that already exist are never overwritten.
pub struct ShareExporter<S, T> {
    resolver: ObjectGraphResolver<S, T>,
}

impl<S, T> ShareExporter<S, T>
where
    S: ContentStore,
    T: StateContainer,
{
    pub fn new(resolver: ObjectGraphResolver<S, T>) -> Self {
        Self { resolver }
    }

    pub fn export(
        &self,
        share: Share,
        destination: impl Into<PathBuf>,
    ) -> impl Stream<Item = Result<ExportEvent, ExportError>> + '_ {
        let export = Export {
            share,
            destination: destination.into(),
            phase: Phase::Start,
            items: VecDeque::new(),
            files: 0,
            bytes: 0,
        };
        stream::unfold(export, move |mut export| async move {
            match self.step(&mut export).await {
                Ok(Some(event)) => Some((Ok(event), export)),
                Ok(None) => None,
                Err(err) => {
                    tracing::error!("export: share {:?} failed: {}", export.share.title(), err);
                    export.phase = Phase::Done;
                    Some((Err(err), export))
                }
            }
        })
    }

    async fn step(&self, export: &mut Export) -> Result<Option<ExportEvent>, ExportError> {
        loop {
            match std::mem::replace(&mut export.phase, Phase::Done) {
                Phase::Start => {
                    let content = export
                        .share
                        .take_content()
                        .ok_or(ExportError::NoContent(export.share.id()))?;
                    let mut content = match content.children() {
                        Some(_) => content,
                        None => self.resolver.resolve_node(content).await?,
                    };
                    export.items = content
                        .take_children()
                        .map(|children| children.into_values().collect())
                        .unwrap_or_default();
                    tracing::info!(
                        "export: share {:?}, {} items to {}",
                        export.share.title(),
                        export.items.len(),
                        export.destination.display()
                    );
                    tokio::fs::create_dir_all(&export.destination)
                        .await
                        .map_err(|e| ExportError::io(&export.destination, e))?;
                    export.phase = Phase::Announce;
                }
                Phase::Announce => {
                    let Some(item) = export.items.front() else {
                        tracing::info!(
                            "export: done, {} files, {} bytes",
                            export.files,
                            export.bytes
                        );
                        return Ok(Some(ExportEvent::Finished {
                            files: export.files,
                            bytes: export.bytes,
                        }));
                    };
                    let event = ExportEvent::Exporting {
                        name: item.name().to_string(),
                    };
                    export.phase = Phase::Write;
                    return Ok(Some(event));
                }
                Phase::Write => {
                    if let Some(item) = export.items.pop_front() {
                        let path = join_name(&export.destination, item.name())?;
                        self.materialize(export, item, path).await?;
                    }
                    export.phase = Phase::Announce;
                }
                Phase::Done => return Ok(None),
            }
        }
    }

    // Write one node and everything below it
    async fn materialize(
        &self,
        export: &mut Export,
        node: ObjectNode,
        path: PathBuf,
    ) -> Result<(), ExportError> {
        let mut pending = vec![(path, node)];
        while let Some((path, node)) = pending.pop() {
            if node.is_file() {
                export.bytes += self.write_file(node.hash(), &path).await?;
                export.files += 1;
                continue;
            }

            let mut node = match node.children() {
                Some(_) => node,
                None => self.resolver.resolve_node(node).await?,
            };
            let children = node.take_children().unwrap_or_default();
            let mut below = Vec::with_capacity(children.len());
            for (name, child) in children.into_iter().rev() {
                below.push((join_name(&path, &name)?, child));
            }
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| ExportError::io(&path, e))?;
            pending.extend(below);
        }
        Ok(())
    }

    async fn write_file(&self, hash: &ContentHash, path: &Path) -> Result<u64, ExportError> {
        tracing::debug!("export: writing {} to {}", hash, path.display());
        let fetch_error = |source| ExportError::Fetch {
            hash: hash.clone(),
            source,
        };
        let mut content = self
            .resolver
            .store()
            .fetch(hash)
            .await
            .map_err(fetch_error)?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| ExportError::io(path, e))?;

        let copied = async {
            let mut written = 0u64;
            while let Some(chunk) = content.try_next().await.map_err(fetch_error)? {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| ExportError::io(path, e))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| ExportError::io(path, e))?;
            Ok::<_, ExportError>(written)
        }
        .await;

        if copied.is_err() {
            // the file was created by us, don't leave half of it behind
            drop(file);
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!("export: could not remove partial {}: {}", path.display(), e);
            }
        }
        copied
    }
}

// Join a link name onto a directory, refusing names that would
//  land anywhere but directly inside it
fn join_name(dir: &Path, name: &str) -> Result<PathBuf, ExportError> {
    if !is_valid_name(name) {
        return Err(ExportError::InvalidName(name.to_string()));
    }
    Ok(dir.join(name))
}
