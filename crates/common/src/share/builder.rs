use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use futures::future::join_all;
use futures::stream::{self, Stream};

use crate::graph::ObjectGraphResolver;
use crate::object::{ContentHash, ObjectNode};
use crate::state::{StateContainer, StateError};
use crate::store::{path_size, AddOptions, ContentStore, StoreError};

use super::{
    Contact, Notifier, PublishError, Share, ShareError, SharePublisher, ShareStatus,
};

/// What to put in a new share
#[derive(Debug, Clone, Default)]
pub struct ShareRequest {
    pub title: String,
    pub description: String,
    pub author: Option<String>,
    pub recipients: Vec<Contact>,
    /// Files and directories to upload, each becomes a top-level item
    pub paths: Vec<PathBuf>,
}

/// Emitted right before an item is uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Fraction of the total size added so far
    pub progress: f64,
    /// Fraction that will be reached once this item is added
    pub next_progress: f64,
    /// Name of the item being added
    pub adding: String,
}

#[derive(Debug, Clone)]
pub enum BuildEvent {
    Progress(ProgressEvent),
    Complete(Share),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to measure {}: {source}", .path.display())]
    Measure { path: PathBuf, source: io::Error },
    #[error("invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("two items are named {0}")]
    DuplicateName(String),
    #[error("failed to create wrapper directory: {0}")]
    Wrapper(#[source] StoreError),
    #[error("failed to upload {}: {source}", .path.display())]
    Upload { path: PathBuf, source: StoreError },
    #[error("failed to link {name} into the wrapper: {source}")]
    Link { name: String, source: StoreError },
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("share error: {0}")]
    Share(#[from] ShareError),
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

// One path of the request, measured
#[derive(Debug)]
struct Item {
    path: PathBuf,
    name: String,
    size: u64,
    is_dir: bool,
}

// Where a build is. The current wrapper hash travels with the phase.
enum Phase {
    Init,
    Announce { index: usize, wrapper: ContentHash },
    Upload { index: usize, wrapper: ContentHash },
    Link {
        index: usize,
        wrapper: ContentHash,
        hash: ContentHash,
    },
    Finalize { wrapper: ContentHash },
    Done,
}

struct Build {
    request: ShareRequest,
    phase: Phase,
    items: Vec<Item>,
    total: u64,
    added: u64,
    children: BTreeMap<String, ObjectNode>,
}

fn fraction(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/**
 * Share builder
 * =============
 * Turns a list of local paths into a published share.
 * The build is driven by whoever polls the returned stream:
 *  1. every path is measured, then an empty wrapper directory is created
 *  2. for each path in order, a progress event is emitted, the path is
 *     uploaded and linked into the wrapper, which yields a new wrapper
 *  3. the share is stored, published, sent to its recipients and its
 *     content resolved, then emitted as the final event
 * A failure before the share is stored ends the stream with that error
 *  and leaves no share behind. Once published, failing to notify a
 *  recipient or to resolve the content is only logged.
 */
pub struct ShareBuilder<S, T, P, N> {
    resolver: ObjectGraphResolver<S, T>,
    publisher: P,
    notifier: N,
}

impl<S, T, P, N> ShareBuilder<S, T, P, N>
where
    S: ContentStore,
    T: StateContainer,
    P: SharePublisher,
    N: Notifier,
{
    pub fn new(resolver: ObjectGraphResolver<S, T>, publisher: P, notifier: N) -> Self {
        Self {
            resolver,
            publisher,
            notifier,
        }
    }

    pub fn build(
        &self,
        request: ShareRequest,
    ) -> impl Stream<Item = Result<BuildEvent, BuildError>> + '_ {
        let build = Build {
            request,
            phase: Phase::Init,
            items: Vec::new(),
            total: 0,
            added: 0,
            children: BTreeMap::new(),
        };
        stream::unfold(build, move |mut build| async move {
            match self.step(&mut build).await {
                Ok(Some(event)) => Some((Ok(event), build)),
                Ok(None) => None,
                Err(err) => {
                    tracing::error!("build: share {:?} failed: {}", build.request.title, err);
                    build.phase = Phase::Done;
                    Some((Err(err), build))
                }
            }
        })
    }

    fn add_options(&self) -> AddOptions {
        self.resolver.config().add_options()
    }

    // Advance until the next event. Leaves the build `Done` on error.
    async fn step(&self, build: &mut Build) -> Result<Option<BuildEvent>, BuildError> {
        loop {
            match std::mem::replace(&mut build.phase, Phase::Done) {
                Phase::Init => {
                    let wrapper = self.prepare(build).await?;
                    build.phase = Phase::Announce { index: 0, wrapper };
                }
                Phase::Announce { index, wrapper } => {
                    let Some(item) = build.items.get(index) else {
                        build.phase = Phase::Finalize { wrapper };
                        continue;
                    };
                    let event = ProgressEvent {
                        progress: fraction(build.added, build.total),
                        next_progress: fraction(build.added + item.size, build.total),
                        adding: item.name.clone(),
                    };
                    build.phase = Phase::Upload { index, wrapper };
                    return Ok(Some(BuildEvent::Progress(event)));
                }
                Phase::Upload { index, wrapper } => {
                    let item = &build.items[index];
                    tracing::debug!("build: uploading {}", item.path.display());
                    let hash = self
                        .resolver
                        .store()
                        .add_from_filesystem(&item.path, &self.add_options())
                        .await
                        .map_err(|source| BuildError::Upload {
                            path: item.path.clone(),
                            source,
                        })?;
                    build.phase = Phase::Link {
                        index,
                        wrapper,
                        hash,
                    };
                }
                Phase::Link {
                    index,
                    wrapper,
                    hash,
                } => {
                    let item = &build.items[index];
                    let next = self
                        .resolver
                        .store()
                        .patch_add_link(&wrapper, &item.name, &hash)
                        .await
                        .map_err(|source| BuildError::Link {
                            name: item.name.clone(),
                            source,
                        })?;
                    let child = if item.is_dir {
                        ObjectNode::directory(hash)
                            .with_name(item.name.clone())
                            .with_size(item.size)
                    } else {
                        ObjectNode::file(hash, item.name.clone(), item.size)
                    };
                    build.children.insert(item.name.clone(), child);
                    build.added += item.size;
                    build.phase = Phase::Announce {
                        index: index + 1,
                        wrapper: next,
                    };
                }
                Phase::Finalize { wrapper } => {
                    let share = self.finalize(build, wrapper).await?;
                    return Ok(Some(BuildEvent::Complete(share)));
                }
                Phase::Done => return Ok(None),
            }
        }
    }

    // Measure every path, then create the empty wrapper
    async fn prepare(&self, build: &mut Build) -> Result<ContentHash, BuildError> {
        let options = self.add_options();
        for path in &build.request.paths {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| BuildError::InvalidPath(path.clone()))?
                .to_string();
            if build.items.iter().any(|item| item.name == name) {
                return Err(BuildError::DuplicateName(name));
            }
            let measure = |source| BuildError::Measure {
                path: path.clone(),
                source,
            };
            let metadata = tokio::fs::metadata(path).await.map_err(measure)?;
            let size = path_size(path, &options).await.map_err(measure)?;
            build.total += size;
            build.items.push(Item {
                path: path.clone(),
                name,
                size,
                is_dir: metadata.is_dir(),
            });
        }
        tracing::info!(
            "build: share {:?}, {} items, {} bytes",
            build.request.title,
            build.items.len(),
            build.total
        );

        self.resolver
            .store()
            .new_empty_directory()
            .await
            .map_err(BuildError::Wrapper)
    }

    async fn finalize(&self, build: &mut Build, wrapper: ContentHash) -> Result<Share, BuildError> {
        let state = self.resolver.state();
        let request = &build.request;

        let content = ObjectNode::directory(wrapper.clone())
            .with_size(build.total)
            .with_children(std::mem::take(&mut build.children));
        let mut share = Share::create(request.title.clone(), request.description.clone());
        share.set_author(request.author.clone());
        share.set_content(content);
        for contact in &request.recipients {
            share.add_recipient(contact.public_key.clone());
        }
        share.set_status(ShareStatus::Sharing);

        let share = state.store_share(share).await?;
        let description = share.to_description()?;
        let hash = self.publisher.publish(&description).await?;
        let mut share = state.set_share_hash(share.id(), hash).await?;

        let keys: Vec<String> = share.recipients().keys().cloned().collect();
        let results = join_all(keys.iter().map(|key| self.notifier.send_share(&share, key))).await;
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(()) => share = state.set_recipient_notified(share.id(), key).await?,
                Err(err) => tracing::warn!("build: failed to notify {}: {}", key, err),
            }
        }

        match self.resolver.resolve(&wrapper).await {
            Ok(resolved) => {
                share.set_content(resolved.with_size(build.total));
                share = state.store_share(share).await?;
            }
            Err(err) => tracing::warn!("build: failed to resolve content {}: {}", wrapper, err),
        }

        tracing::info!("build: share {:?} complete", share.title());
        Ok(share)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    use super::*;
    use crate::config::SyncConfig;
    use crate::object::ObjectKind;
    use crate::share::StorePublisher;
    use crate::state::MemoryState;
    use crate::store::MemoryStore;

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        failing: Vec<String>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_share(&self, _share: &Share, public_key: &str) -> Result<(), anyhow::Error> {
            if self.failing.iter().any(|key| key == public_key) {
                anyhow::bail!("{} is offline", public_key);
            }
            self.sent.lock().push(public_key.to_string());
            Ok(())
        }
    }

    type TestBuilder =
        ShareBuilder<MemoryStore, MemoryState, StorePublisher<MemoryStore>, RecordingNotifier>;

    fn builder(store: &MemoryStore, state: &MemoryState, notifier: RecordingNotifier) -> TestBuilder {
        let resolver = ObjectGraphResolver::new(store.clone(), state.clone(), SyncConfig::default());
        ShareBuilder::new(resolver, StorePublisher::new(store.clone()), notifier)
    }

    fn request(paths: Vec<PathBuf>, recipients: &[&str]) -> ShareRequest {
        ShareRequest {
            title: "holiday".into(),
            description: "pictures".into(),
            author: Some("me".into()),
            recipients: recipients.iter().map(|key| Contact::new(*key)).collect(),
            paths,
        }
    }

    #[tokio::test]
    async fn test_build_emits_progress_then_share() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        std::fs::write(&a, [1u8; 10]).unwrap();
        let sub = temp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.bin"), [2u8; 20]).unwrap();

        let store = MemoryStore::new();
        let state = MemoryState::new();
        let builder = builder(&store, &state, RecordingNotifier::default());
        let events: Vec<_> = builder.build(request(vec![a, sub], &[])).collect().await;

        assert_eq!(events.len(), 3);
        let progress: Vec<ProgressEvent> = events[..2]
            .iter()
            .map(|event| match event {
                Ok(BuildEvent::Progress(progress)) => progress.clone(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(progress[0].progress, 0.0);
        assert_eq!(progress[0].adding, "a.txt");
        assert_eq!(progress[1].progress, 10.0 / 30.0);
        assert_eq!(progress[1].next_progress, 1.0);
        assert_eq!(progress[1].adding, "sub");

        let share = match &events[2] {
            Ok(BuildEvent::Complete(share)) => share.clone(),
            other => panic!("unexpected event: {other:?}"),
        };
        let content = share.content().unwrap();
        assert!(content.is_resolved());
        assert_eq!(content.child("a.txt").unwrap().kind(), ObjectKind::File);
        assert_eq!(content.child("sub").unwrap().kind(), ObjectKind::Directory);
        assert!(content.child("sub").unwrap().child("b.bin").is_some());
        assert_eq!(share.status(), ShareStatus::Sharing);
        assert!(share.hash().is_some());
        assert_eq!(state.shares().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        std::fs::write(&a, b"hello").unwrap();

        let store = MemoryStore::new();
        let state = MemoryState::new();
        let notifier = RecordingNotifier {
            failing: vec!["bob".into()],
            ..Default::default()
        };
        let builder = builder(&store, &state, notifier.clone());
        let events: Vec<_> = builder.build(request(vec![a], &["alice", "bob"])).collect().await;

        let share = match events.last() {
            Some(Ok(BuildEvent::Complete(share))) => share.clone(),
            other => panic!("unexpected event: {other:?}"),
        };
        assert!(share.recipients()["alice"].notified());
        assert!(!share.recipients()["bob"].notified());
        assert_eq!(*notifier.sent.lock(), vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_failure_stores_nothing() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        std::fs::write(&a, b"hello").unwrap();

        let store = MemoryStore::new();
        let state = MemoryState::new();
        store.fail_patches(true);
        let builder = builder(&store, &state, RecordingNotifier::default());
        let events: Vec<_> = builder.build(request(vec![a], &["alice"])).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(BuildEvent::Progress(_))));
        assert!(matches!(events[1], Err(BuildError::Link { .. })));
        assert!(state.shares().is_empty());
    }

    #[tokio::test]
    async fn test_missing_path_fails_before_any_event() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        let state = MemoryState::new();
        let builder = builder(&store, &state, RecordingNotifier::default());
        let events: Vec<_> = builder
            .build(request(vec![temp.path().join("nope")], &[]))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(BuildError::Measure { .. })));
    }

    #[tokio::test]
    async fn test_empty_share() {
        let store = MemoryStore::new();
        let state = MemoryState::new();
        let builder = builder(&store, &state, RecordingNotifier::default());
        let events: Vec<_> = builder.build(request(vec![], &[])).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(BuildEvent::Complete(share)) => {
                assert_eq!(share.content().unwrap().children().map(|c| c.len()), Some(0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
