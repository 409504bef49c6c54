use std::collections::VecDeque;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::config::SyncConfig;
use crate::object::{ContentHash, ObjectLink, ObjectNode};
use crate::state::{Fact, StateContainer, StateError};
use crate::store::{ContentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to list {hash}: {source}")]
    List {
        hash: ContentHash,
        #[source]
        source: StoreError,
    },
    #[error("state error: {0}")]
    State(#[from] StateError),
}

// A node discovered during a pass, with the index of the directory it hangs off
struct Slot {
    node: ObjectNode,
    parent: Option<usize>,
}

/**
 * Object graph resolver
 * =====================
 * Builds the tree below a root hash by listing every directory
 *  it reaches. Directories are discovered through a worklist,
 *  with at most `max_in_flight` listings outstanding at once.
 * Every node of the result carries its listing. A listing failure
 *  anywhere fails the whole pass, and nothing is reported to the
 *  state container unless the whole pass succeeded.
 */
#[derive(Debug, Clone)]
pub struct ObjectGraphResolver<S, T> {
    store: S,
    state: T,
    config: SyncConfig,
}

impl<S, T> ObjectGraphResolver<S, T>
where
    S: ContentStore,
    T: StateContainer,
{
    pub fn new(store: S, state: T, config: SyncConfig) -> Self {
        Self {
            store,
            state,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Resolve the directory graph rooted at `hash`
    pub async fn resolve(&self, hash: &ContentHash) -> Result<ObjectNode, ResolveError> {
        self.resolve_node(ObjectNode::directory(hash.clone())).await
    }

    /// Resolve everything below `node`, keeping its name and size.
    ///  Files are returned as they are.
    pub async fn resolve_node(&self, node: ObjectNode) -> Result<ObjectNode, ResolveError> {
        if node.is_file() {
            return Ok(node);
        }
        let root = node.hash().clone();
        tracing::debug!("resolve: starting at {}", root);

        // children always land after their parent in the arena
        let mut arena = vec![Slot { node, parent: None }];
        let mut pending = VecDeque::from([0usize]);
        let mut listings: Vec<(ContentHash, Vec<ObjectLink>)> = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        let fan_out = self.config.fan_out();

        let list = |index: usize, hash: ContentHash| async move {
            let result = self.store.list_children(&hash).await;
            (index, hash, result)
        };

        loop {
            while in_flight.len() < fan_out {
                let Some(index) = pending.pop_front() else {
                    break;
                };
                let hash = arena[index].node.hash().clone();
                in_flight.push(list(index, hash));
            }

            let Some((index, hash, result)) = in_flight.next().await else {
                break;
            };
            let links = result.map_err(|source| {
                tracing::warn!("resolve: listing {} failed: {}", hash, source);
                ResolveError::List {
                    hash: hash.clone(),
                    source,
                }
            })?;

            // an empty listing still marks the directory as known
            arena[index].node.children_mut();
            for link in &links {
                let child = ObjectNode::from_link(link);
                let is_dir = child.is_dir();
                arena.push(Slot {
                    node: child,
                    parent: Some(index),
                });
                if is_dir {
                    pending.push_back(arena.len() - 1);
                }
            }
            listings.push((hash, links));
        }

        // assemble bottom-up, the last slot is always a leaf of what remains
        while arena.len() > 1 {
            let Some(slot) = arena.pop() else {
                break;
            };
            if let Some(parent) = slot.parent {
                let name = slot.node.name().to_string();
                arena[parent].node.children_mut().insert(name, slot.node);
            }
        }
        let resolved = match arena.pop() {
            Some(slot) => slot.node,
            None => ObjectNode::directory(root.clone()),
        };

        let directories = listings.len();
        for (hash, links) in listings {
            self.state
                .record_fact(Fact::DirectoryMetadata { hash, links })
                .await?;
        }
        tracing::info!("resolve: {} resolved, {} directories", root, directories);

        Ok(resolved)
    }
}
