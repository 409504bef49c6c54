use std::collections::VecDeque;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::config::SyncConfig;
use crate::object::{ContentHash, ObjectNode};
use crate::state::{Fact, StateContainer, StateError};
use crate::store::{ContentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LocalityError {
    #[error("invalid locality for {hash}: {source}")]
    Stat {
        hash: ContentHash,
        #[source]
        source: StoreError,
    },
    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Outcome of a locality check
#[derive(Debug, Default)]
pub struct LocalityReport {
    /// Whether everything below the checked node is present locally
    pub is_local: bool,
    /// Number of stat requests issued
    pub checked: usize,
    /// Stats that failed and were counted as not local
    pub failures: Vec<(ContentHash, StoreError)>,
}

// Bookkeeping for one node of the checked tree
struct Entry<'a> {
    node: &'a ObjectNode,
    parent: Option<usize>,
    // children that have not settled yet
    waiting: usize,
    children_local: bool,
}

/**
 * Locality tracker
 * ================
 * Works out whether the content below a node is present locally.
 * Every node is stat'ed at most once per check:
 *  - a node the store reports as local settles as local,
 *    nothing below it is asked about
 *  - a directory that is not reported local settles once all of
 *    its known children have, and is local only if they all are
 *  - anything else settles as not local
 * Failed stats are recorded as not local and reported back, they
 *  never stop the traversal. A stat the store answered with missing
 *  or impossible sizes fails the whole check.
 */
#[derive(Debug, Clone)]
pub struct LocalityTracker<S, T> {
    store: S,
    state: T,
    config: SyncConfig,
}

impl<S, T> LocalityTracker<S, T>
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

    pub async fn check_local(&self, node: &ObjectNode) -> Result<LocalityReport, LocalityError> {
        tracing::debug!("locality: checking {}", node.hash());

        let mut report = LocalityReport::default();
        let mut arena = vec![Entry {
            node,
            parent: None,
            waiting: 0,
            children_local: true,
        }];
        let mut pending = VecDeque::from([0usize]);
        let mut in_flight = FuturesUnordered::new();
        let fan_out = self.config.fan_out();

        let request = |index: usize, hash: ContentHash| async move {
            let result = self.store.stat_locality(&hash).await;
            (index, hash, result)
        };

        loop {
            while in_flight.len() < fan_out {
                let Some(index) = pending.pop_front() else {
                    break;
                };
                report.checked += 1;
                in_flight.push(request(index, arena[index].node.hash().clone()));
            }

            let Some((index, hash, result)) = in_flight.next().await else {
                break;
            };

            let own_local = match result.and_then(|stat| stat.validate(&hash)) {
                Ok(locality) => {
                    self.state
                        .record_fact(Fact::Locality {
                            hash: hash.clone(),
                            locality,
                        })
                        .await?;
                    locality.is_local
                }
                Err(source) if source.is_unreachable() => {
                    tracing::warn!("locality: stat for {} failed: {}", hash, source);
                    self.state
                        .record_fact(Fact::NotLocal { hash: hash.clone() })
                        .await?;
                    report.failures.push((hash, source));
                    false
                }
                Err(source) => return Err(LocalityError::Stat { hash, source }),
            };

            let current = arena[index].node;
            let children = current
                .children()
                .filter(|children| !own_local && !children.is_empty());
            match children {
                Some(children) => {
                    arena[index].waiting = children.len();
                    for child in children.values() {
                        arena.push(Entry {
                            node: child,
                            parent: Some(index),
                            waiting: 0,
                            children_local: true,
                        });
                        pending.push_back(arena.len() - 1);
                    }
                }
                None => {
                    if let Some(root_local) = settle(&mut arena, index, own_local) {
                        report.is_local = root_local;
                    }
                }
            }
        }

        tracing::info!(
            "locality: {} is {} ({} checked, {} failed)",
            node.hash(),
            if report.is_local { "local" } else { "not local" },
            report.checked,
            report.failures.len()
        );
        Ok(report)
    }
}

// Settle an entry and every ancestor it completes.
//  Returns the verdict for the root once it settles.
fn settle(arena: &mut [Entry<'_>], mut index: usize, mut local: bool) -> Option<bool> {
    while let Some(parent) = arena[index].parent {
        let entry = &mut arena[parent];
        entry.children_local &= local;
        entry.waiting -= 1;
        if entry.waiting > 0 {
            return None;
        }
        local = entry.children_local;
        index = parent;
    }
    Some(local)
}
