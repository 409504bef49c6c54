use futures::future::join_all;
use uuid::Uuid;

use crate::object::ContentHash;
use crate::share::Share;
use crate::store::{ContentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download request for {hash} failed: {source}")]
    Request {
        hash: ContentHash,
        #[source]
        source: StoreError,
    },
    #[error("share {0} has no content")]
    NoContent(Uuid),
    #[error("{} of {total} download requests failed: {}", .failed.len(), describe(.failed))]
    Batch {
        total: usize,
        failed: Vec<(String, StoreError)>,
    },
}

fn describe(failed: &[(String, StoreError)]) -> String {
    failed
        .iter()
        .map(|(name, err)| format!("{} ({})", name, err))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Asks the store to retrieve content. Completion means the store
///  acknowledged the request, the bytes arrive later.
#[derive(Debug, Clone)]
pub struct DownloadDriver<S> {
    store: S,
}

impl<S: ContentStore> DownloadDriver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn trigger_download(&self, hash: &ContentHash) -> Result<(), DownloadError> {
        tracing::debug!("download: pinning {}", hash);
        self.store
            .pin_add(hash)
            .await
            .map_err(|source| DownloadError::Request {
                hash: hash.clone(),
                source,
            })
    }

    /// Request every top-level item of a share at once. All requests
    ///  run to completion before a failure is reported.
    ///  Returns the number of requests issued.
    pub async fn download_share(&self, share: &Share) -> Result<usize, DownloadError> {
        let content = share.content().ok_or(DownloadError::NoContent(share.id()))?;
        tracing::info!("download: triggering download of share {}", share.title());

        // children unknown yet, pin the wrapper as a whole
        let targets: Vec<(String, &ContentHash)> = match content.children() {
            Some(children) => children
                .iter()
                .map(|(name, child)| (name.clone(), child.hash()))
                .collect(),
            None => vec![(content.hash().to_string(), content.hash())],
        };

        let total = targets.len();
        let results = join_all(
            targets
                .into_iter()
                .map(|(name, hash)| async move { (name, self.store.pin_add(hash).await) }),
        )
        .await;

        let failed: Vec<(String, StoreError)> = results
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|err| (name, err)))
            .collect();
        if !failed.is_empty() {
            tracing::error!(
                "download: {} of {} requests for share {} failed",
                failed.len(),
                total,
                share.title()
            );
            return Err(DownloadError::Batch { total, failed });
        }

        tracing::info!("download: all {} requests acknowledged", total);
        Ok(total)
    }
}
