use common::graph::{DownloadDriver, LocalityTracker, ObjectGraphResolver};
use common::share::{ShareBuilder, ShareExporter, StorePublisher};
use common::state::StateError;
use common::store::{BlobsStore, BlobsStoreError};

use crate::file_state::FileState;
use crate::notifier::OutboxNotifier;
use crate::op::OpContext;
use crate::state::{AppState, StateError as AppStateError};

pub type Resolver = ObjectGraphResolver<BlobsStore, FileState>;
pub type Builder = ShareBuilder<BlobsStore, FileState, StorePublisher<BlobsStore>, OutboxNotifier>;
pub type Exporter = ShareExporter<BlobsStore, FileState>;

#[derive(Debug, thiserror::Error)]
pub enum ServicesError {
    #[error(transparent)]
    App(#[from] AppStateError),
    #[error("failed to open blob store: {0}")]
    Blobs(#[from] BlobsStoreError),
    #[error("failed to load shares: {0}")]
    State(#[from] StateError),
}

/// Everything an op needs, wired from the on-disk state directory
#[derive(Debug, Clone)]
pub struct Services {
    pub app: AppState,
    pub store: BlobsStore,
    pub state: FileState,
}

impl Services {
    pub async fn load(ctx: &OpContext) -> Result<Self, ServicesError> {
        let app = AppState::load(ctx.config_path.clone())?;
        let store = BlobsStore::fs(&app.blobs_path).await?;
        let state = FileState::load(&app.shares_path).await?;
        Ok(Self { app, store, state })
    }

    pub fn resolver(&self) -> Resolver {
        ObjectGraphResolver::new(
            self.store.clone(),
            self.state.clone(),
            self.app.config.sync_config(),
        )
    }

    pub fn tracker(&self) -> LocalityTracker<BlobsStore, FileState> {
        LocalityTracker::new(
            self.store.clone(),
            self.state.clone(),
            self.app.config.sync_config(),
        )
    }

    pub fn driver(&self) -> DownloadDriver<BlobsStore> {
        DownloadDriver::new(self.store.clone())
    }

    pub fn builder(&self) -> Builder {
        ShareBuilder::new(
            self.resolver(),
            StorePublisher::new(self.store.clone()),
            OutboxNotifier::new(self.app.outbox_path.clone()),
        )
    }

    pub fn exporter(&self) -> Exporter {
        ShareExporter::new(self.resolver())
    }
}
