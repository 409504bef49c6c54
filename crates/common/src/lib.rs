/**
 * Tunables shared by the graph components
 *  and the filesystem import.
 */
pub mod config;
/**
 * Traversals over object graphs: resolving their
 *  shape, checking what is local, and requesting
 *  downloads.
 */
pub mod graph;
/**
 * Content-addressed object model: hashes,
 *  nodes, links and locality.
 */
pub mod object;
/**
 * Shares: building them from local files,
 *  publishing, and exporting them to disk.
 */
pub mod share;
/**
 * Collaborator for application state.
 *  Components report facts and read shares
 *  through it.
 */
pub mod state;
/**
 * Content store collaborator and its
 *  in-memory and iroh-blobs implementations.
 */
pub mod store;

pub mod prelude {
    pub use crate::config::SyncConfig;
    pub use crate::graph::{DownloadDriver, LocalityTracker, ObjectGraphResolver};
    pub use crate::object::{ContentHash, ObjectKind, ObjectNode};
    pub use crate::share::{Share, ShareBuilder, ShareExporter, ShareRequest};
    pub use crate::state::{Fact, StateContainer};
    pub use crate::store::{BlobsStore, ContentStore};
}
