//! Traversals over content-addressed directory graphs
//!
//! - **[`ObjectGraphResolver`]**: discovers the shape of a graph from a root hash
//! - **[`LocalityTracker`]**: works out which parts of a resolved graph are present locally
//! - **[`DownloadDriver`]**: asks the store to retrieve objects and shares
//!
//! Traversals are iterative with a bounded number of store requests in
//! flight, so neither the depth nor the width of a graph is limited by
//! the stack.

mod download;
mod locality;
mod resolver;

pub use download::{DownloadDriver, DownloadError};
pub use locality::{LocalityError, LocalityReport, LocalityTracker};
pub use resolver::{ObjectGraphResolver, ResolveError};
