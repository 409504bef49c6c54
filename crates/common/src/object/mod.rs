//! Content-addressed object model
//!
//! - **[`ContentHash`]**: opaque identifier of a piece of content
//! - **[`ObjectNode`]**: a resolved (or partially resolved) position in a directory graph
//! - **[`ObjectLink`]**: a named edge as listed by the store
//! - **[`LocalityStat`]** / **[`Locality`]**: what the store knows about how much of a hash is present locally
//!
//! The graph is a strict tree as seen from a root hash. Identical content
//! appearing in two branches shares a hash, but each occurrence is its own
//! node and is resolved independently.

mod hash;
mod locality;
mod node;

pub use hash::{ContentHash, HashError, HASH_HEX_LEN};
pub use locality::{Locality, LocalityStat};
pub use node::{is_valid_name, ObjectKind, ObjectLink, ObjectNode};
