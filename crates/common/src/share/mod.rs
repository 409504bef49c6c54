//! Shares and the operations that move them in and out of the store
//!
//! - **[`Share`]**: a titled wrapper directory addressed to a set of recipients
//! - **[`ShareBuilder`]**: uploads local paths into a new share, streaming progress
//! - **[`ShareExporter`]**: writes the content of a share back to disk
//! - **[`SharePublisher`]** / **[`Notifier`]**: how a finished share reaches others

mod builder;
mod description;
mod exporter;
mod model;
mod notify;

pub use builder::{BuildError, BuildEvent, ProgressEvent, ShareBuilder, ShareRequest};
pub use description::{
    fetch_share_description, PublishError, ShareDescription, SharePublisher, StorePublisher,
};
pub use exporter::{ExportError, ExportEvent, ShareExporter};
pub use model::{Contact, Share, ShareError, ShareRecipient, ShareStatus};
pub use notify::Notifier;
