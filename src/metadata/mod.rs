//! In-memory metadata tree whose directories carry aggregated statistics of
//! everything below them.
//!
//! The tree implements [`Bubble`](crate::refresh::Bubble): bubbling a
//! directory recomputes its aggregate from its own files and the aggregates
//! of its immediate subdirectories, then continues with the parent until the
//! root is reached.

mod aggregate;
mod snapshot;
mod tree;

pub use aggregate::{DirectoryAggregate, FileMetadata};
pub use snapshot::SnapshotError;
pub use tree::{MetadataTree, TreeError};
