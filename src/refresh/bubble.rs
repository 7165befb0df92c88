use std::fmt::Display;
use std::hash::Hash;

use snafu::Snafu;

use crate::dir_path::{DirPath, DirPathError};

/// Hierarchical identifier the refresh tracker can walk upwards.
pub trait TreePath: Clone + Eq + Hash + Display + Send + 'static {
    fn is_root(&self) -> bool;
    /// Fails for the root, or when the path cannot be resolved.
    fn parent(&self) -> Result<Self, DirPathError>;
}

impl TreePath for DirPath {
    fn is_root(&self) -> bool {
        DirPath::is_root(self)
    }

    fn parent(&self) -> Result<Self, DirPathError> {
        DirPath::parent(self)
    }
}

/// Recomputes the aggregate metadata of a directory and of all its ancestors.
pub trait Bubble: 'static {
    type Path: TreePath;

    /// Fire-and-forget bubble. Failures never reach the caller.
    async fn bubble(&self, path: Self::Path);

    /// Bubble that reports whether every directory on the way up was updated.
    async fn bubble_blocking(&self, path: &Self::Path) -> Result<(), BubbleError>;
}

#[derive(Debug, Snafu)]
pub enum BubbleError {
    #[snafu(display("Directory '{}' is not part of the metadata tree", path))]
    UnknownDirectory { path: String },
    #[snafu(display("Failed to resolve a directory while bubbling from '{}'", path))]
    MalformedPath { path: String, source: DirPathError },
}
