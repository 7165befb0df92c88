//! Deduplication of directory refreshes after a batch of metadata mutations.
//!
//! Bubbling a directory recomputes its aggregate and then continues with its
//! parent, so one bubble from the deepest mutated directory of every branch
//! covers all of its ancestors. [`RefreshPaths`] collects mutated directories
//! and keeps only those deepest points.

mod bubble;
mod refresh_paths;

pub use bubble::{Bubble, BubbleError, TreePath};
pub use refresh_paths::{AddPathError, RefreshAllError, RefreshFailure, RefreshPaths};
