//! Slash-delimited directory identifiers for the remote metadata tree.

mod dir_path;

pub use dir_path::{DirPath, DirPathError};
