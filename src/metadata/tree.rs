use std::collections::HashMap;
use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use parking_lot::RwLock;
use snafu::{ResultExt, Snafu};
use tracing::{debug, warn};

use crate::dir_path::{DirPath, DirPathError};
use crate::metadata::aggregate::DirectoryNode;
use crate::metadata::{DirectoryAggregate, FileMetadata};
use crate::refresh::{Bubble, BubbleError};

pub struct MetadataTree {
    directories: RwLock<HashMap<DirPath, DirectoryNode>>,
    bubbles: AtomicUsize,
    completions: Option<UnboundedSender<DirPath>>,
}

impl Default for MetadataTree {
    fn default() -> Self {
        Self::from_directories(HashMap::new())
    }
}

impl MetadataTree {
    /// Creates a tree holding only the empty root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from stored directories. The root is always present.
    pub(crate) fn from_directories(mut directories: HashMap<DirPath, DirectoryNode>) -> Self {
        directories.entry(DirPath::root()).or_default();
        Self {
            directories: RwLock::new(directories),
            bubbles: AtomicUsize::new(0),
            completions: None,
        }
    }

    pub(crate) fn directories_snapshot(&self) -> Vec<(DirPath, DirectoryNode)> {
        self.directories
            .read()
            .iter()
            .map(|(path, node)| (path.clone(), node.clone()))
            .collect()
    }

    /// Every fire-and-forget bubble reports its starting directory on the
    /// returned channel once it is done, successful or not.
    pub fn notify_completions(&mut self) -> UnboundedReceiver<DirPath> {
        let (sender, receiver) = mpsc::unbounded();
        self.completions = Some(sender);
        receiver
    }

    /// Stores a file, creating any missing directory on its path.
    /// Returns the directory holding the file.
    pub fn upsert_file(
        &self,
        file_path: &str,
        metadata: FileMetadata,
    ) -> Result<DirPath, TreeError> {
        let (dir, name) = DirPath::split_file(file_path).context(InvalidPathSnafu {
            path: file_path.to_string(),
        })?;

        let mut directories = self.directories.write();
        Self::ensure_directory(&mut directories, &dir).context(InvalidPathSnafu {
            path: file_path.to_string(),
        })?;
        if let Some(node) = directories.get_mut(&dir) {
            node.files.insert(name, metadata);
        }

        debug!("Stored file '{}'", file_path);
        Ok(dir)
    }

    /// Removes a file and returns the directory that held it.
    pub fn remove_file(&self, file_path: &str) -> Result<DirPath, TreeError> {
        let (dir, name) = DirPath::split_file(file_path).context(InvalidPathSnafu {
            path: file_path.to_string(),
        })?;

        let mut directories = self.directories.write();
        let node = directories
            .get_mut(&dir)
            .ok_or_else(|| TreeError::UnknownDirectory {
                path: dir.to_string(),
            })?;
        if node.files.remove(&name).is_none() {
            return Err(TreeError::UnknownFile {
                path: file_path.to_string(),
            });
        }

        debug!("Removed file '{}'", file_path);
        Ok(dir)
    }

    /// Last computed aggregate of `dir`, if the directory exists.
    pub fn aggregate(&self, dir: &DirPath) -> Option<DirectoryAggregate> {
        self.directories.read().get(dir).map(|node| node.aggregate)
    }

    /// Number of directories in the tree, root included.
    pub fn directory_count(&self) -> usize {
        self.directories.read().len()
    }

    /// Number of single-directory recomputations performed so far.
    pub fn bubble_count(&self) -> usize {
        self.bubbles.load(Ordering::Relaxed)
    }

    fn ensure_directory(
        directories: &mut HashMap<DirPath, DirectoryNode>,
        dir: &DirPath,
    ) -> Result<(), DirPathError> {
        // The root is always present, so the walk stops before asking for its parent
        let mut missing = Vec::new();
        let mut current = dir.clone();
        while !directories.contains_key(&current) {
            let parent = current.parent()?;
            missing.push(current);
            current = parent;
        }

        for path in missing.into_iter().rev() {
            let parent = path.parent()?;
            if let (Some(name), Some(parent_node)) = (path.name(), directories.get_mut(&parent)) {
                parent_node.subdirs.insert(name.to_string());
            }
            debug!("Created directory '{}'", path);
            directories.insert(path, DirectoryNode::default());
        }
        Ok(())
    }

    /// Recomputes the aggregate of a single directory.
    fn recompute(&self, dir: &DirPath) -> Result<(), BubbleError> {
        let mut directories = self.directories.write();

        let node = directories
            .get(dir)
            .ok_or_else(|| BubbleError::UnknownDirectory {
                path: dir.to_string(),
            })?;

        let mut subdir_aggregates = Vec::with_capacity(node.subdirs.len());
        for name in &node.subdirs {
            let child = dir.join(name).map_err(|source| BubbleError::MalformedPath {
                path: dir.to_string(),
                source,
            })?;
            match directories.get(&child) {
                Some(child_node) => subdir_aggregates.push(child_node.aggregate),
                None => warn!("Directory '{}' lists missing subdirectory '{}'", dir, child),
            }
        }

        let aggregate = DirectoryAggregate::compute(node.files.values(), &subdir_aggregates, unix_now());
        if let Some(node) = directories.get_mut(dir) {
            node.aggregate = aggregate;
        }
        self.bubbles.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Recomputes `dir` and every ancestor of it, nearest first.
    fn bubble_from(&self, dir: &DirPath) -> Result<(), BubbleError> {
        for current in iter::once(dir.clone()).chain(dir.ancestors()) {
            self.recompute(&current)?;
        }
        Ok(())
    }
}

impl Bubble for MetadataTree {
    type Path = DirPath;

    async fn bubble(&self, path: DirPath) {
        match self.bubble_from(&path) {
            Ok(()) => debug!("Bubbled metadata from '{}'", path),
            Err(e) => warn!("Failed to bubble metadata from '{}': {}", path, e),
        }

        if let Some(completions) = &self.completions {
            if let Err(send_err) = completions.unbounded_send(path) {
                debug!("Failed to report bubble completion: {}", send_err);
            }
        }
    }

    async fn bubble_blocking(&self, path: &DirPath) -> Result<(), BubbleError> {
        self.bubble_from(path)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Snafu)]
pub enum TreeError {
    #[snafu(display("Invalid file path '{}'", path))]
    InvalidPath { path: String, source: DirPathError },
    #[snafu(display("Directory '{}' does not exist", path))]
    UnknownDirectory { path: String },
    #[snafu(display("File '{}' does not exist", path))]
    UnknownFile { path: String },
}
