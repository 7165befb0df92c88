use std::collections::HashSet;
use std::sync::Arc;

use compio::runtime::spawn;
use futures::future::join_all;
use parking_lot::Mutex;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::dir_path::DirPathError;
use crate::refresh::{Bubble, BubbleError, TreePath};

#[derive(Debug)]
struct PathSets<P> {
    /// Deepest mutated directories, none of them an ancestor of another
    child_paths: HashSet<P>,
    /// Every ancestor of a tracked directory
    parent_paths: HashSet<P>,
}

/// Collects the directories touched by a batch of mutations and bubbles each
/// branch of the tree exactly once.
///
/// Any number of threads may [`add`](Self::add) concurrently. Once the batch
/// is complete, [`refresh_all`](Self::refresh_all) or
/// [`refresh_all_blocking`](Self::refresh_all_blocking) bubbles every
/// remaining child directory. Dispatching does not reset the tracker.
pub struct RefreshPaths<B: Bubble> {
    paths: Mutex<PathSets<B::Path>>,
    bubbler: Arc<B>,
}

impl<B: Bubble> RefreshPaths<B> {
    /// Creates an empty tracker dispatching to `bubbler`.
    pub fn new(bubbler: Arc<B>) -> Self {
        Self {
            paths: Mutex::new(PathSets {
                child_paths: HashSet::new(),
                parent_paths: HashSet::new(),
            }),
            bubbler,
        }
    }

    /// Tracks a mutated directory.
    ///
    /// Ancestors of `path` stop being refresh points of their own, since the
    /// bubble started from `path` reaches them anyway.
    pub fn add(&self, path: B::Path) -> Result<(), AddPathError> {
        let mut paths = self.paths.lock();

        if paths.parent_paths.contains(&path) {
            return Ok(());
        }
        if paths.child_paths.contains(&path) {
            return Ok(());
        }

        debug!("Tracking '{}' for refresh", path);
        paths.child_paths.insert(path.clone());

        let mut current = path;
        while !current.is_root() {
            let parent = current.parent().context(MalformedPathSnafu {
                path: current.to_string(),
            })?;
            if paths.child_paths.remove(&parent) {
                debug!("'{}' superseded by a deeper directory", parent);
            }
            paths.parent_paths.insert(parent.clone());
            current = parent;
        }

        Ok(())
    }

    /// Number of directories a refresh would be started from.
    pub fn child_count(&self) -> usize {
        self.paths.lock().child_paths.len()
    }

    /// Number of ancestors covered by the tracked directories.
    pub fn parent_count(&self) -> usize {
        self.paths.lock().parent_paths.len()
    }

    /// Copy of the directories a refresh would be started from.
    pub fn child_paths(&self) -> HashSet<B::Path> {
        self.paths.lock().child_paths.clone()
    }

    /// Copy of the covered ancestors.
    pub fn parent_paths(&self) -> HashSet<B::Path> {
        self.paths.lock().parent_paths.clone()
    }

    /// Spawns a detached bubble for every child directory on the current
    /// runtime and returns immediately.
    pub fn refresh_all(&self) {
        let children = self.snapshot_children();
        debug!("Dispatching {} detached refreshes", children.len());

        for path in children {
            let bubbler = Arc::clone(&self.bubbler);
            spawn(async move { bubbler.bubble(path).await }).detach();
        }
    }

    /// Bubbles every child directory and waits for all of them.
    ///
    /// A failing directory does not stop the others; every failure ends up
    /// in the returned error.
    pub async fn refresh_all_blocking(&self) -> Result<(), RefreshAllError> {
        let children = self.snapshot_children();
        let attempted = children.len();
        debug!("Refreshing {} directories", attempted);

        let results = join_all(
            children
                .iter()
                .map(|path| self.bubbler.bubble_blocking(path)),
        )
        .await;

        let failures = children
            .iter()
            .zip(results)
            .filter_map(|(path, result)| {
                result.err().map(|source| RefreshFailure {
                    path: path.to_string(),
                    source,
                })
            })
            .collect::<Vec<_>>();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RefreshAllError {
                attempted,
                failures,
            })
        }
    }

    fn snapshot_children(&self) -> Vec<B::Path> {
        self.paths.lock().child_paths.iter().cloned().collect()
    }
}

#[derive(Debug, Snafu)]
pub enum AddPathError {
    #[snafu(display("Unable to get parent directory of '{}'", path))]
    MalformedPath { path: String, source: DirPathError },
}

#[derive(Debug, Snafu)]
#[snafu(display("Failed to refresh '{}'", path))]
pub struct RefreshFailure {
    path: String,
    source: BubbleError,
}

impl RefreshFailure {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn error(&self) -> &BubbleError {
        &self.source
    }
}

#[derive(Debug, Snafu)]
#[snafu(display(
    "Failed to refresh {} of {} directories: {}",
    failures.len(),
    attempted,
    describe_failures(failures)
))]
pub struct RefreshAllError {
    attempted: usize,
    failures: Vec<RefreshFailure>,
}

impl RefreshAllError {
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn failures(&self) -> &[RefreshFailure] {
        &self.failures
    }
}

fn describe_failures(failures: &[RefreshFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{} ({})", failure.path, failure.source))
        .collect::<Vec<_>>()
        .join("; ")
}
