use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::available_parallelism;

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use futures::future::join_all;
use futures_channel::oneshot;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::config::Mutation;
use crate::metadata::{MetadataTree, TreeError};
use crate::refresh::{AddPathError, RefreshPaths};

/// Applies manifest mutations to the metadata tree on a pool of worker
/// threads and records every touched directory in the refresh tracker.
pub struct IngestExecutor {
    dispatcher: Dispatcher,
    tree: Arc<MetadataTree>,
    tracker: Arc<RefreshPaths<MetadataTree>>,
}

impl IngestExecutor {
    pub fn new(
        tree: Arc<MetadataTree>,
        tracker: Arc<RefreshPaths<MetadataTree>>,
    ) -> Result<Self, ExecutorCreationError> {
        let workers_num = Self::determine_worker_count();
        debug!("Using {} worker threads for ingestion", workers_num);

        let dispatcher = DispatcherBuilder::new()
            .worker_threads(workers_num)
            .build()
            .context(DispatcherSnafu)?;

        Ok(Self {
            dispatcher,
            tree,
            tracker,
        })
    }

    /// Determines the number of worker threads, falling back to one
    fn determine_worker_count() -> NonZeroUsize {
        available_parallelism().unwrap_or(NonZeroUsize::MIN)
    }

    /// Applies every mutation and returns how many succeeded.
    ///
    /// All mutations are attempted; if any of them failed, the first failure
    /// is returned once the rest have finished.
    pub async fn apply(&self, mutations: Vec<Mutation>) -> Result<usize, IngestError> {
        debug!("Dispatching {} mutations", mutations.len());

        let mut receivers = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            receivers.push(self.dispatch_mutation(mutation)?);
        }

        let mut applied = 0;
        let mut first_error = None;
        for result in join_all(receivers).await {
            let result = match result {
                Ok(inner) => inner,
                Err(e) => Err(IngestError::CanceledError { source: e }),
            };
            match result {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Applied {} mutations", applied);
                Ok(applied)
            }
        }
    }

    fn dispatch_mutation(
        &self,
        mutation: Mutation,
    ) -> Result<oneshot::Receiver<Result<(), IngestError>>, IngestError> {
        let path = mutation.path().to_string();
        let tree = Arc::clone(&self.tree);
        let tracker = Arc::clone(&self.tracker);

        self.dispatcher
            .dispatch(move || async move { Self::apply_one(&tree, &tracker, mutation) })
            .map_err(|e| IngestError::DispatchError {
                path,
                error: e.to_string(),
            })
    }

    fn apply_one(
        tree: &MetadataTree,
        tracker: &RefreshPaths<MetadataTree>,
        mutation: Mutation,
    ) -> Result<(), IngestError> {
        let dir = match &mutation {
            Mutation::Upsert { path, metadata } => tree.upsert_file(path, *metadata),
            Mutation::Remove { path } => tree.remove_file(path),
        }
        .context(MutationSnafu {
            path: mutation.path(),
        })?;

        tracker.add(dir).context(TrackingSnafu {
            path: mutation.path(),
        })
    }
}

#[derive(Debug, Snafu)]
pub enum ExecutorCreationError {
    #[snafu(display("Failed to create ingestion dispatcher"))]
    DispatcherError { source: std::io::Error },
}

#[derive(Debug, Snafu)]
pub enum IngestError {
    #[snafu(display("Failed to dispatch mutation of '{}': {}", path, error))]
    DispatchError { path: String, error: String },
    #[snafu(display("Failed to apply mutation of '{}'", path))]
    MutationError { path: String, source: TreeError },
    #[snafu(display("Failed to track the directory of '{}'", path))]
    TrackingError { path: String, source: AddPathError },
    #[snafu(display("Mutation got cancelled"))]
    CanceledError { source: oneshot::Canceled },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir_path::DirPath;
    use crate::metadata::FileMetadata;
    use std::collections::HashSet;

    fn upsert(path: &str, size: u64) -> Mutation {
        Mutation::Upsert {
            path: path.to_string(),
            metadata: FileMetadata {
                size,
                health: 0.0,
                redundancy: 2.0,
            },
        }
    }

    fn executor() -> (
        IngestExecutor,
        Arc<MetadataTree>,
        Arc<RefreshPaths<MetadataTree>>,
    ) {
        let tree = Arc::new(MetadataTree::new());
        let tracker = Arc::new(RefreshPaths::new(Arc::clone(&tree)));
        let executor = IngestExecutor::new(Arc::clone(&tree), Arc::clone(&tracker))
            .expect("Failed to create executor");
        (executor, tree, tracker)
    }

    #[compio::test]
    async fn apply_tracks_the_directory_of_every_mutation() {
        let (executor, tree, tracker) = executor();
        let mut mutations = Vec::new();
        for album in 0..8 {
            for track in 0..4 {
                mutations.push(upsert(&format!("/music/a{album}/t{track}.flac"), 10));
            }
        }
        mutations.push(upsert("/music/cover.jpg", 1));

        let applied = executor.apply(mutations).await.unwrap();

        assert_eq!(applied, 33);
        assert_eq!(tree.directory_count(), 1 + 1 + 8);
        let expected: HashSet<DirPath> = (0..8)
            .map(|album| DirPath::new(format!("/music/a{album}")).unwrap())
            .collect();
        assert_eq!(tracker.child_paths(), expected);
        assert_eq!(tracker.parent_count(), 2);
    }

    #[compio::test]
    async fn apply_attempts_everything_and_reports_a_failure() {
        let (executor, tree, tracker) = executor();
        let mutations = vec![
            upsert("/docs/a.txt", 1),
            Mutation::Remove {
                path: "/docs/missing.txt".to_string(),
            },
            upsert("/pics/b.png", 2),
        ];

        let result = executor.apply(mutations).await;

        assert!(matches!(
            result,
            Err(IngestError::MutationError { ref path, .. }) if path == "/docs/missing.txt"
        ));
        assert_eq!(tree.directory_count(), 3);
        assert_eq!(tracker.child_count(), 2);
    }
}
