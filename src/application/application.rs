use std::fmt::Display;
use std::sync::Arc;

use futures::StreamExt;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::application::RuntimeConfig;
use crate::application::summary::Summary;
use crate::cli::Cli;
use crate::config::{DataDirError, Manifest, ManifestError};
use crate::executor::{ExecutorCreationError, IngestError, IngestExecutor};
use crate::metadata::{MetadataTree, SnapshotError};
use crate::refresh::{RefreshAllError, RefreshFailure, RefreshPaths};

pub struct Application;

impl Application {
    pub async fn run(cli: Cli) -> Result<(), ApplicationError> {
        let app_config = RuntimeConfig::try_from(cli).context(DataDirSnafu)?;
        debug!("Runtime config: {:?}", app_config);

        let mut tree = MetadataTree::read(&app_config.data_dir).await;
        let manifest = Manifest::from_path(app_config.manifest.clone())
            .await
            .context(ManifestSnafu)?;
        let completions = app_config.detached.then(|| tree.notify_completions());

        let tree = Arc::new(tree);
        let tracker = Arc::new(RefreshPaths::new(Arc::clone(&tree)));

        let applied = IngestExecutor::new(Arc::clone(&tree), Arc::clone(&tracker))
            .context(ExecutorCreationSnafu)?
            .apply(manifest.into_mutations())
            .await
            .context(IngestSnafu)?;
        info!(
            "Refreshing {} directories, {} more covered as ancestors",
            tracker.child_count(),
            tracker.parent_count()
        );
        debug!("Refresh points: {}", describe_paths(tracker.child_paths()));
        debug!("Covered ancestors: {}", describe_paths(tracker.parent_paths()));

        match completions {
            Some(completions) => {
                let dispatched = tracker.child_count();
                tracker.refresh_all();
                // Detached bubbles must finish before the snapshot is taken
                let finished = completions.take(dispatched).count().await;
                debug!("{} detached refreshes finished", finished);
            }
            None => {
                if let Err(error) = tracker.refresh_all_blocking().await {
                    warn!(
                        "{} of {} refreshes failed",
                        error.failures().len(),
                        error.attempted()
                    );
                    error.failures().iter().for_each(report_failure);
                    return Err(error).context(RefreshSnafu);
                }
            }
        }
        info!("Performed {} directory recomputations", tree.bubble_count());

        tree.write(&app_config.data_dir)
            .await
            .context(SnapshotSnafu)?;

        if let Some(summary) = Summary::from_tree(&tree, applied) {
            println!("{summary}");
        }

        Ok(())
    }
}

fn describe_paths<T: Ord + Display>(paths: impl IntoIterator<Item = T>) -> String {
    let mut paths = paths.into_iter().collect::<Vec<_>>();
    paths.sort();
    paths
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn report_failure(failure: &RefreshFailure) {
    warn!("Refresh of '{}' failed: {}", failure.path(), failure.error());
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while resolving the data directory"))]
    DataDirError { source: DataDirError },
    #[snafu(display("Critical failure encountered while reading the manifest"))]
    ManifestError { source: ManifestError },
    #[snafu(display("Critical failure encountered during executor creation"))]
    ExecutorCreationError { source: ExecutorCreationError },
    #[snafu(display("Critical failure encountered while applying mutations"))]
    IngestError { source: IngestError },
    #[snafu(display("Critical failure encountered while refreshing directories"))]
    RefreshError { source: RefreshAllError },
    #[snafu(display("Critical failure encountered while saving the metadata snapshot"))]
    SnapshotError { source: SnapshotError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::data::LogLevel;
    use crate::dir_path::DirPath;
    use rstest::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn cli(manifest: &Path, data_dir: &Path, detached: bool) -> Cli {
        Cli {
            manifest: manifest.to_path_buf(),
            log_level: LogLevel::Silent,
            data_dir: Some(data_dir.to_path_buf()),
            detached,
        }
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    #[compio::test]
    async fn run_bubbles_the_batch_and_saves_the_tree(#[case] detached: bool) {
        let workspace = TempDir::new().expect("Failed to create temp directory");
        let manifest = workspace.path().join("batch.yaml");
        let data_dir = workspace.path().join("data");
        std::fs::write(
            &manifest,
            "files:\n  \"/a/b/c/one.bin\": { size: 10 }\n  \"/a/b/d/two.bin\": { size: 20 }\n  \"/x/three.bin\": { size: 5 }\n",
        )
        .expect("Failed to write manifest");

        Application::run(cli(&manifest, &data_dir, detached))
            .await
            .unwrap();

        let tree = MetadataTree::read(&data_dir).await;
        let root = tree.aggregate(&DirPath::root()).unwrap();
        assert_eq!(root.size, 35);
        assert_eq!(root.num_files, 3);
        assert_eq!(
            tree.aggregate(&DirPath::new("/a/b").unwrap()).unwrap().size,
            30
        );
    }

    #[compio::test]
    async fn run_stops_on_a_failing_mutation() {
        let workspace = TempDir::new().expect("Failed to create temp directory");
        let manifest = workspace.path().join("batch.yaml");
        let data_dir = workspace.path().join("data");
        std::fs::write(&manifest, "removed:\n  - \"/missing.bin\"\n")
            .expect("Failed to write manifest");

        let result = Application::run(cli(&manifest, &data_dir, false)).await;

        assert!(matches!(result, Err(ApplicationError::IngestError { .. })));
        assert!(!data_dir.exists());
    }

    #[test]
    fn paths_are_described_in_order() {
        let paths = ["/b", "/a/c", "/"].map(|p| DirPath::new(p).unwrap());
        assert_eq!(describe_paths(paths), "/, /a/c, /b");
    }
}
