use std::collections::{BTreeMap, BTreeSet};

use bincode::{Decode, Encode};

/// Metadata of a single remote file.
///
/// `health` follows the usual convention where `0.0` is fully healthy and
/// anything above `1.0` is no longer recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub struct FileMetadata {
    pub size: u64,
    pub health: f64,
    pub redundancy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Encode, Decode)]
pub struct DirectoryAggregate {
    pub size: u64,
    pub num_files: u64,
    pub num_subdirs: u64,
    /// Worst health in the subtree
    pub health: f64,
    /// `None` while the subtree holds no files
    pub min_redundancy: Option<f64>,
    /// Unix seconds of the last recomputation
    pub last_bubble: u64,
}

impl DirectoryAggregate {
    pub fn compute<'a>(
        files: impl IntoIterator<Item = &'a FileMetadata>,
        subdirs: impl IntoIterator<Item = &'a DirectoryAggregate>,
        now: u64,
    ) -> Self {
        let mut aggregate = DirectoryAggregate {
            last_bubble: now,
            ..Default::default()
        };

        for file in files {
            aggregate.size += file.size;
            aggregate.num_files += 1;
            aggregate.health = aggregate.health.max(file.health);
            aggregate.min_redundancy = Some(min_redundancy(aggregate.min_redundancy, file.redundancy));
        }

        for subdir in subdirs {
            aggregate.size += subdir.size;
            aggregate.num_files += subdir.num_files;
            aggregate.num_subdirs += 1 + subdir.num_subdirs;
            aggregate.health = aggregate.health.max(subdir.health);
            if let Some(redundancy) = subdir.min_redundancy {
                aggregate.min_redundancy = Some(min_redundancy(aggregate.min_redundancy, redundancy));
            }
        }

        aggregate
    }
}

fn min_redundancy(current: Option<f64>, candidate: f64) -> f64 {
    current.map_or(candidate, |current| current.min(candidate))
}

/// A directory as stored in the tree.
#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub(crate) struct DirectoryNode {
    pub files: BTreeMap<String, FileMetadata>,
    pub subdirs: BTreeSet<String>,
    pub aggregate: DirectoryAggregate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(size: u64, health: f64, redundancy: f64) -> FileMetadata {
        FileMetadata {
            size,
            health,
            redundancy,
        }
    }

    #[test]
    fn empty_directory_is_healthy_without_redundancy() {
        let aggregate = DirectoryAggregate::compute(&[] as &[FileMetadata], &[] as &[DirectoryAggregate], 42);
        assert_eq!(aggregate.size, 0);
        assert_eq!(aggregate.num_files, 0);
        assert_eq!(aggregate.health, 0.0);
        assert_eq!(aggregate.min_redundancy, None);
        assert_eq!(aggregate.last_bubble, 42);
    }

    #[test]
    fn files_are_summed_and_worst_values_kept() {
        let files = [file(10, 0.2, 3.0), file(5, 0.9, 1.5)];
        let aggregate = DirectoryAggregate::compute(&files, &[] as &[DirectoryAggregate], 0);

        assert_eq!(aggregate.size, 15);
        assert_eq!(aggregate.num_files, 2);
        assert_eq!(aggregate.health, 0.9);
        assert_eq!(aggregate.min_redundancy, Some(1.5));
    }

    #[test]
    fn subdirectories_contribute_their_aggregates() {
        let child = DirectoryAggregate {
            size: 100,
            num_files: 4,
            num_subdirs: 2,
            health: 1.2,
            min_redundancy: Some(0.8),
            last_bubble: 0,
        };
        let empty_child = DirectoryAggregate::default();
        let files = [file(1, 0.0, 2.0)];

        let aggregate = DirectoryAggregate::compute(&files, [&child, &empty_child], 7);

        assert_eq!(aggregate.size, 101);
        assert_eq!(aggregate.num_files, 5);
        assert_eq!(aggregate.num_subdirs, 4);
        assert_eq!(aggregate.health, 1.2);
        assert_eq!(aggregate.min_redundancy, Some(0.8));
    }
}
