use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use compio::fs;
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, info, warn};

use crate::dir_path::DirPath;
use crate::metadata::MetadataTree;
use crate::metadata::aggregate::DirectoryNode;

const SNAPSHOT_FILE_NAME: &str = "metadata.bin";
const SNAPSHOT_VERSION: u32 = 1;
const COMPRESSION_LEVEL: i32 = 3;

fn get_snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE_NAME)
}

#[derive(Encode, Decode)]
struct Snapshot {
    version: u32,
    directories: Vec<(DirPath, DirectoryNode)>,
}

impl MetadataTree {
    /// Loads the tree saved in `data_dir`, or an empty tree when there is no
    /// usable snapshot.
    pub async fn read(data_dir: &Path) -> Self {
        match Self::try_read(data_dir).await {
            Ok(Some(tree)) => {
                debug!(
                    "Loaded {} directories from metadata snapshot",
                    tree.directory_count()
                );
                tree
            }
            Ok(None) => {
                info!("No existing metadata snapshot found, starting fresh");
                Self::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable metadata snapshot, starting fresh: {}", e);
                Self::new()
            }
        }
    }

    /// Reads the snapshot in `data_dir`. A missing snapshot is `None`, any
    /// other failure is an error.
    async fn try_read(data_dir: &Path) -> Result<Option<Self>, SnapshotError> {
        let path = get_snapshot_path(data_dir);
        debug!("Reading metadata snapshot from {}", path.display());

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Read { path, source }),
        };

        Self::decode(&bytes).map(Some)
    }

    /// Saves the tree into `data_dir`, creating the directory if needed.
    pub async fn write(&self, data_dir: &Path) -> Result<(), SnapshotError> {
        fs::create_dir_all(data_dir).await.context(CreateDirSnafu {
            path: data_dir.to_path_buf(),
        })?;

        let bytes = self.encode()?;
        let path = get_snapshot_path(data_dir);
        fs::write(&path, bytes)
            .await
            .0
            .context(WriteSnafu { path: path.clone() })?;

        debug!("Wrote metadata snapshot to {}", path.display());
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            directories: self.directories_snapshot(),
        };
        let encoded =
            bincode::encode_to_vec(&snapshot, bincode::config::standard()).context(EncodeSnafu)?;
        zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL).context(CompressSnafu)
    }

    fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let decompressed = zstd::decode_all(bytes).context(DecompressSnafu)?;
        let (snapshot, _): (Snapshot, usize) =
            bincode::decode_from_slice(&decompressed, bincode::config::standard())
                .context(DecodeSnafu)?;
        ensure!(
            snapshot.version == SNAPSHOT_VERSION,
            VersionSnafu {
                found: snapshot.version
            }
        );

        Ok(Self::from_directories(
            snapshot.directories.into_iter().collect::<HashMap<_, _>>(),
        ))
    }
}

#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("Failed to create data directory {}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read metadata snapshot {}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write metadata snapshot {}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to encode metadata snapshot"))]
    Encode {
        source: bincode::error::EncodeError,
    },
    #[snafu(display("Failed to decode metadata snapshot"))]
    Decode {
        source: bincode::error::DecodeError,
    },
    #[snafu(display("Failed to compress metadata snapshot"))]
    Compress { source: std::io::Error },
    #[snafu(display("Failed to decompress metadata snapshot"))]
    Decompress { source: std::io::Error },
    #[snafu(display(
        "Unsupported metadata snapshot version {} (expected {})",
        found,
        SNAPSHOT_VERSION
    ))]
    Version { found: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FileMetadata;
    use crate::refresh::Bubble;
    use tempfile::TempDir;

    #[compio::test]
    async fn snapshot_survives_a_write_read_cycle() {
        let data_dir = TempDir::new().expect("Failed to create temp directory");
        let tree = MetadataTree::new();
        let holder = tree
            .upsert_file(
                "/music/album/song.flac",
                FileMetadata {
                    size: 4096,
                    health: 0.3,
                    redundancy: 2.5,
                },
            )
            .unwrap();
        tree.bubble_blocking(&holder).await.unwrap();

        tree.write(data_dir.path()).await.unwrap();
        let restored = MetadataTree::read(data_dir.path()).await;

        assert_eq!(restored.directory_count(), tree.directory_count());
        assert_eq!(
            restored.aggregate(&DirPath::root()),
            tree.aggregate(&DirPath::root())
        );
        assert_eq!(restored.bubble_count(), 0);
    }

    #[compio::test]
    async fn write_creates_missing_data_directory() {
        let parent = TempDir::new().expect("Failed to create temp directory");
        let data_dir = parent.path().join("nested").join("data");

        MetadataTree::new().write(&data_dir).await.unwrap();

        assert!(data_dir.join(SNAPSHOT_FILE_NAME).exists());
    }

    #[compio::test]
    async fn read_without_snapshot_starts_fresh() {
        let data_dir = TempDir::new().expect("Failed to create temp directory");

        let tree = MetadataTree::read(data_dir.path()).await;

        assert_eq!(tree.directory_count(), 1);
        assert!(tree.aggregate(&DirPath::root()).is_some());
    }

    #[compio::test]
    async fn read_ignores_corrupt_snapshot() {
        let data_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(data_dir.path().join(SNAPSHOT_FILE_NAME), b"not a snapshot")
            .expect("Failed to write corrupt snapshot");

        let tree = MetadataTree::read(data_dir.path()).await;

        assert_eq!(tree.directory_count(), 1);
    }

    #[compio::test]
    async fn missing_snapshot_is_not_an_error() {
        let data_dir = TempDir::new().expect("Failed to create temp directory");

        let result = MetadataTree::try_read(data_dir.path()).await;

        assert!(matches!(result, Ok(None)));
    }

    #[compio::test]
    async fn unreadable_snapshot_is_reported() {
        let data_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::create_dir(data_dir.path().join(SNAPSHOT_FILE_NAME))
            .expect("Failed to create directory in place of the snapshot");

        let result = MetadataTree::try_read(data_dir.path()).await;
        assert!(result.is_err());

        let tree = MetadataTree::read(data_dir.path()).await;
        assert_eq!(tree.directory_count(), 1);
    }

    #[compio::test]
    async fn corrupt_snapshot_is_reported() {
        let data_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(data_dir.path().join(SNAPSHOT_FILE_NAME), b"not a snapshot")
            .expect("Failed to write corrupt snapshot");

        let result = MetadataTree::try_read(data_dir.path()).await;

        assert!(matches!(result, Err(SnapshotError::Decompress { .. })));
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION + 1,
            directories: Vec::new(),
        };
        let encoded = bincode::encode_to_vec(&snapshot, bincode::config::standard()).unwrap();
        let compressed = zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL).unwrap();

        let result = MetadataTree::decode(&compressed);

        assert!(matches!(result, Err(SnapshotError::Version { found }) if found == SNAPSHOT_VERSION + 1));
    }
}
