use std::{borrow::Cow, path::PathBuf};

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::debug;

use crate::metadata::FileMetadata;

const DEFAULT_HEALTH: f64 = 0.0;
const DEFAULT_REDUNDANCY: f64 = 1.0;

/// A single change to the remote file tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Upsert {
        path: String,
        metadata: FileMetadata,
    },
    Remove {
        path: String,
    },
}

impl Mutation {
    pub fn path(&self) -> &str {
        match self {
            Mutation::Upsert { path, .. } | Mutation::Remove { path } => path,
        }
    }
}

/// Batch of file mutations read from a YAML manifest:
///
/// ```yaml
/// files:
///   "/photos/2024/a.jpg": { size: 1024, health: 0.25, redundancy: 3.0 }
/// removed:
///   - "/photos/old.jpg"
/// ```
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    mutations: Vec<Mutation>,
}

impl Manifest {
    pub async fn from_path(path: PathBuf) -> Result<Self, ManifestError> {
        debug!("Reading manifest file: {}", path.display());
        let bytes = fs::read(&path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        debug!("Successfully read manifest file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.display().to_string(),
        })?;
        contents.as_str().try_into()
    }

    #[cfg(test)]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    fn key(name: &'static str) -> Yaml<'static> {
        Yaml::Value(Scalar::String(Cow::Borrowed(name)))
    }

    fn parse_files(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<Vec<Mutation>, ManifestError> {
        let Some(files) = top_level.get(&Self::key("files")) else {
            return Ok(Vec::new());
        };

        let mutations = files
            .as_mapping()
            .ok_or(ManifestError::FilesNotMap)?
            .iter()
            .filter_map(|(key, value)| {
                if let (Yaml::Value(Scalar::String(path)), Yaml::Mapping(data)) = (key, value) {
                    return Self::parse_file_metadata(data).map(|metadata| Mutation::Upsert {
                        path: path.to_string(),
                        metadata,
                    });
                }
                debug!("Skipping invalid file entry: {:?}", key);
                None
            })
            .collect();

        Ok(mutations)
    }

    fn parse_file_metadata(data: &LinkedHashMap<Yaml, Yaml>) -> Option<FileMetadata> {
        let size = match data.get(&Self::key("size")) {
            Some(value) => u64::try_from(value.as_integer()?).ok()?,
            None => 0,
        };
        let health = match data.get(&Self::key("health")) {
            Some(value) => Self::as_number(value)?,
            None => DEFAULT_HEALTH,
        };
        let redundancy = match data.get(&Self::key("redundancy")) {
            Some(value) => Self::as_number(value)?,
            None => DEFAULT_REDUNDANCY,
        };

        Some(FileMetadata {
            size,
            health,
            redundancy,
        })
    }

    fn as_number(value: &Yaml) -> Option<f64> {
        value
            .as_floating_point()
            .or_else(|| value.as_integer().map(|i| i as f64))
    }

    fn parse_removed(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<Vec<Mutation>, ManifestError> {
        let Some(removed) = top_level.get(&Self::key("removed")) else {
            return Ok(Vec::new());
        };

        let mutations = removed
            .as_sequence()
            .ok_or(ManifestError::RemovedNotSequence)?
            .iter()
            .filter_map(|item| match item.as_str() {
                Some(path) => Some(Mutation::Remove {
                    path: path.to_string(),
                }),
                None => {
                    debug!("Skipping invalid removed entry: {:?}", item);
                    None
                }
            })
            .collect();

        Ok(mutations)
    }
}

impl TryFrom<&str> for Manifest {
    type Error = ManifestError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec =
            Yaml::load_from_str(contents).map_err(|e| ManifestError::ParseError { source: e })?;
        let contents = contents_vec
            .first()
            .ok_or(ManifestError::MalformedManifest)?;

        let top_level = contents
            .as_mapping()
            .ok_or(ManifestError::TopLevelNotMap)?;

        let mut mutations = Self::parse_files(top_level)?;
        mutations.extend(Self::parse_removed(top_level)?);
        debug!("Parsed {} mutations from manifest", mutations.len());

        Ok(Manifest { mutations })
    }
}

#[derive(Debug, Snafu)]
pub enum ManifestError {
    #[snafu(display("Failed to read the manifest file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Manifest file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the manifest file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted manifest file"))]
    MalformedManifest,
    #[snafu(display("Top level of manifest should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Files section should be a map"))]
    FilesNotMap,
    #[snafu(display("Removed section should be a list"))]
    RemovedNotSequence,
}
