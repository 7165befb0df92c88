use bincode::{Decode, Encode};
use derive_more::Display;
use snafu::Snafu;

const SEPARATOR: char = '/';

/// Immutable path of a directory in the remote tree.
///
/// Stored without leading or trailing separators, so the root is the empty
/// string and displays as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Encode, Decode)]
#[display("/{_0}")]
pub struct DirPath(String);

impl DirPath {
    pub fn root() -> Self {
        DirPath(String::new())
    }

    pub fn new(path: impl AsRef<str>) -> Result<Self, DirPathError> {
        let raw = path.as_ref();
        let trimmed = raw.trim_matches(SEPARATOR);

        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        for segment in trimmed.split(SEPARATOR) {
            Self::validate_segment(raw, segment)?;
        }

        Ok(DirPath(trimmed.to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the directory containing this one. Fails for the root.
    pub fn parent(&self) -> Result<Self, DirPathError> {
        if self.is_root() {
            return Err(DirPathError::NoParent {
                path: self.to_string(),
            });
        }

        match self.0.rsplit_once(SEPARATOR) {
            Some((parent, _)) => Ok(DirPath(parent.to_string())),
            None => Ok(Self::root()),
        }
    }

    /// Last segment of the path, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit(SEPARATOR).next()
    }

    pub fn join(&self, name: &str) -> Result<Self, DirPathError> {
        let joined = if self.is_root() {
            name.to_string()
        } else {
            format!("{}{SEPARATOR}{name}", self.0)
        };
        Self::validate_segment(&joined, name)?;
        Ok(DirPath(joined))
    }

    /// Splits a file path into the directory holding the file and its name.
    pub fn split_file(path: impl AsRef<str>) -> Result<(Self, String), DirPathError> {
        let raw = path.as_ref();
        let full = Self::new(raw)?;
        let name = full
            .name()
            .ok_or_else(|| DirPathError::FileAtRoot {
                path: raw.to_string(),
            })?
            .to_string();
        Ok((full.parent()?, name))
    }

    /// Iterates over every proper ancestor, nearest first, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = DirPath> {
        let mut current = self.parent().ok();
        std::iter::from_fn(move || {
            let next = current.take()?;
            current = next.parent().ok();
            Some(next)
        })
    }

    /// True when `self` is a strict ancestor of `other`.
    #[cfg(test)]
    pub fn is_ancestor_of(&self, other: &DirPath) -> bool {
        other.ancestors().any(|ancestor| &ancestor == self)
    }

    fn validate_segment(path: &str, segment: &str) -> Result<(), DirPathError> {
        match segment {
            "" => Err(DirPathError::EmptySegment {
                path: path.to_string(),
            }),
            "." | ".." => Err(DirPathError::RelativeSegment {
                path: path.to_string(),
                segment: segment.to_string(),
            }),
            s if s.contains(SEPARATOR) => Err(DirPathError::SeparatorInSegment {
                path: path.to_string(),
                segment: segment.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum DirPathError {
    #[snafu(display("Path '{}' contains an empty segment", path))]
    EmptySegment { path: String },
    #[snafu(display("Path '{}' contains the relative segment '{}'", path, segment))]
    RelativeSegment { path: String, segment: String },
    #[snafu(display("Segment '{}' of path '{}' contains a separator", segment, path))]
    SeparatorInSegment { path: String, segment: String },
    #[snafu(display("The root directory '{}' has no parent", path))]
    NoParent { path: String },
    #[snafu(display("Path '{}' names the root, not a file", path))]
    FileAtRoot { path: String },
}
