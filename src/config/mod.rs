mod data_dir;
mod manifest;

pub use data_dir::{DataDirError, resolve_data_dir};
pub use manifest::{Manifest, ManifestError, Mutation};
