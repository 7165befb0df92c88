use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::{DataDirError, resolve_data_dir};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub manifest: PathBuf,
    pub data_dir: PathBuf,
    pub detached: bool,
}

impl TryFrom<Cli> for RuntimeConfig {
    type Error = DataDirError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        Ok(Self {
            manifest: cli.manifest,
            data_dir: resolve_data_dir(cli.data_dir)?,
            detached: cli.detached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn explicit_data_dir_is_kept() {
        let cli = Cli::parse_from(["dirbubble", "batch.yaml", "--data-dir", "/tmp/bubble", "--detached"]);

        let config = RuntimeConfig::try_from(cli).unwrap();

        assert_eq!(config.manifest, PathBuf::from("batch.yaml"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/bubble"));
        assert!(config.detached);
    }
}
