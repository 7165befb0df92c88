use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Applies a batch of file metadata mutations and bubbles the aggregates of
/// every affected directory.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// YAML manifest listing upserted and removed files
    pub manifest: PathBuf,
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// Directory holding the metadata snapshot
    #[clap(long, short)]
    pub data_dir: Option<PathBuf>,

    /// Fire the refreshes without collecting their results
    #[clap(long)]
    pub detached: bool,
}
