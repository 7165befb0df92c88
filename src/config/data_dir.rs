use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use snafu::Snafu;
use tracing::debug;

/// Environment variable overriding the default data directory.
pub const DATA_DIR_ENV: &str = "DIRBUBBLE_DATA_DIR";

const APP_DIR_NAME: &str = "dirbubble";

/// Picks the data directory: explicit value first, then the environment,
/// then the per-platform default.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf, DataDirError> {
    resolve_from(explicit, env::var_os(DATA_DIR_ENV), default_data_dir())
}

fn resolve_from(
    explicit: Option<PathBuf>,
    from_env: Option<OsString>,
    default: Option<PathBuf>,
) -> Result<PathBuf, DataDirError> {
    if let Some(dir) = explicit {
        debug!("Using data directory from the command line");
        return Ok(dir);
    }

    if let Some(dir) = from_env.filter(|dir| !dir.is_empty()) {
        debug!("Using data directory from {}", DATA_DIR_ENV);
        return Ok(PathBuf::from(dir));
    }

    default.ok_or(DataDirError::NoDataDir)
}

fn default_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var_os("LOCALAPPDATA").map(|dir| PathBuf::from(dir).join(APP_DIR_NAME))
    }
    #[cfg(target_os = "macos")]
    {
        env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME)
        })
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(format!(".{APP_DIR_NAME}")))
    }
}

#[derive(Debug, Snafu)]
pub enum DataDirError {
    #[snafu(display(
        "Unable to determine a data directory, pass --data-dir or set {}",
        DATA_DIR_ENV
    ))]
    NoDataDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directory_wins() {
        let dir = resolve_from(
            Some(PathBuf::from("/explicit")),
            Some(OsString::from("/from-env")),
            Some(PathBuf::from("/default")),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/explicit"));
    }

    #[test]
    fn environment_beats_default() {
        let dir = resolve_from(
            None,
            Some(OsString::from("/from-env")),
            Some(PathBuf::from("/default")),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/from-env"));
    }

    #[test]
    fn empty_environment_value_is_ignored() {
        let dir = resolve_from(None, Some(OsString::new()), Some(PathBuf::from("/default"))).unwrap();
        assert_eq!(dir, PathBuf::from("/default"));
    }

    #[test]
    fn nothing_to_resolve_is_an_error() {
        assert!(matches!(
            resolve_from(None, None, None),
            Err(DataDirError::NoDataDir)
        ));
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    #[test]
    fn default_is_hidden_directory_in_home() {
        if let Some(dir) = default_data_dir() {
            assert!(dir.ends_with(".dirbubble"));
        }
    }
}
