// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the REDRAFT_HOME environment variable for isolation.
// When REDRAFT_HOME is set, config and data live under that directory.
// When unset, config uses ~/.redraft/ and data uses XDG_DATA_HOME/redraft.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the REDRAFT_HOME override, if set.
fn redraft_home() -> Option<PathBuf> {
    std::env::var_os("REDRAFT_HOME").map(PathBuf::from)
}

/// Home directory, falling back to the working directory when none is known.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $REDRAFT_HOME/ or ~/.redraft/
pub fn config_dir() -> PathBuf {
    if let Some(home) = redraft_home() {
        return home;
    }
    dirs_home().join(".redraft")
}

/// Data directory: $REDRAFT_HOME/data/ or ~/.local/share/redraft/
pub fn data_dir() -> PathBuf {
    if let Some(home) = redraft_home() {
        return home.join("data");
    }
    ProjectDirs::from("", "", "redraft")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default SQLite database path
pub fn db_path() -> PathBuf {
    data_dir().join("redraft.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_under_config_dir() {
        let path = config_file_path();
        assert!(path.starts_with(config_dir()));
        assert_eq!(path.file_name().unwrap(), "config.toml");
    }

    #[test]
    fn test_db_under_data_dir() {
        let path = db_path();
        assert!(path.starts_with(data_dir()));
        assert_eq!(path.file_name().unwrap(), "redraft.db");
    }
}
