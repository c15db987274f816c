use crate::core::error::SyncError;
use std::path::PathBuf;

pub fn get_config_directory() -> Result<PathBuf, SyncError> {
    let base = match std::env::consts::OS {
        "linux" | "freebsd" | "netbsd" | "openbsd" => std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config"))),
        "macos" => dirs::home_dir().map(|home| home.join("Library/Application Support")),
        _ => dirs::config_dir(),
    };

    base.map(|base| base.join("recipe-sync"))
        .ok_or(SyncError::ConfigDirectoryNotFound)
}
