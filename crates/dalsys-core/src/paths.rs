use std::path::{Path, PathBuf};

pub const DALSYS_DIR: &str = ".dalsys";
pub const CONFIG_FILE: &str = ".dalsys/config.yaml";
pub const DEFAULT_DATABASE: &str = ".dalsys/dalsys.db";

pub fn dalsys_dir(root: &Path) -> PathBuf {
    root.join(DALSYS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured database path: relative paths hang off the project
/// root, absolute paths are used as given.
pub fn database_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}
