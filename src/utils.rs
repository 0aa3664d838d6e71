use dirs::data_dir;
use once_cell::sync::Lazy;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Overrides where the catalogue and config live, e.g. for a shared lab machine.
pub const DATA_DIR_ENV: &str = "UNINEAR_DATA_DIR";

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let root = resolve_data_root(std::env::var(DATA_DIR_ENV).ok(), data_dir());
    debug!(root = ?root, "resolved data root");
    root
});

fn resolve_data_root(override_dir: Option<String>, platform_dir: Option<PathBuf>) -> PathBuf {
    match override_dir.filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => platform_dir
            .map(|base| base.join("uninear"))
            .unwrap_or_else(|| PathBuf::from(".uninear")),
    }
}

pub fn database_path() -> PathBuf {
    DATA_ROOT.join("events.sqlite")
}

pub fn config_path() -> PathBuf {
    DATA_ROOT.join("config.json")
}

/// Creates the directory a database or config file is about to be written to.
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
