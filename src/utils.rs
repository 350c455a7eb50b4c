use anyhow::Result;
use log::{error, info};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::{CONFIG_FILE_NAME, CONFIG_PATH_ENV};

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Config file location: the explicit argument, then the environment, then the working directory.
pub fn resolve_config_path(arg: Option<&str>, env: Option<&str>) -> PathBuf {
    let given = |p: &&str| !p.trim().is_empty();
    arg.filter(given)
        .or(env.filter(given))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Reads [`CONFIG_PATH_ENV`]
pub fn config_path_from_env() -> Option<String> {
    std::env::var(CONFIG_PATH_ENV).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_wins_over_environment() {
        assert_eq!(
            resolve_config_path(Some("a.json"), Some("b.json")),
            PathBuf::from("a.json")
        );
        assert_eq!(resolve_config_path(None, Some("b.json")), PathBuf::from("b.json"));
        assert_eq!(resolve_config_path(None, None), PathBuf::from(CONFIG_FILE_NAME));
    }

    #[test]
    fn blank_argument_falls_through_to_environment() {
        assert_eq!(resolve_config_path(Some(""), Some("b.json")), PathBuf::from("b.json"));
        assert_eq!(resolve_config_path(Some("  "), Some("")), PathBuf::from(CONFIG_FILE_NAME));
    }
}
