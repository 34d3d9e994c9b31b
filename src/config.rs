//! Configuration loading and root directory resolution

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const APP_NAME: &str = "coursedesk";
pub const ROOT_ENV_VAR: &str = "COURSEDESK_ROOT";
pub const CONFIG_FILENAME: &str = "config.toml";

/// Contents of `config.toml`: the persisted root pointer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_directory: Option<PathBuf>,
}

impl ConfigFile {
    /// A missing file is an empty configuration
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub root_directory: PathBuf,
}

impl Config {
    /// Root directory priority:
    /// 1. `--root` argument
    /// 2. `COURSEDESK_ROOT` environment variable
    /// 3. `root_directory` in config.toml
    /// 4. platform data directory
    pub fn load(cli_root: Option<&str>) -> Result<Self> {
        let config_path = default_config_path()?;
        let file = ConfigFile::load(&config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable config file");
            ConfigFile::default()
        });
        let env_root = std::env::var(ROOT_ENV_VAR).ok();
        let root_directory = resolve_root_directory(
            cli_root,
            env_root.as_deref(),
            &file,
            default_root_directory()?,
        );
        debug!(root = %root_directory.display(), config = %config_path.display(), "Resolved configuration");

        Ok(Self {
            config_path,
            root_directory,
        })
    }
}

pub fn resolve_root_directory(
    cli_root: Option<&str>,
    env_root: Option<&str>,
    file: &ConfigFile,
    fallback: PathBuf,
) -> PathBuf {
    let non_empty = |value: &&str| !value.trim().is_empty();

    if let Some(root) = cli_root.filter(non_empty) {
        return PathBuf::from(root);
    }
    if let Some(root) = env_root.filter(non_empty) {
        return PathBuf::from(root);
    }
    if let Some(root) = file
        .root_directory
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
    {
        return root.clone();
    }
    fallback
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Failed to get config directory")?
        .join(APP_NAME)
        .join(CONFIG_FILENAME))
}

pub fn default_root_directory() -> Result<PathBuf> {
    Ok(dirs::data_dir()
        .context("Failed to get data directory")?
        .join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_beats_env_beats_file_beats_default() {
        let file = ConfigFile {
            root_directory: Some(PathBuf::from("/from/file")),
        };
        let fallback = PathBuf::from("/default");

        assert_eq!(
            resolve_root_directory(Some("/cli"), Some("/env"), &file, fallback.clone()),
            PathBuf::from("/cli")
        );
        assert_eq!(
            resolve_root_directory(None, Some("/env"), &file, fallback.clone()),
            PathBuf::from("/env")
        );
        assert_eq!(
            resolve_root_directory(None, Some("  "), &file, fallback.clone()),
            PathBuf::from("/from/file")
        );
        assert_eq!(
            resolve_root_directory(None, None, &ConfigFile::default(), fallback.clone()),
            fallback
        );
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);

        assert_eq!(ConfigFile::load(&path).unwrap(), ConfigFile::default());

        let file = ConfigFile {
            root_directory: Some(dir.path().join("root")),
        };
        file.save(&path).unwrap();
        assert_eq!(ConfigFile::load(&path).unwrap(), file);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "root_directory = [").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }
}
