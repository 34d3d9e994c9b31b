use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::{HostBridge, ImportedFile};
use crate::config::{Config, ConfigFile};
use crate::models::AppData;
use crate::models::paths::{RESOURCES_DIRNAME, clean_relative_path};

pub const DB_FILENAME: &str = "coursedata.json";

/// File-system host: one JSON document plus a managed resources folder under
/// a root directory that can be moved at runtime.
#[derive(Debug)]
pub struct StorageManager {
    root: RwLock<PathBuf>,
    /// Where the root pointer is persisted; `None` keeps the root in memory only
    config_path: Option<PathBuf>,
}

impl StorageManager {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_root(&config.root_directory, Some(config.config_path.clone()))
    }

    pub fn with_root(root: &Path, config_path: Option<PathBuf>) -> Result<Self> {
        prepare_root(root)?;
        Ok(Self {
            root: RwLock::new(root.to_path_buf()),
            config_path,
        })
    }

    fn root(&self) -> PathBuf {
        self.root
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn database_file(&self) -> PathBuf {
        self.root().join(DB_FILENAME)
    }

    /// Backup the database to a timestamped file
    pub fn backup_database(&self) -> Result<PathBuf> {
        let backup_dir = self.root().join("backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = backup_dir.join(format!("backup_{}.json", timestamp));

        fs::copy(self.database_file(), &backup_file).context("Failed to copy database file")?;
        info!(path = %backup_file.display(), "Database backed up");

        Ok(backup_file)
    }

    /// Moves an unparseable document aside so the next write cannot clobber it
    fn quarantine(&self, db_file: &Path) -> Result<PathBuf> {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let target = db_file.with_extension(format!("corrupt-{}.json", timestamp));
        fs::rename(db_file, &target).context("Failed to move corrupt database aside")?;
        Ok(target)
    }

    /// Target inside the resources directory, refusing anything that escapes it
    fn resource_target(&self, relative_path: &str) -> Result<PathBuf> {
        let cleaned = clean_relative_path(relative_path).replace('\\', "/");
        let relative = Path::new(&cleaned);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if cleaned.is_empty() || escapes {
            return Err(anyhow!("Invalid resource path: {}", relative_path));
        }
        Ok(self.resources_dir().join(relative))
    }
}

/// Creates the root, its resources folder and an empty document when missing
fn prepare_root(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join(RESOURCES_DIRNAME))
        .with_context(|| format!("Failed to create {}", root.display()))?;

    let db_file = root.join(DB_FILENAME);
    if !db_file.exists() {
        let seed = serde_json::to_string_pretty(&AppData::default())?;
        fs::write(&db_file, seed).context("Failed to seed database file")?;
        debug!(path = %db_file.display(), "Seeded empty database");
    }
    Ok(())
}

impl HostBridge for StorageManager {
    fn read_document(&self) -> Result<Value> {
        let db_file = self.database_file();
        if !db_file.exists() {
            return Ok(Value::Object(Default::default()));
        }

        let content = fs::read_to_string(&db_file).context("Failed to read database file")?;
        match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(e) => {
                let moved = self.quarantine(&db_file)?;
                warn!(error = %e, moved_to = %moved.display(), "Database file is not valid JSON, starting empty");
                Ok(Value::Object(Default::default()))
            }
        }
    }

    fn write_document(&self, doc: &AppData) -> Result<()> {
        let db_file = self.database_file();
        let content = serde_json::to_string_pretty(doc).context("Failed to serialize database")?;

        let tmp_file = db_file.with_extension("json.tmp");
        fs::write(&tmp_file, content).context("Failed to write database file")?;
        fs::rename(&tmp_file, &db_file).context("Failed to replace database file")
    }

    fn import_resource_file(&self, source: &Path) -> Result<ImportedFile> {
        let resources_dir = self.resources_dir();
        fs::create_dir_all(&resources_dir)?;

        let id = Uuid::new_v4().to_string();
        let format = source
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let file_name = if format.is_empty() {
            id.clone()
        } else {
            format!("{}.{}", id, format)
        };
        let absolute_path = resources_dir.join(&file_name);

        fs::copy(source, &absolute_path)
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        debug!(from = %source.display(), to = %absolute_path.display(), "Imported resource file");

        Ok(ImportedFile {
            id,
            name: source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            format,
            absolute_path,
            relative_path: format!("{}/{}", RESOURCES_DIRNAME, file_name),
        })
    }

    fn delete_resource_file(&self, relative_path: &str) -> Result<()> {
        let target = self.resource_target(relative_path)?;
        match fs::remove_file(&target) {
            Ok(()) => {
                debug!(path = %target.display(), "Deleted resource file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", target.display())),
        }
    }

    fn set_root_directory(&self, path: &Path) -> Result<()> {
        prepare_root(path)?;

        if let Some(config_path) = &self.config_path {
            let mut file = ConfigFile::load(config_path).unwrap_or_default();
            file.root_directory = Some(path.to_path_buf());
            file.save(config_path)?;
        }

        *self
            .root
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = path.to_path_buf();
        info!(root = %path.display(), "Root directory changed");
        Ok(())
    }

    fn root_directory(&self) -> PathBuf {
        self.root()
    }

    fn resources_dir(&self) -> PathBuf {
        self.root().join(RESOURCES_DIRNAME)
    }

    fn open_path(&self, target: &str) -> Result<()> {
        let mut command = if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else {
            Command::new("xdg-open")
        };

        command
            .arg(target)
            .spawn()
            .with_context(|| format!("Failed to open {}", target))?;
        Ok(())
    }
}
