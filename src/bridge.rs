//! The boundary between the store and the host: file system and OS shell.
//!
//! Native file and directory pickers are a UI concern; callers hand concrete
//! paths to these methods.

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::models::AppData;

/// Metadata of a file copied into the managed resources directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFile {
    pub id: String,
    /// Original file name, before renaming
    pub name: String,
    /// Lowercase extension without the dot, empty when the source had none
    pub format: String,
    pub absolute_path: PathBuf,
    /// Always `resources/<id>.<ext>`
    pub relative_path: String,
}

pub trait HostBridge: Send + Sync + 'static {
    /// Raw persisted document, before migration. A missing document reads as `{}`.
    fn read_document(&self) -> Result<Value>;

    /// Persists the whole document
    fn write_document(&self, doc: &AppData) -> Result<()>;

    fn import_resource_file(&self, source: &Path) -> Result<ImportedFile>;

    /// Removes one managed file. A file that is already gone is not an error.
    fn delete_resource_file(&self, relative_path: &str) -> Result<()>;

    /// Points the host at a new root and prepares it (folders, seed document)
    fn set_root_directory(&self, path: &Path) -> Result<()>;

    fn root_directory(&self) -> PathBuf;

    fn resources_dir(&self) -> PathBuf;

    /// Hands a path or url to the OS default application
    fn open_path(&self, target: &str) -> Result<()>;
}
