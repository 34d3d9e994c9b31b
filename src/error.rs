//! Error types for store operations

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The in-memory state already advanced; only the write-back failed
    #[error("failed to persist document: {0:#}")]
    Persist(anyhow::Error),

    #[error("failed to load document: {0:#}")]
    Load(anyhow::Error),

    /// The root directory was left unchanged
    #[error("failed to update root directory: {0}")]
    RootDirectory(String),

    #[error("failed to import resource file: {0:#}")]
    Import(anyhow::Error),

    #[error("invalid import: {0}")]
    InvalidImport(String),

    /// The host points at a root whose document was never read
    #[error("document for the current root is not loaded; reload first")]
    NotLoaded,

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
