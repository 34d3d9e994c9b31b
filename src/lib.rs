//! Course library store: formations, modules and resources, the groups that
//! follow them, and the host bridge that keeps it all on disk.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod store;

pub use bridge::{HostBridge, ImportedFile};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use models::StorageManager;
pub use store::Store;
