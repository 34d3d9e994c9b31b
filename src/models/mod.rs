pub mod document;
pub mod export;
pub mod formation;
pub mod group;
pub mod migrate;
pub mod paths;
pub mod settings;
pub mod storage;

pub use document::{AppData, UNKNOWN_FORMATION};
pub use export::{ExportData, ExportOptions, parse_import, read_import, write_export};
pub use formation::{
    Formation, FormationPatch, Module, ModulePatch, Resource, ResourceCategory, ResourceFormat,
    ResourceInput, ResourceKind, ResourcePatch,
};
pub use group::{Group, GroupPatch, ProgressStatus, ProgressSummary};
pub use migrate::{SchemaGeneration, detect_generation, migrate_document};
pub use settings::{Settings, SettingsPatch, Theme};
pub use storage::StorageManager;
