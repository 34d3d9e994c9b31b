use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{AppData, migrate_document};

/// Export options for customizing what to export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Only these formations (and, with groups, the groups following them)
    pub formation_ids: Option<Vec<String>>,
    pub include_groups: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            formation_ids: None,
            include_groups: true,
        }
    }
}

/// Backup file structure: the document plus provenance metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: AppData,
}

impl ExportData {
    pub fn from_document(doc: &AppData, options: &ExportOptions) -> Self {
        let mut data = doc.clone();

        if let Some(ids) = &options.formation_ids {
            data.formations.retain(|f| ids.contains(&f.id));
            data.groups.retain(|g| ids.contains(&g.formation_id));
        }
        if !options.include_groups {
            data.groups.clear();
        }

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize export to JSON")
    }
}

/// Parses a backup, accepting every document generation the migrator knows.
/// Only a JSON object is accepted as a document; missing collections are empty.
pub fn parse_import(json: &str) -> Result<AppData> {
    let raw: Value = serde_json::from_str(json).context("Import is not valid JSON")?;
    if !raw.is_object() {
        return Err(anyhow!("Import must be a JSON object"));
    }
    Ok(migrate_document(raw))
}

/// Export the document to a file
pub fn write_export(doc: &AppData, path: &Path, options: &ExportOptions) -> Result<()> {
    let json = ExportData::from_document(doc, options).to_json()?;
    fs::write(path, json).context("Failed to write JSON export file")
}

/// Import a document from a file
pub fn read_import(path: &Path) -> Result<AppData> {
    let contents = fs::read_to_string(path).context("Failed to read import file")?;
    parse_import(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Formation, Group};

    fn sample() -> AppData {
        let rust = Formation::new("Rust");
        let go = Formation::new("Go");
        let groups = vec![Group::new("A", rust.id.clone()), Group::new("B", go.id.clone())];
        AppData {
            formations: vec![rust, go],
            groups,
            ..AppData::default()
        }
    }

    #[test]
    fn filters_by_formation() {
        let doc = sample();
        let options = ExportOptions {
            formation_ids: Some(vec![doc.formations[1].id.clone()]),
            include_groups: true,
        };
        let export = ExportData::from_document(&doc, &options);
        assert_eq!(export.data.formations.len(), 1);
        assert_eq!(export.data.formations[0].titre, "Go");
        assert_eq!(export.data.groups.len(), 1);
        assert_eq!(export.data.groups[0].name, "B");
    }

    #[test]
    fn export_metadata_does_not_disturb_import() {
        let doc = sample();
        let json = ExportData::from_document(&doc, &ExportOptions::default())
            .to_json()
            .unwrap();
        assert!(json.contains("\"exportedAt\""));
        assert_eq!(parse_import(&json).unwrap(), doc);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(parse_import("{not json").is_err());
        assert!(parse_import("[1, 2]").is_err());
        assert_eq!(parse_import("{}").unwrap(), AppData::default());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let doc = sample();
        write_export(&doc, &path, &ExportOptions::default()).unwrap();
        assert_eq!(read_import(&path).unwrap(), doc);
    }
}
