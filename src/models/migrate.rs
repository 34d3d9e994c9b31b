//! Legacy document migration.
//!
//! Three on-disk generations predate the current layout:
//!
//! - slot courses: `{courses:[{items:[{main,pdfs,videos,extras}]}]}`
//! - item courses: `{courses:[{items:[{resources:[..]}]}]}`
//! - french modules: `{formations:[{modules:[{ressources:[{titre,type,role,stockage,chemin}]}]}]}`
//!
//! [`migrate_document`] accepts any of them, or the current layout, and always
//! yields a usable [`AppData`]. Malformed parts degrade to empty instead of
//! failing, and migrating an already migrated document changes nothing.

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::formation::{
    Formation, Module, Resource, ResourceCategory, ResourceFormat, ResourceKind, is_web_url,
    new_id,
};
use crate::models::paths::{is_absolute_path, normalize_relative_path};
use crate::models::{AppData, Group, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    SlotCourses,
    ItemCourses,
    Ressources,
    Current,
    Unrecognized,
}

/// Probes the first nested item of the first non-empty container.
///
/// Documents without any nested item are decided by their top-level key:
/// `courses` is treated as item courses (nothing to reshape below the
/// container), any other object as current.
pub fn detect_generation(raw: &Value) -> SchemaGeneration {
    let Some(root) = raw.as_object() else {
        return SchemaGeneration::Unrecognized;
    };

    if let Some(formations) = root.get("formations").and_then(Value::as_array) {
        return match first_nested(formations, "modules") {
            Some(module) if module.get("resources").is_some_and(Value::is_array) => {
                SchemaGeneration::Current
            }
            Some(module) if module.get("ressources").is_some_and(Value::is_array) => {
                SchemaGeneration::Ressources
            }
            _ => SchemaGeneration::Current,
        };
    }

    if let Some(courses) = root.get("courses").and_then(Value::as_array) {
        return match first_nested(courses, "items") {
            Some(item) if item.get("resources").is_some_and(Value::is_array) => {
                SchemaGeneration::ItemCourses
            }
            Some(_) => SchemaGeneration::SlotCourses,
            None => SchemaGeneration::ItemCourses,
        };
    }

    SchemaGeneration::Current
}

fn first_nested<'a>(containers: &'a [Value], key: &str) -> Option<&'a Map<String, Value>> {
    containers
        .iter()
        .filter_map(|container| container.get(key).and_then(Value::as_array))
        .find_map(|items| items.first())
        .and_then(Value::as_object)
}

/// Normalizes any known generation into the current document
pub fn migrate_document(raw: Value) -> AppData {
    let generation = detect_generation(&raw);
    debug!(?generation, "Normalizing document");

    match generation {
        SchemaGeneration::Unrecognized => {
            warn!("Document is not a JSON object, starting from an empty document");
            AppData::default()
        }
        SchemaGeneration::SlotCourses | SchemaGeneration::ItemCourses => {
            let formations = migrate_collection(&raw, "courses", migrate_course);
            AppData {
                formations,
                groups: migrate_groups(&raw),
                settings: migrate_settings(&raw),
            }
        }
        SchemaGeneration::Ressources | SchemaGeneration::Current => {
            let formations = migrate_collection(&raw, "formations", migrate_formation);
            AppData {
                formations,
                groups: migrate_groups(&raw),
                settings: migrate_settings(&raw),
            }
        }
    }
}

type ContainerFn = fn(&Map<String, Value>, usize, &mut HashSet<String>) -> Formation;

fn migrate_collection(raw: &Value, key: &str, migrate: ContainerFn) -> Vec<Formation> {
    let Some(entries) = raw.get(key).and_then(Value::as_array) else {
        if raw.get(key).is_some() {
            warn!(key, "Collection is not an array, ignoring it");
        }
        return Vec::new();
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match entry.as_object() {
            Some(object) => Some(migrate(object, index, &mut seen)),
            None => {
                warn!(key, index, "Skipping entry that is not an object");
                None
            }
        })
        .collect()
}

fn migrate_course(course: &Map<String, Value>, index: usize, seen: &mut HashSet<String>) -> Formation {
    Formation {
        id: unique_id(text(course, "id"), seen),
        titre: text(course, "name")
            .or_else(|| text(course, "titre"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Cours {}", index + 1)),
        description: text(course, "description").map(str::to_string),
        icon: text(course, "icon").map(str::to_string),
        modules: migrate_modules(course, "items"),
    }
}

fn migrate_formation(
    formation: &Map<String, Value>,
    index: usize,
    seen: &mut HashSet<String>,
) -> Formation {
    Formation {
        id: unique_id(text(formation, "id"), seen),
        titre: text(formation, "titre")
            .or_else(|| text(formation, "name"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Formation {}", index + 1)),
        description: text(formation, "description").map(str::to_string),
        icon: text(formation, "icon").map(str::to_string),
        modules: migrate_modules(formation, "modules"),
    }
}

fn migrate_modules(container: &Map<String, Value>, key: &str) -> Vec<Module> {
    let mut seen = HashSet::new();
    container
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| item.as_object().map(|item| (index, item)))
                .map(|(index, item)| migrate_module(item, index, &mut seen))
                .collect()
        })
        .unwrap_or_default()
}

fn migrate_module(item: &Map<String, Value>, index: usize, seen: &mut HashSet<String>) -> Module {
    let mut resource_ids = HashSet::new();
    let resources = if let Some(list) = item.get("resources").and_then(Value::as_array) {
        list.iter()
            .filter_map(|entry| current_resource(entry, &mut resource_ids))
            .collect()
    } else if let Some(list) = item.get("ressources").and_then(Value::as_array) {
        list.iter()
            .filter_map(|entry| {
                let object = entry.as_object()?;
                if object.contains_key("kind") {
                    current_resource(entry, &mut resource_ids)
                } else {
                    Some(french_resource(object, &mut resource_ids))
                }
            })
            .collect()
    } else {
        slot_resources(item, &mut resource_ids)
    };

    Module {
        id: unique_id(text(item, "id"), seen),
        titre: text(item, "titre")
            .or_else(|| text(item, "title"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Module {}", index + 1)),
        description: text(item, "description").map(str::to_string),
        resources,
    }
}

/// Flattens `main`, `pdfs`, `videos` and `extras` into one list, in that order
fn slot_resources(item: &Map<String, Value>, seen: &mut HashSet<String>) -> Vec<Resource> {
    let mut resources = Vec::new();

    if let Some(main) = item.get("main").and_then(Value::as_object) {
        resources.push(slot_resource(main, ResourceCategory::Main, seen));
    }

    for (key, category) in [
        ("pdfs", ResourceCategory::Pdfs),
        ("videos", ResourceCategory::Videos),
        ("extras", ResourceCategory::Extras),
    ] {
        let list = item.get(key).and_then(Value::as_array);
        for legacy in list.into_iter().flatten().filter_map(Value::as_object) {
            resources.push(slot_resource(legacy, category, seen));
        }
    }

    resources
}

fn slot_resource(
    legacy: &Map<String, Value>,
    category: ResourceCategory,
    seen: &mut HashSet<String>,
) -> Resource {
    let url = text(legacy, "url").unwrap_or_default();
    let format = match text(legacy, "type") {
        Some(hint) => ResourceFormat::from_extension(hint),
        None => ResourceFormat::infer(url),
    };
    let kind = if url.is_empty() {
        ResourceKind::Link
    } else {
        ResourceKind::infer(url)
    };
    let (relative_path, path) = match kind {
        ResourceKind::File => split_location(url),
        _ => (None, None),
    };

    Resource {
        id: unique_id(text(legacy, "id"), seen),
        label: text(legacy, "label").unwrap_or("Ressource").to_string(),
        kind,
        category,
        format: Some(format),
        relative_path,
        path,
        url: is_web_url(url).then(|| url.to_string()),
        provider: None,
        created_at: chrono::Utc::now(),
    }
}

fn french_resource(legacy: &Map<String, Value>, seen: &mut HashSet<String>) -> Resource {
    let kind_hint = text(legacy, "type");
    let storage = text(legacy, "stockage");
    let chemin = text(legacy, "chemin");
    let url = text(legacy, "url");

    let kind = if storage == Some("local") {
        ResourceKind::File
    } else if kind_hint == Some("lien") {
        ResourceKind::Link
    } else if storage == Some("cloud") {
        ResourceKind::Cloud
    } else if chemin.is_some() {
        ResourceKind::File
    } else {
        url.map(ResourceKind::infer).unwrap_or(ResourceKind::Link)
    };

    let category = match text(legacy, "role") {
        Some("principal") => ResourceCategory::Main,
        _ => annex_category(kind_hint),
    };

    let format = match kind_hint {
        Some(hint) => ResourceFormat::from_extension(hint),
        None => ResourceFormat::infer(chemin.or(url).unwrap_or_default()),
    };

    let (relative_path, path) = chemin.map(split_location).unwrap_or((None, None));

    Resource {
        id: unique_id(text(legacy, "id"), seen),
        label: text(legacy, "titre")
            .or_else(|| text(legacy, "label"))
            .unwrap_or("Ressource")
            .to_string(),
        kind,
        category,
        format: Some(format),
        relative_path,
        path,
        url: url.map(str::to_string),
        provider: text(legacy, "provider").map(str::to_string),
        created_at: created_at(legacy),
    }
}

/// Annexes are filed by what they contain
fn annex_category(format_hint: Option<&str>) -> ResourceCategory {
    match format_hint.map(ResourceFormat::from_extension) {
        Some(ResourceFormat::Pdf) => ResourceCategory::Pdfs,
        Some(ResourceFormat::Video) => ResourceCategory::Videos,
        _ => ResourceCategory::Extras,
    }
}

/// Reads `category`, accepting the french `principal` / `annexe` spellings.
/// Anything unrecognized falls back to the default category.
fn resource_category(object: &Map<String, Value>) -> Option<ResourceCategory> {
    let raw = object.get("category")?;
    let name = raw.as_str().unwrap_or_default().trim().to_lowercase();
    let category = match name.as_str() {
        "main" | "principal" => ResourceCategory::Main,
        "pdfs" => ResourceCategory::Pdfs,
        "videos" => ResourceCategory::Videos,
        "extras" => ResourceCategory::Extras,
        "annexe" | "annexes" => annex_category(text(object, "format").or(text(object, "type"))),
        _ => {
            warn!(category = %raw, "Unknown resource category, using the default");
            ResourceCategory::default()
        }
    };
    Some(category)
}

/// Resources already in the current shape; only missing ids, kinds and
/// timestamps are filled in, and category spellings are normalized.
fn current_resource(entry: &Value, seen: &mut HashSet<String>) -> Option<Resource> {
    let mut object = entry.as_object()?.clone();
    let id = unique_id(text(&object, "id"), seen);
    object.insert("id".to_string(), Value::String(id));

    if !object.contains_key("kind") {
        let kind = match (text(&object, "relativePath"), text(&object, "path"), text(&object, "url")) {
            (Some(_), _, _) | (_, Some(_), _) => ResourceKind::File,
            (_, _, Some(url)) => ResourceKind::infer(url),
            _ => ResourceKind::Link,
        };
        object.insert("kind".to_string(), serde_json::to_value(kind).ok()?);
    }
    if let Some(category) = resource_category(&object) {
        object.insert("category".to_string(), serde_json::to_value(category).ok()?);
    }
    if !object.contains_key("createdAt") {
        let now = chrono::Utc::now();
        object.insert("createdAt".to_string(), serde_json::to_value(now).ok()?);
    }

    match serde_json::from_value(Value::Object(object)) {
        Ok(resource) => Some(resource),
        Err(e) => {
            warn!(error = %e, "Skipping malformed resource");
            None
        }
    }
}

fn migrate_groups(raw: &Value) -> Vec<Group> {
    let mut seen = HashSet::new();
    raw.get("groups")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let mut object = entry.as_object()?.clone();
            let id = unique_id(text(&object, "id"), &mut seen);
            object.insert("id".to_string(), Value::String(id));
            match serde_json::from_value(Value::Object(object)) {
                Ok(group) => Some(group),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed group");
                    None
                }
            }
        })
        .collect()
}

fn migrate_settings(raw: &Value) -> Settings {
    match raw.get("settings") {
        None | Some(Value::Null) => Settings::default(),
        Some(settings) => serde_json::from_value(settings.clone()).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring malformed settings");
            Settings::default()
        }),
    }
}

/// Splits a legacy location into a managed pointer or an absolute path
fn split_location(location: &str) -> (Option<String>, Option<String>) {
    if location.is_empty() {
        (None, None)
    } else if is_absolute_path(location) {
        (None, Some(location.to_string()))
    } else {
        match normalize_relative_path(location) {
            Some(relative) => (Some(relative), None),
            None => (None, Some(location.to_string())),
        }
    }
}

fn created_at(object: &Map<String, Value>) -> chrono::DateTime<chrono::Utc> {
    object
        .get("createdAt")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_else(chrono::Utc::now)
}

fn text<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Keeps `candidate` unless it is missing or already taken in this collection
fn unique_id(candidate: Option<&str>, seen: &mut HashSet<String>) -> String {
    let id = match candidate {
        Some(id) if !seen.contains(id) => id.to_string(),
        _ => new_id(),
    };
    seen.insert(id.clone());
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remigrate(data: &AppData) -> AppData {
        migrate_document(serde_json::to_value(data).unwrap())
    }

    fn slot_document() -> Value {
        json!({
            "courses": [{
                "id": "c1",
                "name": "Bureautique",
                "description": "Les bases",
                "items": [{
                    "id": "i1",
                    "title": "Word",
                    "main": { "label": "Support", "type": "pptx", "url": "word.pptx" },
                    "pdfs": [{ "label": "Fiche", "type": "", "url": "https://x.test/fiche.pdf" }],
                    "videos": [{ "label": "Demo", "type": "mp4", "url": "/media/demo.mp4" }]
                }]
            }]
        })
    }

    #[test]
    fn detects_every_generation() {
        assert_eq!(detect_generation(&slot_document()), SchemaGeneration::SlotCourses);
        assert_eq!(
            detect_generation(&json!({"courses": [{"items": [{"resources": []}]}]})),
            SchemaGeneration::ItemCourses
        );
        assert_eq!(
            detect_generation(&json!({"formations": [{"modules": [{"ressources": []}]}]})),
            SchemaGeneration::Ressources
        );
        assert_eq!(
            detect_generation(&json!({"formations": [{"modules": [{"resources": []}]}]})),
            SchemaGeneration::Current
        );
        assert_eq!(detect_generation(&json!([1, 2])), SchemaGeneration::Unrecognized);
        assert_eq!(detect_generation(&Value::Null), SchemaGeneration::Unrecognized);
    }

    #[test]
    fn zero_item_documents_are_decided_by_top_level_key() {
        assert_eq!(
            detect_generation(&json!({"courses": [{"id": "c1", "items": []}]})),
            SchemaGeneration::ItemCourses
        );
        assert_eq!(detect_generation(&json!({"courses": []})), SchemaGeneration::ItemCourses);
        assert_eq!(detect_generation(&json!({"formations": []})), SchemaGeneration::Current);
        assert_eq!(detect_generation(&json!({})), SchemaGeneration::Current);

        let data = migrate_document(json!({"courses": [{"id": "c1", "name": "Vide", "items": []}]}));
        assert_eq!(data.formations.len(), 1);
        assert_eq!(data.formations[0].id, "c1");
        assert_eq!(data.formations[0].titre, "Vide");
        assert!(data.formations[0].modules.is_empty());
    }

    #[test]
    fn detection_skips_empty_leading_containers() {
        let raw = json!({"courses": [
            {"id": "c1", "items": []},
            {"id": "c2", "items": [{"id": "i1", "main": {"label": "S", "url": "s.pdf"}}]}
        ]});
        assert_eq!(detect_generation(&raw), SchemaGeneration::SlotCourses);
    }

    #[test]
    fn flattens_legacy_slots_in_order() {
        let data = migrate_document(slot_document());
        let formation = &data.formations[0];
        assert_eq!(formation.titre, "Bureautique");
        assert_eq!(formation.description.as_deref(), Some("Les bases"));

        let module = &formation.modules[0];
        assert_eq!(module.id, "i1");
        assert_eq!(module.titre, "Word");

        let categories: Vec<_> = module.resources.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![ResourceCategory::Main, ResourceCategory::Pdfs, ResourceCategory::Videos]
        );

        let main = &module.resources[0];
        assert_eq!(main.kind, ResourceKind::File);
        assert_eq!(main.format, Some(ResourceFormat::Ppt));
        assert_eq!(main.relative_path.as_deref(), Some("resources/word.pptx"));

        let fiche = &module.resources[1];
        assert_eq!(fiche.kind, ResourceKind::Link);
        assert_eq!(fiche.format, Some(ResourceFormat::Pdf));
        assert_eq!(fiche.url.as_deref(), Some("https://x.test/fiche.pdf"));

        let demo = &module.resources[2];
        assert_eq!(demo.kind, ResourceKind::File);
        assert_eq!(demo.path.as_deref(), Some("/media/demo.mp4"));
        assert_eq!(demo.relative_path, None);
    }

    #[test]
    fn missing_slots_and_ids_are_tolerated() {
        let data = migrate_document(json!({"courses": [{"items": [{}]}]}));
        let formation = &data.formations[0];
        assert!(!formation.id.is_empty());
        assert_eq!(formation.titre, "Cours 1");
        assert_eq!(formation.modules[0].titre, "Module 1");
        assert!(formation.modules[0].resources.is_empty());
    }

    #[test]
    fn items_already_migrated_are_kept() {
        let raw = json!({"courses": [{"id": "c1", "name": "Mixte", "items": [
            {"id": "i1", "title": "Old", "extras": [{"label": "Site", "url": "https://x.test"}]},
            {"id": "i2", "title": "New", "resources": [{
                "id": "r9", "label": "Deck", "kind": "file", "category": "main",
                "format": "ppt", "relativePath": "resources/deck.ppt",
                "createdAt": "2024-01-02T03:04:05Z"
            }]}
        ]}]});
        let data = migrate_document(raw);
        let modules = &data.formations[0].modules;
        assert_eq!(modules[0].resources[0].category, ResourceCategory::Extras);
        assert_eq!(modules[0].resources[0].format, Some(ResourceFormat::Link));
        assert_eq!(modules[1].resources[0].id, "r9");
        assert_eq!(modules[1].resources[0].label, "Deck");
    }

    #[test]
    fn maps_french_resources() {
        let raw = json!({"formations": [{"id": "f1", "titre": "Excel", "modules": [{
            "id": "m1", "titre": "Formules", "ressources": [
                {"id": "r1", "titre": "Support", "type": "ppt", "role": "principal",
                 "stockage": "local", "chemin": "resources/abc.pptx"},
                {"id": "r2", "titre": "Tuto", "type": "lien", "role": "annexe",
                 "stockage": "cloud", "url": "https://x.test/tuto"},
                {"id": "r3", "titre": "Cours", "type": "pdf", "role": "annexe",
                 "stockage": "local", "chemin": "resources/cours.pdf"}
            ]}]}],
            "groups": [{"id": "g1", "name": "Lyon", "formationId": "f1",
                        "progress": {"m1": "DONE"}}],
            "settings": {"rootDirectory": "/data", "theme": "dark"}
        });
        let data = migrate_document(raw);
        let resources = &data.formations[0].modules[0].resources;

        assert_eq!(resources[0].label, "Support");
        assert_eq!(resources[0].kind, ResourceKind::File);
        assert_eq!(resources[0].category, ResourceCategory::Main);
        assert_eq!(resources[0].relative_path.as_deref(), Some("resources/abc.pptx"));

        assert_eq!(resources[1].kind, ResourceKind::Link);
        assert_eq!(resources[1].format, Some(ResourceFormat::Link));
        assert_eq!(resources[1].category, ResourceCategory::Extras);

        assert_eq!(resources[2].category, ResourceCategory::Pdfs);
        assert_eq!(resources[2].format, Some(ResourceFormat::Pdf));

        assert_eq!(data.groups[0].status_of("m1"), crate::models::ProgressStatus::Done);
        assert_eq!(data.settings.root_directory, "/data");
    }

    #[test]
    fn current_resources_accept_french_categories() {
        let raw = json!({"formations": [{"id": "f1", "titre": "Excel", "modules": [{
            "id": "m1", "titre": "Formules", "resources": [
                {"id": "r1", "label": "Support", "kind": "file", "category": "principal",
                 "relativePath": "resources/a.pptx"},
                {"id": "r2", "label": "Fiche", "kind": "file", "category": "annexe",
                 "format": "pdf", "relativePath": "resources/b.pdf"},
                {"id": "r3", "label": "Demo", "kind": "link", "category": "annexe",
                 "format": "video", "url": "https://x.test/demo"},
                {"id": "r4", "label": "Lien", "kind": "link", "category": "annexe",
                 "url": "https://x.test"},
                {"id": "r5", "label": "Autre", "kind": "link", "category": "bonus",
                 "url": "https://x.test/autre"}
            ]}]}]});

        let data = migrate_document(raw);
        let categories: Vec<_> = data.formations[0].modules[0]
            .resources
            .iter()
            .map(|r| (r.id.as_str(), r.category))
            .collect();
        assert_eq!(
            categories,
            vec![
                ("r1", ResourceCategory::Main),
                ("r2", ResourceCategory::Pdfs),
                ("r3", ResourceCategory::Videos),
                ("r4", ResourceCategory::Extras),
                ("r5", ResourceCategory::Extras),
            ]
        );
        assert_eq!(remigrate(&data), data);
    }

    #[test]
    fn migration_is_idempotent_for_every_generation() {
        let samples = vec![
            slot_document(),
            json!({"courses": [{"id": "c1", "name": "N", "items": [{"id": "i1", "title": "T",
                "resources": [{"label": "L", "url": "https://x.test/a.pdf"}]}]}]}),
            json!({"formations": [{"titre": "F", "modules": [{"titre": "M",
                "ressources": [{"titre": "R", "type": "video", "stockage": "local", "chemin": "v.mp4"}]}]}]}),
            json!({"formations": [], "groups": [{"name": "G"}], "settings": {}}),
            json!("not a document"),
        ];

        for sample in samples {
            let once = migrate_document(sample);
            let twice = remigrate(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn malformed_documents_become_empty() {
        assert_eq!(migrate_document(json!(42)), AppData::default());
        assert_eq!(migrate_document(json!({"courses": "nope"})), AppData::default());
        assert_eq!(migrate_document(json!({"formations": 3})), AppData::default());

        let data = migrate_document(json!({"formations": [1, "x", {"id": "f1"}]}));
        assert_eq!(data.formations.len(), 1);
        assert_eq!(data.formations[0].titre, "Formation 3");
    }

    #[test]
    fn duplicate_ids_are_replaced() {
        let data = migrate_document(json!({"formations": [
            {"id": "dup", "titre": "A"},
            {"id": "dup", "titre": "B"}
        ]}));
        assert_eq!(data.formations[0].id, "dup");
        assert_ne!(data.formations[1].id, "dup");
    }

    #[test]
    fn malformed_groups_are_skipped() {
        let data = migrate_document(json!({"formations": [], "groups": [
            {"id": "g1", "name": "Ok"},
            {"id": "g2", "progress": {"m1": "SOMETIMES"}},
            "garbage"
        ]}));
        assert_eq!(data.groups.len(), 1);
        assert_eq!(data.groups[0].id, "g1");
    }
}
