use serde_json::json;
use std::fs;
use std::path::Path;

use coursedesk::config::ConfigFile;
use coursedesk::models::storage::DB_FILENAME;
use coursedesk::models::{
    AppData, Formation, Module, ResourceCategory, ResourceInput, SettingsPatch,
};
use coursedesk::{HostBridge, StorageManager, Store, StoreError};

fn storage_in(dir: &Path) -> StorageManager {
    StorageManager::with_root(&dir.join("root"), Some(dir.join("config.toml"))).unwrap()
}

#[test]
fn new_root_is_prepared_and_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(dir.path());
    let root = dir.path().join("root");

    assert!(root.join("resources").is_dir());
    assert!(root.join(DB_FILENAME).is_file());
    assert_eq!(storage.resources_dir(), root.join("resources"));

    let seeded: AppData = serde_json::from_value(storage.read_document().unwrap()).unwrap();
    assert_eq!(seeded, AppData::default());
}

#[test]
fn documents_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let mut store = Store::open(storage_in(dir.path())).unwrap();
    let formation_id = store.add_formation(Formation::new("Rust")).unwrap();
    store.add_module(&formation_id, Module::new("Ownership")).unwrap();
    let snapshot = store.data().clone();
    store.shutdown();

    let reopened = Store::open(storage_in(dir.path())).unwrap();
    assert_eq!(reopened.data(), &snapshot);
}

#[test]
fn corrupt_document_is_set_aside() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(dir.path());
    fs::write(storage.database_file(), "{ broken").unwrap();

    let store = Store::open(storage).unwrap();
    assert!(store.formations().is_empty());

    let quarantined = fs::read_dir(dir.path().join("root"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().contains("corrupt"));
    assert!(quarantined);
}

#[test]
fn imported_files_are_copied_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("Slides.PDF");
    fs::write(&source, b"%PDF-1.4").unwrap();

    let mut store = Store::open(storage_in(dir.path())).unwrap();
    let formation_id = store.add_formation(Formation::new("Rust")).unwrap();
    let module_id = store
        .add_module(&formation_id, Module::new("Ownership"))
        .unwrap()
        .unwrap();
    let resource_id = store
        .import_resource(&formation_id, &module_id, &source, None, ResourceCategory::Main)
        .unwrap()
        .unwrap();

    let resource = store.formation(&formation_id).unwrap().modules[0]
        .resource(&resource_id)
        .unwrap()
        .clone();
    let relative = resource.relative_path.clone().unwrap();
    assert!(relative.starts_with("resources/"));
    assert!(relative.ends_with(".pdf"));

    let copied = store.resolve_resource_path(&resource).unwrap();
    assert_eq!(fs::read(&copied).unwrap(), b"%PDF-1.4");
    assert!(source.exists());

    assert!(store.delete_module(&formation_id, &module_id).unwrap());
    store.flush_cleanup();
    assert!(!Path::new(&copied).exists());
}

#[test]
fn deleting_outside_the_resources_dir_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(dir.path());
    let outside = dir.path().join("keep.txt");
    fs::write(&outside, "keep").unwrap();

    assert!(storage.delete_resource_file("resources/../../keep.txt").is_err());
    assert!(outside.exists());
    // already gone is fine
    assert!(storage.delete_resource_file("resources/missing.pdf").is_ok());
}

#[test]
fn root_change_moves_the_store_and_persists_the_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(storage_in(dir.path())).unwrap();
    store.add_formation(Formation::new("Rust")).unwrap();

    let new_root = dir.path().join("moved");
    fs::create_dir_all(&new_root).unwrap();
    fs::write(
        new_root.join(DB_FILENAME),
        json!({ "formations": [{ "id": "f1", "titre": "Excel", "modules": [] }] }).to_string(),
    )
    .unwrap();

    store
        .update_settings(SettingsPatch::root(new_root.display().to_string()))
        .unwrap();

    assert_eq!(store.formations().len(), 1);
    assert_eq!(store.formations()[0].titre, "Excel");
    assert_eq!(store.bridge().root_directory(), new_root);
    assert!(new_root.join("resources").is_dir());

    let pointer = ConfigFile::load(&dir.path().join("config.toml")).unwrap();
    assert_eq!(pointer.root_directory, Some(new_root));
}

#[test]
fn unusable_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(storage_in(dir.path())).unwrap();
    store.add_formation(Formation::new("Rust")).unwrap();

    // a regular file cannot become a root directory
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();

    let err = store
        .update_settings(SettingsPatch::root(blocker.display().to_string()))
        .unwrap_err();
    assert!(matches!(err, StoreError::RootDirectory(_)));
    assert_eq!(store.formations()[0].titre, "Rust");
    assert_eq!(store.bridge().root_directory(), dir.path().join("root"));
}

#[test]
fn backup_copies_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(storage_in(dir.path())).unwrap();
    let formation_id = store.add_formation(Formation::new("Rust")).unwrap();
    let module_id = store
        .add_module(&formation_id, Module::new("Ownership"))
        .unwrap()
        .unwrap();
    store
        .add_resource(
            &formation_id,
            &module_id,
            ResourceInput::link("Book", "https://doc.rust-lang.org/book/"),
        )
        .unwrap();

    let backup = store.bridge().backup_database().unwrap();
    assert!(backup.starts_with(dir.path().join("root").join("backups")));

    let mut restored = Store::open(storage_in(&dir.path().join("other"))).unwrap();
    restored.import_from_file(&backup).unwrap();
    assert_eq!(restored.formations(), store.formations());
}
