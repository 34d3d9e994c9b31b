//! The in-memory document and every operation that changes it.
//!
//! Each mutation works on a copy of the held tree, swaps the copy in, then
//! writes the whole document back through the [`HostBridge`]. Targets that do
//! not exist make the operation a silent no-op without a write-back.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bridge::HostBridge;
use crate::error::{StoreError, StoreResult};
use crate::handlers::cleanup::CleanupWorker;
use crate::models::formation::{is_web_url, new_id};
use crate::models::paths::{self, normalize_relative_path};
use crate::models::{
    AppData, ExportData, ExportOptions, Formation, FormationPatch, Group, GroupPatch, Module,
    ModulePatch, ProgressStatus, Resource, ResourceCategory, ResourceFormat, ResourceInput,
    ResourceKind, ResourcePatch, SchemaGeneration, Settings, SettingsPatch, detect_generation,
    migrate_document, parse_import, read_import, write_export,
};

trait Identified {
    fn id(&self) -> &str;
}

macro_rules! identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

identified!(Formation, Module, Resource, Group);

fn find_mut<'a, T: Identified>(items: &'a mut [T], id: &str) -> Option<&'a mut T> {
    items.iter_mut().find(|item| item.id() == id)
}

fn remove_by_id<T: Identified>(items: &mut Vec<T>, id: &str) -> bool {
    let before = items.len();
    items.retain(|item| item.id() != id);
    items.len() != before
}

/// Keeps `candidate` when it is set and free within `items`
fn fresh_id<T: Identified>(items: &[T], candidate: &str) -> String {
    if candidate.is_empty() || items.iter().any(|item| item.id() == candidate) {
        new_id()
    } else {
        candidate.to_string()
    }
}

/// Single-element move. Out-of-range indices leave the list untouched.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() || from == to {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

/// Absolute file paths inside the resources directory become managed pointers
fn adopt_managed_paths(data: &mut AppData, resources_dir: &Path) -> usize {
    let mut adopted = 0;
    let resources = data
        .formations
        .iter_mut()
        .flat_map(|f| f.modules.iter_mut())
        .flat_map(|m| m.resources.iter_mut());

    for resource in resources {
        if resource.kind != ResourceKind::File || resource.relative_path.is_some() {
            continue;
        }
        let pointer = resource
            .path
            .as_deref()
            .and_then(|p| paths::managed_pointer_for(resources_dir, p));
        if let Some(pointer) = pointer {
            resource.relative_path = Some(pointer);
            resource.path = None;
            adopted += 1;
        }
    }
    adopted
}

fn same_root(a: &str, b: &str) -> bool {
    Path::new(a.trim()).components().eq(Path::new(b.trim()).components())
}

pub struct Store<B: HostBridge> {
    bridge: Arc<B>,
    data: AppData,
    /// False while the host points at a root whose document could not be read
    loaded: bool,
    cleanup: CleanupWorker,
}

impl<B: HostBridge> Store<B> {
    /// Loads and normalizes the persisted document. Legacy documents are
    /// written back once in the current layout.
    pub fn open(bridge: B) -> StoreResult<Self> {
        let bridge = Arc::new(bridge);
        let raw = bridge.read_document().map_err(StoreError::Load)?;
        let generation = detect_generation(&raw);
        let (data, adopted) = Self::normalize(bridge.as_ref(), raw);
        let cleanup = CleanupWorker::spawn(Arc::clone(&bridge));

        let store = Self {
            bridge,
            data,
            loaded: true,
            cleanup,
        };

        let legacy = !matches!(generation, SchemaGeneration::Current);
        if legacy || adopted > 0 {
            info!(?generation, adopted, "Migrated legacy document");
            if let Err(e) = store.persist() {
                warn!(error = %e, "Could not write migrated document back");
            }
        }

        info!(
            formations = store.data.formations.len(),
            groups = store.data.groups.len(),
            root = %store.data.settings.root_directory,
            "Store opened"
        );
        Ok(store)
    }

    /// Waits for queued file cleanup, then stops the worker
    pub fn shutdown(mut self) {
        self.cleanup.flush();
        self.cleanup.shutdown();
        debug!("Store closed");
    }

    /// Migrates `raw` and returns it with the number of absolute paths that
    /// were turned into managed pointers.
    fn normalize(bridge: &B, raw: serde_json::Value) -> (AppData, usize) {
        let mut data = migrate_document(raw);
        // the root pointer held by the host wins over whatever the document says
        data.settings.root_directory = bridge.root_directory().display().to_string();
        let adopted = adopt_managed_paths(&mut data, &bridge.resources_dir());
        (data, adopted)
    }

    fn load(&self) -> StoreResult<AppData> {
        let raw = self.bridge.read_document().map_err(StoreError::Load)?;
        Ok(Self::normalize(self.bridge.as_ref(), raw).0)
    }

    /// Replaces the in-memory state with what the host currently holds
    pub fn reload(&mut self) -> StoreResult<()> {
        self.cleanup.flush();
        self.data = self.load()?;
        self.loaded = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn persist(&self) -> StoreResult<()> {
        self.bridge.write_document(&self.data).map_err(|e| {
            let reason = format!("{:#}", e);
            error!(error = %reason, "Write-back failed, in-memory state kept");
            StoreError::Persist(e)
        })
    }

    /// Swaps in `next` and writes it back. The swap is not undone when the
    /// write fails. Refused outright while the store is not loaded.
    fn commit(&mut self, next: AppData) -> StoreResult<()> {
        self.ensure_loaded()?;
        self.data = next;
        self.persist()
    }

    fn ensure_loaded(&self) -> StoreResult<()> {
        if self.loaded {
            return Ok(());
        }
        warn!("Refusing change, document for the current root is not loaded");
        Err(StoreError::NotLoaded)
    }

    /// Applies `change` to a copy of the tree and commits only on a hit
    fn mutate(&mut self, change: impl FnOnce(&mut AppData) -> bool) -> StoreResult<bool> {
        self.ensure_loaded()?;
        let mut next = self.data.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn formations(&self) -> &[Formation] {
        &self.data.formations
    }

    pub fn groups(&self) -> &[Group] {
        &self.data.groups
    }

    pub fn settings(&self) -> &Settings {
        &self.data.settings
    }

    pub fn formation(&self, formation_id: &str) -> Option<&Formation> {
        self.data.formation(formation_id)
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.data.group(group_id)
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Blocks until queued file deletes have run
    pub fn flush_cleanup(&self) {
        self.cleanup.flush();
    }

    // Formations

    /// Returns the id actually stored, fresh when the given one is empty or taken
    pub fn add_formation(&mut self, mut formation: Formation) -> StoreResult<String> {
        formation.id = fresh_id(&self.data.formations, &formation.id);
        let id = formation.id.clone();
        self.mutate(|data| {
            data.formations.push(formation);
            true
        })?;
        info!(formation = %id, "Formation added");
        Ok(id)
    }

    pub fn update_formation(&mut self, formation_id: &str, patch: FormationPatch) -> StoreResult<bool> {
        self.mutate(|data| match data.formation_mut(formation_id) {
            Some(formation) => {
                formation.apply(patch);
                true
            }
            None => false,
        })
    }

    /// Removes the formation and queues deletion of every managed file below it.
    /// Groups following it keep their now dangling reference.
    pub fn delete_formation(&mut self, formation_id: &str) -> StoreResult<bool> {
        self.ensure_loaded()?;
        let Some(files) = self.formation(formation_id).map(Formation::managed_files) else {
            return Ok(false);
        };
        self.schedule_deletes(files);
        let removed = self.mutate(|data| remove_by_id(&mut data.formations, formation_id))?;
        if removed {
            info!(formation = %formation_id, "Formation deleted");
        }
        Ok(removed)
    }

    // Modules

    pub fn add_module(&mut self, formation_id: &str, mut module: Module) -> StoreResult<Option<String>> {
        let Some(formation) = self.formation(formation_id) else {
            return Ok(None);
        };
        module.id = fresh_id(&formation.modules, &module.id);
        let id = module.id.clone();

        self.mutate(|data| match data.formation_mut(formation_id) {
            Some(formation) => {
                formation.modules.push(module);
                true
            }
            None => false,
        })?;
        debug!(formation = %formation_id, module = %id, "Module added");
        Ok(Some(id))
    }

    pub fn update_module(
        &mut self,
        formation_id: &str,
        module_id: &str,
        patch: ModulePatch,
    ) -> StoreResult<bool> {
        self.mutate(|data| {
            match data
                .formation_mut(formation_id)
                .and_then(|f| find_mut(&mut f.modules, module_id))
            {
                Some(module) => {
                    module.apply(patch);
                    true
                }
                None => false,
            }
        })
    }

    /// Queues one delete per managed file of the module, then drops the module
    /// whether or not those deletes succeed.
    pub fn delete_module(&mut self, formation_id: &str, module_id: &str) -> StoreResult<bool> {
        self.ensure_loaded()?;
        let Some(files) = self
            .formation(formation_id)
            .and_then(|f| f.module(module_id))
            .map(Module::managed_files)
        else {
            return Ok(false);
        };
        self.schedule_deletes(files);
        self.mutate(|data| {
            data.formation_mut(formation_id)
                .is_some_and(|f| remove_by_id(&mut f.modules, module_id))
        })
    }

    pub fn reorder_modules(&mut self, formation_id: &str, from: usize, to: usize) -> StoreResult<bool> {
        self.mutate(|data| {
            data.formation_mut(formation_id)
                .is_some_and(|f| move_item(&mut f.modules, from, to))
        })
    }

    // Resources

    fn build_resource(&self, input: ResourceInput) -> Resource {
        let relative_path = input.relative_path.as_deref().and_then(|raw| {
            let normalized = normalize_relative_path(raw);
            if normalized.is_none() {
                warn!(path = %raw, "Ignoring resource pointer outside the resources directory");
            }
            normalized
        });
        let path = input.path.filter(|p| !p.trim().is_empty());
        let url = input.url.filter(|u| !u.trim().is_empty());

        let kind = input.kind.unwrap_or_else(|| {
            if relative_path.is_some() || path.is_some() {
                ResourceKind::File
            } else {
                match &url {
                    Some(url) if !is_web_url(url) => ResourceKind::Cloud,
                    _ => ResourceKind::Link,
                }
            }
        });

        let location = relative_path.as_deref().or(path.as_deref()).or(url.as_deref());
        let format = input.format.or_else(|| location.map(ResourceFormat::infer));

        let label = input
            .label
            .filter(|l| !l.trim().is_empty())
            .or_else(|| {
                location
                    .and_then(|l| l.rsplit(|c: char| c == '/' || c == '\\').next())
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Ressource".to_string());

        let resource = Resource {
            id: new_id(),
            label,
            kind,
            category: input.category.unwrap_or_default(),
            format,
            relative_path,
            path,
            url,
            provider: input.provider,
            created_at: chrono::Utc::now(),
        };
        debug!(
            resource = %resource.id,
            location = ?self.resolve_resource_path(&resource),
            "Normalized resource"
        );
        resource
    }

    /// Normalizes `input` (kind, format, pointer) and appends it with a fresh
    /// id. Returns `None` when the module does not exist.
    pub fn add_resource(
        &mut self,
        formation_id: &str,
        module_id: &str,
        input: ResourceInput,
    ) -> StoreResult<Option<String>> {
        if self
            .formation(formation_id)
            .and_then(|f| f.module(module_id))
            .is_none()
        {
            return Ok(None);
        }
        let resource = self.build_resource(input);
        let id = resource.id.clone();

        self.mutate(|data| {
            match data
                .formation_mut(formation_id)
                .and_then(|f| find_mut(&mut f.modules, module_id))
            {
                Some(module) => {
                    module.resources.push(resource);
                    true
                }
                None => false,
            }
        })?;
        Ok(Some(id))
    }

    /// Copies `source` into the resources directory and attaches it
    pub fn import_resource(
        &mut self,
        formation_id: &str,
        module_id: &str,
        source: &Path,
        label: Option<String>,
        category: ResourceCategory,
    ) -> StoreResult<Option<String>> {
        self.ensure_loaded()?;
        if self
            .formation(formation_id)
            .and_then(|f| f.module(module_id))
            .is_none()
        {
            return Ok(None);
        }

        let imported = self
            .bridge
            .import_resource_file(source)
            .map_err(StoreError::Import)?;

        let input = ResourceInput {
            label: label.or(Some(imported.name)),
            kind: Some(ResourceKind::File),
            category: Some(category),
            format: (!imported.format.is_empty())
                .then(|| ResourceFormat::from_extension(&imported.format)),
            relative_path: Some(imported.relative_path),
            ..ResourceInput::default()
        };
        self.add_resource(formation_id, module_id, input)
    }

    pub fn update_resource(
        &mut self,
        formation_id: &str,
        module_id: &str,
        resource_id: &str,
        patch: ResourcePatch,
    ) -> StoreResult<bool> {
        self.mutate(|data| {
            match data
                .formation_mut(formation_id)
                .and_then(|f| find_mut(&mut f.modules, module_id))
                .and_then(|m| find_mut(&mut m.resources, resource_id))
            {
                Some(resource) => {
                    resource.apply(patch);
                    true
                }
                None => false,
            }
        })
    }

    pub fn delete_resource(
        &mut self,
        formation_id: &str,
        module_id: &str,
        resource_id: &str,
    ) -> StoreResult<bool> {
        self.ensure_loaded()?;
        let Some(resource) = self
            .formation(formation_id)
            .and_then(|f| f.module(module_id))
            .and_then(|m| m.resource(resource_id))
        else {
            return Ok(false);
        };
        if let Some(file) = resource.managed_file() {
            self.cleanup.schedule_delete(file);
        }
        self.mutate(|data| {
            data.formation_mut(formation_id)
                .and_then(|f| find_mut(&mut f.modules, module_id))
                .is_some_and(|m| remove_by_id(&mut m.resources, resource_id))
        })
    }

    pub fn reorder_resources(
        &mut self,
        formation_id: &str,
        module_id: &str,
        from: usize,
        to: usize,
    ) -> StoreResult<bool> {
        self.mutate(|data| {
            data.formation_mut(formation_id)
                .and_then(|f| find_mut(&mut f.modules, module_id))
                .is_some_and(|m| move_item(&mut m.resources, from, to))
        })
    }

    fn schedule_deletes(&self, files: Vec<String>) {
        for file in files {
            self.cleanup.schedule_delete(file);
        }
    }

    /// Absolute location of a resource file under the current resources directory
    pub fn resolve_resource_path(&self, resource: &Resource) -> Option<String> {
        let resources_dir = self.bridge.resources_dir();
        paths::resolve_resource_path(
            &resources_dir.to_string_lossy(),
            resource.relative_path.as_deref(),
            resource.path.as_deref(),
        )
    }

    /// Hands the resource to the OS shell. Returns the target that was opened;
    /// launcher failures are only logged.
    pub fn open_resource(
        &self,
        formation_id: &str,
        module_id: &str,
        resource_id: &str,
    ) -> Option<String> {
        let resource = self
            .formation(formation_id)?
            .module(module_id)?
            .resource(resource_id)?;

        let target = match resource.kind {
            ResourceKind::File => self.resolve_resource_path(resource),
            _ => resource
                .url
                .clone()
                .or_else(|| self.resolve_resource_path(resource)),
        }?;

        if let Err(e) = self.bridge.open_path(&target) {
            let reason = format!("{:#}", e);
            warn!(target = %target, error = %reason, "Failed to open resource");
        }
        Some(target)
    }

    // Groups

    pub fn add_group(&mut self, mut group: Group) -> StoreResult<String> {
        group.id = fresh_id(&self.data.groups, &group.id);
        let id = group.id.clone();
        self.mutate(|data| {
            data.groups.push(group);
            true
        })?;
        info!(group = %id, "Group added");
        Ok(id)
    }

    pub fn update_group(&mut self, group_id: &str, patch: GroupPatch) -> StoreResult<bool> {
        self.mutate(|data| match data.group_mut(group_id) {
            Some(group) => {
                group.apply(patch);
                true
            }
            None => false,
        })
    }

    pub fn delete_group(&mut self, group_id: &str) -> StoreResult<bool> {
        self.mutate(|data| remove_by_id(&mut data.groups, group_id))
    }

    /// Sets exactly one progress entry; the rest of the map is untouched
    pub fn update_group_progress(
        &mut self,
        group_id: &str,
        module_id: &str,
        status: ProgressStatus,
    ) -> StoreResult<bool> {
        self.mutate(|data| match data.group_mut(group_id) {
            Some(group) => {
                group.set_status(module_id, status);
                true
            }
            None => false,
        })
    }

    /// `TODO` for unknown groups and modules without an entry
    pub fn progress_status(&self, group_id: &str, module_id: &str) -> ProgressStatus {
        self.group(group_id)
            .map(|g| g.status_of(module_id))
            .unwrap_or_default()
    }

    // Settings

    /// A new root directory is handed to the host first; if the host refuses,
    /// nothing changes and the reason is returned. Otherwise the document is
    /// reloaded from the new location.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> StoreResult<()> {
        let new_root = patch
            .root_directory
            .filter(|root| {
                !root.trim().is_empty() && !same_root(root, &self.data.settings.root_directory)
            });

        let Some(new_root) = new_root else {
            self.mutate(|data| match patch.theme {
                Some(theme) if data.settings.theme != Some(theme) => {
                    data.settings.theme = Some(theme);
                    true
                }
                _ => false,
            })?;
            return Ok(());
        };

        // deletes queued against the old root must not land in the new one
        self.cleanup.flush();

        let previous_root = self.bridge.root_directory();
        self.bridge
            .set_root_directory(Path::new(&new_root))
            .map_err(|e| {
                let reason = format!("{:#}", e);
                warn!(root = %new_root, error = %reason, "Root directory change refused");
                StoreError::RootDirectory(reason)
            })?;

        let theme = patch.theme.or(self.data.settings.theme);
        let mut next = match self.load() {
            Ok(next) => next,
            Err(e) => {
                warn!(root = %new_root, error = %e, "New root unreadable, restoring the previous one");
                // the held data belongs to the previous root; it must never be
                // written into the new one
                if let Err(restore) = self.bridge.set_root_directory(&previous_root) {
                    let reason = format!("{:#}", restore);
                    error!(
                        root = %previous_root.display(),
                        error = %reason,
                        "Could not restore previous root, write-backs disabled until reload"
                    );
                    self.loaded = false;
                }
                return Err(e);
            }
        };
        next.settings.theme = theme;
        self.loaded = true;
        info!(
            root = %next.settings.root_directory,
            formations = next.formations.len(),
            "Reloaded from new root directory"
        );
        self.commit(next)
    }

    // Import / export

    pub fn export_data(&self) -> StoreResult<String> {
        self.export_with(&ExportOptions::default())
    }

    pub fn export_with(&self, options: &ExportOptions) -> StoreResult<String> {
        let export = ExportData::from_document(&self.data, options);
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Replaces the whole state with a backup. The root directory stays the
    /// one the host points at.
    pub fn import_data(&mut self, json: &str) -> StoreResult<()> {
        let imported = parse_import(json).map_err(|e| {
            let reason = format!("{:#}", e);
            warn!(error = %reason, "Rejected import");
            StoreError::InvalidImport(reason)
        })?;
        self.replace(imported)
    }

    pub fn export_to_file(&self, path: &Path, options: &ExportOptions) -> StoreResult<()> {
        write_export(&self.data, path, options).map_err(StoreError::Persist)
    }

    pub fn import_from_file(&mut self, path: &Path) -> StoreResult<()> {
        let imported =
            read_import(path).map_err(|e| StoreError::InvalidImport(format!("{:#}", e)))?;
        self.replace(imported)
    }

    fn replace(&mut self, mut imported: AppData) -> StoreResult<()> {
        imported.settings.root_directory = self.data.settings.root_directory.clone();
        adopt_managed_paths(&mut imported, &self.bridge.resources_dir());
        info!(
            formations = imported.formations.len(),
            groups = imported.groups.len(),
            "Importing document"
        );
        self.commit(imported)
    }
}
