use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a fresh entity id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A course: the top-level container of modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub titre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl Formation {
    pub fn new(titre: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            titre: titre.into(),
            description: None,
            icon: None,
            modules: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    /// Every managed file pointer below this formation
    pub fn managed_files(&self) -> Vec<String> {
        self.modules.iter().flat_map(Module::managed_files).collect()
    }

    pub fn apply(&mut self, patch: FormationPatch) {
        if let Some(titre) = patch.titre {
            self.titre = titre;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(icon) = patch.icon {
            self.icon = Some(icon);
        }
    }
}

/// An ordered unit of content within a formation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub titre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "ressources")]
    pub resources: Vec<Resource>,
}

impl Module {
    pub fn new(titre: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            titre: titre.into(),
            description: None,
            resources: Vec::new(),
        }
    }

    pub fn resource(&self, resource_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == resource_id)
    }

    pub fn managed_files(&self) -> Vec<String> {
        self.resources
            .iter()
            .filter_map(|r| r.managed_file().map(str::to_string))
            .collect()
    }

    pub fn apply(&mut self, patch: ModulePatch) {
        if let Some(titre) = patch.titre {
            self.titre = titre;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Link,
    Cloud,
}

impl ResourceKind {
    /// `link` for http(s) values, `file` for everything else
    pub fn infer(url_or_path: &str) -> Self {
        if is_web_url(url_or_path) {
            ResourceKind::Link
        } else {
            ResourceKind::File
        }
    }
}

pub fn is_web_url(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Placement of a resource inside its module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Main,
    Pdfs,
    Videos,
    #[default]
    Extras,
}

impl ResourceCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceCategory::Main => "principal",
            ResourceCategory::Pdfs => "documents",
            ResourceCategory::Videos => "vidéos",
            ResourceCategory::Extras => "annexes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceFormat {
    Ppt,
    Pdf,
    Video,
    Image,
    Link,
    Zip,
    Other(String),
}

impl ResourceFormat {
    /// Canonical name as stored in the document
    pub fn as_str(&self) -> &str {
        match self {
            ResourceFormat::Ppt => "ppt",
            ResourceFormat::Pdf => "pdf",
            ResourceFormat::Video => "video",
            ResourceFormat::Image => "image",
            ResourceFormat::Link => "link",
            ResourceFormat::Zip => "zip",
            ResourceFormat::Other(name) => name,
        }
    }

    /// Maps a file extension or an explicit type hint to a format
    pub fn from_extension(ext: &str) -> Self {
        let lower = ext.trim().to_lowercase();
        match lower.as_str() {
            "pdf" => ResourceFormat::Pdf,
            "ppt" | "pptx" | "odp" | "key" => ResourceFormat::Ppt,
            "mp4" | "mkv" | "avi" | "mov" | "webm" | "video" => ResourceFormat::Video,
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "image" => ResourceFormat::Image,
            "zip" | "rar" | "7z" => ResourceFormat::Zip,
            "link" | "lien" | "url" => ResourceFormat::Link,
            "" => ResourceFormat::Other("other".to_string()),
            _ if is_web_url(&lower) => ResourceFormat::Link,
            _ => ResourceFormat::Other(lower),
        }
    }

    /// Infers a format from the last path segment of a url or file path.
    /// Web urls without an extension are plain links.
    pub fn infer(url_or_path: &str) -> Self {
        match extension_of(url_or_path) {
            Some(ext) => Self::from_extension(&ext),
            None if is_web_url(url_or_path) => ResourceFormat::Link,
            None => ResourceFormat::Other("other".to_string()),
        }
    }
}

impl From<String> for ResourceFormat {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ppt" => ResourceFormat::Ppt,
            "pdf" => ResourceFormat::Pdf,
            "video" => ResourceFormat::Video,
            "image" => ResourceFormat::Image,
            "link" => ResourceFormat::Link,
            "zip" => ResourceFormat::Zip,
            _ => ResourceFormat::Other(value),
        }
    }
}

impl From<ResourceFormat> for String {
    fn from(value: ResourceFormat) -> Self {
        match value {
            ResourceFormat::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Extension of the last segment, ignoring query strings and fragments
fn extension_of(url_or_path: &str) -> Option<String> {
    let without_query = url_or_path
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(url_or_path);
    let without_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let segment = without_scheme.rsplit(|c: char| c == '/' || c == '\\').next()?;
    // a bare host name ("x.test") is not a file
    if is_web_url(url_or_path) && !without_scheme.contains('/') {
        return None;
    }
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// A single piece of content attached to a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "titre")]
    pub label: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub category: ResourceCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ResourceFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// The pointer into the resources directory, if this resource owns a managed file
    pub fn managed_file(&self) -> Option<&str> {
        match self.kind {
            ResourceKind::File => self.relative_path.as_deref().filter(|p| !p.is_empty()),
            _ => None,
        }
    }

    pub fn apply(&mut self, patch: ResourcePatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(format) = patch.format {
            self.format = Some(format);
        }
        if let Some(url) = patch.url {
            self.url = Some(url);
        }
        if let Some(provider) = patch.provider {
            self.provider = Some(provider);
        }
    }
}

/// Caller-supplied fields for a new resource, normalized by the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceInput {
    pub label: Option<String>,
    pub kind: Option<ResourceKind>,
    pub category: Option<ResourceCategory>,
    pub format: Option<ResourceFormat>,
    pub relative_path: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
    pub provider: Option<String>,
}

impl ResourceInput {
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn file(label: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            relative_path: Some(relative_path.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: ResourceCategory) -> Self {
        self.category = Some(category);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormationPatch {
    pub titre: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModulePatch {
    pub titre: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePatch {
    pub label: Option<String>,
    pub category: Option<ResourceCategory>,
    pub format: Option<ResourceFormat>,
    pub url: Option<String>,
    pub provider: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_url_extension() {
        assert_eq!(
            ResourceFormat::infer("https://x.test/slides.pdf"),
            ResourceFormat::Pdf
        );
        assert_eq!(
            ResourceFormat::infer("https://x.test/deck.PPTX?dl=1"),
            ResourceFormat::Ppt
        );
        assert_eq!(ResourceFormat::infer("https://x.test"), ResourceFormat::Link);
        assert_eq!(
            ResourceFormat::infer("https://x.test/watch"),
            ResourceFormat::Link
        );
        assert_eq!(
            ResourceFormat::infer("resources/abc.mkv"),
            ResourceFormat::Video
        );
        assert_eq!(
            ResourceFormat::infer("notes.odt"),
            ResourceFormat::Other("odt".to_string())
        );
    }

    #[test]
    fn kind_follows_scheme() {
        assert_eq!(ResourceKind::infer("https://x.test/a.pdf"), ResourceKind::Link);
        assert_eq!(ResourceKind::infer("HTTP://x.test"), ResourceKind::Link);
        assert_eq!(ResourceKind::infer("resources/a.pdf"), ResourceKind::File);
        assert_eq!(ResourceKind::infer("httpdocs/a.pdf"), ResourceKind::File);
    }

    #[test]
    fn format_serializes_as_plain_string() {
        let json = serde_json::to_string(&ResourceFormat::Pdf).unwrap();
        assert_eq!(json, "\"pdf\"");
        let custom: ResourceFormat = serde_json::from_str("\"odt\"").unwrap();
        assert_eq!(custom, ResourceFormat::Other("odt".to_string()));
    }

    #[test]
    fn module_accepts_french_collection_name() {
        let module: Module = serde_json::from_str(
            r#"{"id":"m1","titre":"Intro","ressources":[{"id":"r1","titre":"Slides","kind":"link","url":"https://x.test"}]}"#,
        )
        .unwrap();
        assert_eq!(module.resources.len(), 1);
        assert_eq!(module.resources[0].label, "Slides");
    }

    #[test]
    fn only_file_resources_own_managed_files() {
        let mut resource: Resource = serde_json::from_str(
            r#"{"id":"r1","label":"Doc","kind":"file","relativePath":"resources/a.pdf"}"#,
        )
        .unwrap();
        assert_eq!(resource.managed_file(), Some("resources/a.pdf"));
        resource.kind = ResourceKind::Link;
        assert_eq!(resource.managed_file(), None);
    }
}
