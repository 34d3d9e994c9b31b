use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "light" | "clair" => Some(Theme::Light),
            "dark" | "sombre" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// Process-wide settings stored alongside the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub root_directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub root_directory: Option<String>,
    pub theme: Option<Theme>,
}

impl SettingsPatch {
    pub fn root(root_directory: impl Into<String>) -> Self {
        Self {
            root_directory: Some(root_directory.into()),
            theme: None,
        }
    }

    pub fn theme(theme: Theme) -> Self {
        Self {
            root_directory: None,
            theme: Some(theme),
        }
    }
}
