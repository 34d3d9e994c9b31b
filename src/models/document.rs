use serde::{Deserialize, Serialize};

use crate::models::{Formation, Group, Settings};

/// Shown for groups whose formation has been deleted
pub const UNKNOWN_FORMATION: &str = "Inconnue";

/// The whole persisted state: one JSON document on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub formations: Vec<Formation>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub settings: Settings,
}

impl AppData {
    pub fn formation(&self, formation_id: &str) -> Option<&Formation> {
        self.formations.iter().find(|f| f.id == formation_id)
    }

    pub fn formation_mut(&mut self, formation_id: &str) -> Option<&mut Formation> {
        self.formations.iter_mut().find(|f| f.id == formation_id)
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn group_mut(&mut self, group_id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == group_id)
    }

    /// Title of the formation a group follows; dangling references are tolerated
    pub fn formation_title_for(&self, group: &Group) -> &str {
        self.formation(&group.formation_id)
            .map(|f| f.titre.as_str())
            .unwrap_or(UNKNOWN_FORMATION)
    }

    /// Groups a learner can pick for a formation
    pub fn active_groups_for(&self, formation_id: &str) -> Vec<&Group> {
        self.groups
            .iter()
            .filter(|g| g.formation_id == formation_id && !g.archived)
            .collect()
    }

    pub fn resource_count(&self) -> usize {
        self.formations
            .iter()
            .flat_map(|f| &f.modules)
            .map(|m| m.resources.len())
            .sum()
    }
}
