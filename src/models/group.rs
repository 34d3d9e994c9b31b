use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::formation::{Formation, new_id};

/// Completion status of one module for one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl ProgressStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "todo" | "a_faire" => Some(ProgressStatus::Todo),
            "in_progress" | "en_cours" => Some(ProgressStatus::InProgress),
            "done" | "termine" | "terminé" => Some(ProgressStatus::Done),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressStatus::Todo => "À faire",
            ProgressStatus::InProgress => "En cours",
            ProgressStatus::Done => "Terminé",
        }
    }
}

/// A cohort of learners following one formation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub formation_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived: bool,
    /// Sparse: modules without an entry are `TODO`
    #[serde(default)]
    pub progress: BTreeMap<String, ProgressStatus>,
}

impl Group {
    pub fn new(name: impl Into<String>, formation_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            city: String::new(),
            session: String::new(),
            start_date: None,
            end_date: None,
            formation_id: formation_id.into(),
            created_at: Utc::now(),
            archived: false,
            progress: BTreeMap::new(),
        }
    }

    pub fn status_of(&self, module_id: &str) -> ProgressStatus {
        self.progress.get(module_id).copied().unwrap_or_default()
    }

    pub fn set_status(&mut self, module_id: impl Into<String>, status: ProgressStatus) {
        self.progress.insert(module_id.into(), status);
    }

    /// Counts statuses over the modules of `formation`, ignoring stale entries
    /// for modules that no longer exist.
    pub fn summary(&self, formation: &Formation) -> ProgressSummary {
        let mut summary = ProgressSummary::default();
        for module in &formation.modules {
            match self.status_of(&module.id) {
                ProgressStatus::Todo => summary.todo += 1,
                ProgressStatus::InProgress => summary.in_progress += 1,
                ProgressStatus::Done => summary.done += 1,
            }
        }
        summary
    }

    pub fn apply(&mut self, patch: GroupPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(city) = patch.city {
            self.city = city;
        }
        if let Some(session) = patch.session {
            self.session = session;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = Some(start_date);
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = Some(end_date);
        }
        if let Some(formation_id) = patch.formation_id {
            self.formation_id = formation_id;
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub city: Option<String>,
    pub session: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub formation_id: Option<String>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl ProgressSummary {
    pub fn total(&self) -> usize {
        self.todo + self.in_progress + self.done
    }

    /// Whole-number share of finished modules
    pub fn percent_done(&self) -> u8 {
        match self.total() {
            0 => 0,
            total => ((self.done * 100) / total) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::formation::Module;

    #[test]
    fn empty_progress_reports_todo() {
        let group = Group::new("Lyon A", "f1");
        assert_eq!(group.status_of("m1"), ProgressStatus::Todo);
        assert_eq!(group.status_of("anything"), ProgressStatus::Todo);
    }

    #[test]
    fn any_status_overwrites_any_other() {
        let mut group = Group::new("Lyon A", "f1");
        group.set_status("m1", ProgressStatus::Done);
        group.set_status("m1", ProgressStatus::Todo);
        group.set_status("m2", ProgressStatus::InProgress);
        assert_eq!(group.status_of("m1"), ProgressStatus::Todo);
        assert_eq!(group.status_of("m2"), ProgressStatus::InProgress);
    }

    #[test]
    fn summary_ignores_stale_modules() {
        let mut formation = Formation::new("Rust");
        let first = Module::new("Ownership");
        let second = Module::new("Traits");
        let mut group = Group::new("Paris", formation.id.clone());
        group.set_status(first.id.clone(), ProgressStatus::Done);
        group.set_status("deleted-module", ProgressStatus::Done);
        formation.modules = vec![first, second];

        let summary = group.summary(&formation);
        assert_eq!(summary.done, 1);
        assert_eq!(summary.todo, 1);
        assert_eq!(summary.percent_done(), 50);
    }

    #[test]
    fn status_uses_screaming_case_on_disk() {
        let json = serde_json::to_string(&ProgressStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        assert_eq!(ProgressStatus::parse("in-progress"), Some(ProgressStatus::InProgress));
        assert_eq!(ProgressStatus::parse("DONE"), Some(ProgressStatus::Done));
        assert_eq!(ProgressStatus::parse("later"), None);
    }
}
