use colored::Colorize;

use super::{CliStore, bar};
use crate::models::{AppData, Formation, Resource, ResourceKind};

/// Displays every formation in a tree-like structure
pub fn display_tree(store: &CliStore) {
    if store.formations().is_empty() {
        println!("{}  No formations found.", bar());
        return;
    }

    for formation in store.formations() {
        display_formation(store, formation);
    }
}

/// Prints one formation with its modules and their resources
pub fn display_formation(store: &CliStore, formation: &Formation) {
    let groups = store.data().active_groups_for(&formation.id).len();
    println!(
        "{}  {} {} {}",
        bar(),
        formation.icon.as_deref().unwrap_or("󰠮").bright_blue(),
        formation.titre.bold(),
        format!("({} groups)", groups).bright_black()
    );

    let count = formation.modules.len();
    for (idx, module) in formation.modules.iter().enumerate() {
        let is_last = idx == count - 1;
        let branch = if is_last { "└── " } else { "├── " };
        let guide = if is_last { "    " } else { "│   " };

        println!(
            "{}  {}{}. {}",
            bar(),
            branch.bright_black(),
            (idx + 1).to_string().yellow(),
            module.titre.bright_white()
        );

        let resources = module.resources.len();
        for (r_idx, resource) in module.resources.iter().enumerate() {
            let r_branch = if r_idx == resources - 1 {
                "└── "
            } else {
                "├── "
            };
            println!(
                "{}  {}{}{} {}",
                bar(),
                guide.bright_black(),
                r_branch.bright_black(),
                resource_label(resource),
                resource_location(store, resource).bright_black()
            );
        }
    }
}

fn resource_label(resource: &Resource) -> String {
    let format = resource
        .format
        .as_ref()
        .map(|f| f.as_str().to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{} [{}, {}]",
        resource.label,
        resource.category.label(),
        format
    )
}

fn resource_location(store: &CliStore, resource: &Resource) -> String {
    let location = match resource.kind {
        ResourceKind::File => store.resolve_resource_path(resource),
        _ => resource.url.clone(),
    };
    location.unwrap_or_default()
}

/// Numbered list of formations with their ids
pub fn list_formations(data: &AppData) {
    println!("{}  Available formations:", bar());
    println!("{}", "─".repeat(60).bright_magenta());

    for (idx, formation) in data.formations.iter().enumerate() {
        println!(
            "{}  {}. {} {}",
            bar(),
            (idx + 1).to_string().yellow(),
            formation.titre.bright_white(),
            formation.id.bright_black()
        );
    }
}

pub fn list_groups(data: &AppData) {
    if data.groups.is_empty() {
        println!("{}  No groups found.", bar());
        return;
    }

    for (idx, group) in data.groups.iter().enumerate() {
        let progress = data
            .formation(&group.formation_id)
            .map(|formation| format!("{}%", group.summary(formation).percent_done()))
            .unwrap_or_else(|| "-".to_string());
        let mut place = group.city.clone();
        if !group.session.is_empty() {
            place = format!("{} {}", place, group.session).trim().to_string();
        }

        println!(
            "{}  {}. {} {} {} {}{}",
            bar(),
            (idx + 1).to_string().yellow(),
            group.name.bold(),
            place.bright_black(),
            data.formation_title_for(group).bright_blue(),
            progress.bright_green(),
            if group.archived {
                " (archived)".bright_black().to_string()
            } else {
                String::new()
            }
        );
    }
}
