use colored::Colorize;
use std::error::Error;
use std::path::Path;

use super::{CliStore, bar, usage};
use crate::bridge::HostBridge;
use crate::models::{
    ExportOptions, Formation, Group, Module, ProgressStatus, Resource, ResourceCategory,
    ResourceInput, SettingsPatch,
};

type CliResult = Result<(), Box<dyn Error>>;

/// Finds an item by id, 1-based position, exact name, then partial name
fn pick<'a, T>(
    items: &'a [T],
    query: &str,
    id: impl Fn(&T) -> &str,
    name: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    if let Some(item) = items.iter().find(|item| id(item) == query) {
        return Some(item);
    }
    if let Some(index) = parse_position(query) {
        if let Some(item) = items.get(index) {
            return Some(item);
        }
    }

    let query = query.to_lowercase();
    items
        .iter()
        .find(|item| name(item).to_lowercase() == query)
        .or_else(|| {
            items
                .iter()
                .find(|item| name(item).to_lowercase().contains(&query))
        })
}

/// 1-based position typed by the user, as an index
fn parse_position(value: &str) -> Option<usize> {
    value.parse::<usize>().ok()?.checked_sub(1)
}

pub fn find_formation<'a>(store: &'a CliStore, query: &str) -> Option<&'a Formation> {
    pick(store.formations(), query, |f| f.id.as_str(), |f| f.titre.as_str())
}

fn find_module<'a>(formation: &'a Formation, query: &str) -> Option<&'a Module> {
    pick(&formation.modules, query, |m| m.id.as_str(), |m| m.titre.as_str())
}

fn find_resource<'a>(module: &'a Module, query: &str) -> Option<&'a Resource> {
    pick(&module.resources, query, |r| r.id.as_str(), |r| r.label.as_str())
}

fn find_group<'a>(store: &'a CliStore, query: &str) -> Option<&'a Group> {
    pick(store.groups(), query, |g| g.id.as_str(), |g| g.name.as_str())
}

fn formation_id(store: &CliStore, query: &str) -> Option<String> {
    let found = find_formation(store, query).map(|f| f.id.clone());
    if found.is_none() {
        println!("{}  No formation found with name: {}", bar(), query);
    }
    found
}

/// Formation and module ids for a pair of user queries
fn module_ids(store: &CliStore, formation: &str, module: &str) -> Option<(String, String)> {
    let f = find_formation(store, formation);
    let Some(f) = f else {
        println!("{}  No formation found with name: {}", bar(), formation);
        return None;
    };
    match find_module(f, module) {
        Some(m) => Some((f.id.clone(), m.id.clone())),
        None => {
            println!(
                "{}  No module {} in formation {}",
                bar(),
                module,
                f.titre.bold()
            );
            None
        }
    }
}

fn parse_category(value: &str) -> Option<ResourceCategory> {
    match value.to_lowercase().as_str() {
        "main" => Some(ResourceCategory::Main),
        "pdfs" | "pdf" => Some(ResourceCategory::Pdfs),
        "videos" | "video" => Some(ResourceCategory::Videos),
        "extras" | "extra" => Some(ResourceCategory::Extras),
        _ => None,
    }
}

fn category_arg(value: Option<&String>) -> Result<ResourceCategory, Box<dyn Error>> {
    match value {
        None => Ok(ResourceCategory::default()),
        Some(value) => parse_category(value)
            .ok_or_else(|| format!("Unknown category: {} (main, pdfs, videos, extras)", value).into()),
    }
}

pub fn add_formation(store: &mut CliStore, args: &[String]) -> CliResult {
    let Some(title) = args.first() else {
        usage("Missing formation title", "add-formation <TITLE> [DESCRIPTION]");
        return Ok(());
    };
    let mut formation = Formation::new(title.as_str());
    if let Some(description) = args.get(1) {
        formation = formation.with_description(description.as_str());
    }

    let id = store.add_formation(formation)?;
    println!(
        "{}  {} {} {}",
        bar(),
        "Formation created:".bright_green(),
        title.bold(),
        format!("({})", id).bright_black()
    );
    Ok(())
}

pub fn add_module(store: &mut CliStore, args: &[String]) -> CliResult {
    let [formation, title, rest @ ..] = args else {
        usage("Missing arguments", "add-module <FORMATION> <TITLE> [DESCRIPTION]");
        return Ok(());
    };
    let Some(formation_id) = formation_id(store, formation) else {
        return Ok(());
    };

    let mut module = Module::new(title.as_str());
    module.description = rest.first().cloned();

    if let Some(id) = store.add_module(&formation_id, module)? {
        println!(
            "{}  {} {} {}",
            bar(),
            "Module added:".bright_green(),
            title.bold(),
            format!("({})", id).bright_black()
        );
    }
    Ok(())
}

pub fn add_link(store: &mut CliStore, args: &[String]) -> CliResult {
    let [formation, module, label, url, rest @ ..] = args else {
        usage(
            "Missing arguments",
            "add-link <FORMATION> <MODULE> <LABEL> <URL> [CATEGORY]",
        );
        return Ok(());
    };
    let category = category_arg(rest.first())?;
    let Some((formation_id, module_id)) = module_ids(store, formation, module) else {
        return Ok(());
    };

    let input = ResourceInput::link(label.as_str(), url.as_str()).with_category(category);
    if let Some(id) = store.add_resource(&formation_id, &module_id, input)? {
        println!(
            "{}  {} {} {}",
            bar(),
            "Link added:".bright_green(),
            label.bold(),
            format!("({})", id).bright_black()
        );
    }
    Ok(())
}

pub fn add_file(store: &mut CliStore, args: &[String]) -> CliResult {
    let [formation, module, path, rest @ ..] = args else {
        usage(
            "Missing arguments",
            "add-file <FORMATION> <MODULE> <PATH> [CATEGORY]",
        );
        return Ok(());
    };
    let category = category_arg(rest.first())?;
    let source = Path::new(path);
    if !source.is_file() {
        println!("{}  Not a file: {}", bar(), path);
        return Ok(());
    }
    let Some((formation_id, module_id)) = module_ids(store, formation, module) else {
        return Ok(());
    };

    if let Some(id) = store.import_resource(&formation_id, &module_id, source, None, category)? {
        println!(
            "{}  {} {} {}",
            bar(),
            "File imported:".bright_green(),
            path.bold(),
            format!("({})", id).bright_black()
        );
    }
    Ok(())
}

fn positions(from: &str, to: &str) -> Option<(usize, usize)> {
    let positions = parse_position(from).zip(parse_position(to));
    if positions.is_none() {
        println!("{}  Positions start at 1: {} {}", bar(), from, to);
    }
    positions
}

pub fn move_module(store: &mut CliStore, args: &[String]) -> CliResult {
    let [formation, from, to, ..] = args else {
        usage("Missing arguments", "move-module <FORMATION> <FROM> <TO>");
        return Ok(());
    };
    let Some((from, to)) = positions(from, to) else {
        return Ok(());
    };
    let Some(formation_id) = formation_id(store, formation) else {
        return Ok(());
    };

    if store.reorder_modules(&formation_id, from, to)? {
        println!("{}  {}", bar(), "Module moved".bright_green());
    } else {
        println!("{}  Nothing to move", bar());
    }
    Ok(())
}

pub fn move_resource(store: &mut CliStore, args: &[String]) -> CliResult {
    let [formation, module, from, to, ..] = args else {
        usage(
            "Missing arguments",
            "move-resource <FORMATION> <MODULE> <FROM> <TO>",
        );
        return Ok(());
    };
    let Some((from, to)) = positions(from, to) else {
        return Ok(());
    };
    let Some((formation_id, module_id)) = module_ids(store, formation, module) else {
        return Ok(());
    };

    if store.reorder_resources(&formation_id, &module_id, from, to)? {
        println!("{}  {}", bar(), "Resource moved".bright_green());
    } else {
        println!("{}  Nothing to move", bar());
    }
    Ok(())
}

pub fn add_group(store: &mut CliStore, args: &[String]) -> CliResult {
    let [name, formation, rest @ ..] = args else {
        usage(
            "Missing arguments",
            "add-group <NAME> <FORMATION> [CITY] [SESSION]",
        );
        return Ok(());
    };
    let Some(formation_id) = formation_id(store, formation) else {
        return Ok(());
    };

    let mut group = Group::new(name.as_str(), formation_id);
    if let Some(city) = rest.first() {
        group.city = city.clone();
    }
    if let Some(session) = rest.get(1) {
        group.session = session.clone();
    }

    let id = store.add_group(group)?;
    println!(
        "{}  {} {} {}",
        bar(),
        "Group created:".bright_green(),
        name.bold(),
        format!("({})", id).bright_black()
    );
    Ok(())
}

fn status_label(status: ProgressStatus) -> colored::ColoredString {
    match status {
        ProgressStatus::Todo => status.label().bright_black(),
        ProgressStatus::InProgress => status.label().bright_yellow(),
        ProgressStatus::Done => status.label().bright_green(),
    }
}

pub fn progress(store: &mut CliStore, args: &[String]) -> CliResult {
    let Some(query) = args.first() else {
        usage("Missing group", "progress <GROUP> [<MODULE> <STATUS>]");
        return Ok(());
    };
    let Some(group) = find_group(store, query) else {
        println!("{}  No group found with name: {}", bar(), query);
        return Ok(());
    };
    let group_id = group.id.clone();
    let formation = store.formation(&group.formation_id);

    let [_, module, status, ..] = args else {
        println!(
            "{}  {} {}",
            bar(),
            "GROUP".bright_green().bold(),
            group.name.bold()
        );
        println!("{}", "─".repeat(60).bright_magenta());
        let Some(formation) = formation else {
            println!(
                "{}  Formation {} no longer exists",
                bar(),
                group.formation_id.bright_black()
            );
            return Ok(());
        };
        for (idx, module) in formation.modules.iter().enumerate() {
            println!(
                "{}  {}. {:<40} {}",
                bar(),
                (idx + 1).to_string().yellow(),
                module.titre,
                status_label(store.progress_status(&group_id, &module.id))
            );
        }
        let summary = group.summary(formation);
        println!("{}", "─".repeat(60).bright_magenta());
        println!(
            "{}  {}% done ({} of {} modules)",
            bar(),
            summary.percent_done(),
            summary.done,
            summary.total()
        );
        return Ok(());
    };

    let Some(status) = ProgressStatus::parse(status) else {
        println!(
            "{}  Unknown status: {} (todo, in-progress, done)",
            bar(),
            status
        );
        return Ok(());
    };
    let Some(module_id) = formation
        .and_then(|f| find_module(f, module))
        .map(|m| m.id.clone())
    else {
        println!("{}  No module {} in the group's formation", bar(), module);
        return Ok(());
    };

    store.update_group_progress(&group_id, &module_id, status)?;
    println!(
        "{}  {} {}",
        bar(),
        "Progress updated:".bright_green(),
        status_label(status)
    );
    Ok(())
}

pub fn open(store: &CliStore, args: &[String]) -> CliResult {
    let [formation, module, resource, ..] = args else {
        usage("Missing arguments", "open <FORMATION> <MODULE> <RESOURCE>");
        return Ok(());
    };
    let Some((formation_id, module_id)) = module_ids(store, formation, module) else {
        return Ok(());
    };
    let resource_id = store
        .formation(&formation_id)
        .and_then(|f| f.module(&module_id))
        .and_then(|m| find_resource(m, resource))
        .map(|r| r.id.clone());
    let Some(resource_id) = resource_id else {
        println!("{}  No resource found with name: {}", bar(), resource);
        return Ok(());
    };

    match store.open_resource(&formation_id, &module_id, &resource_id) {
        Some(target) => println!("{}  Opening {}", bar(), target.bright_white()),
        None => println!("{}  Resource has nothing to open", bar()),
    }
    Ok(())
}

pub fn root(store: &mut CliStore, args: &[String]) -> CliResult {
    let Some(dir) = args.first() else {
        println!(
            "{}  {}: {}",
            bar(),
            "Root".bright_blue(),
            store.settings().root_directory
        );
        println!(
            "{}  {}: {}",
            bar(),
            "Resources".bright_blue(),
            store.bridge().resources_dir().display()
        );
        return Ok(());
    };

    let dir = std::path::absolute(dir)?;
    store.update_settings(SettingsPatch::root(dir.display().to_string()))?;
    println!(
        "{}  {} {}",
        bar(),
        "Root directory now".bright_green(),
        store.settings().root_directory.bold()
    );
    println!(
        "{}  {} formations, {} resources, {} groups",
        bar(),
        store.formations().len(),
        store.data().resource_count(),
        store.groups().len()
    );
    Ok(())
}

pub fn export(store: &CliStore, args: &[String]) -> CliResult {
    match args.first() {
        Some(path) => {
            store.export_to_file(Path::new(path), &ExportOptions::default())?;
            println!(
                "{}  {} {}",
                bar(),
                "Exported to".bright_green(),
                path.bold()
            );
        }
        None => println!("{}", store.export_data()?),
    }
    Ok(())
}

pub fn import(store: &mut CliStore, args: &[String]) -> CliResult {
    let Some(path) = args.first() else {
        usage("Missing backup file", "import <FILE>");
        return Ok(());
    };
    store.import_from_file(Path::new(path))?;
    println!(
        "{}  {} {} formations, {} groups",
        bar(),
        "Imported".bright_green(),
        store.formations().len(),
        store.groups().len()
    );
    Ok(())
}

pub fn backup(store: &CliStore) -> CliResult {
    let path = store.bridge().backup_database()?;
    println!(
        "{}  {} {}",
        bar(),
        "Backup written to".bright_green(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_one_based() {
        assert_eq!(parse_position("1"), Some(0));
        assert_eq!(parse_position("3"), Some(2));
        assert_eq!(parse_position("0"), None);
        assert_eq!(parse_position("x"), None);
    }

    #[test]
    fn picks_by_id_position_then_name() {
        fn by_id(f: &Formation) -> &str {
            &f.id
        }
        fn by_name(f: &Formation) -> &str {
            &f.titre
        }
        let formations = vec![Formation::new("Rust avancé"), Formation::new("Go")];

        let id = formations[1].id.clone();
        assert_eq!(pick(&formations, &id, by_id, by_name).unwrap().titre, "Go");
        assert_eq!(pick(&formations, "1", by_id, by_name).unwrap().titre, "Rust avancé");
        assert_eq!(pick(&formations, "go", by_id, by_name).unwrap().titre, "Go");
        assert_eq!(pick(&formations, "avan", by_id, by_name).unwrap().titre, "Rust avancé");
        assert!(pick(&formations, "python", by_id, by_name).is_none());
    }

    #[test]
    fn categories_accept_singular_forms() {
        assert_eq!(parse_category("PDF"), Some(ResourceCategory::Pdfs));
        assert_eq!(parse_category("videos"), Some(ResourceCategory::Videos));
        assert_eq!(parse_category("slides"), None);
    }
}
