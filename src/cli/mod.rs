//! CLI Module for coursedesk
//! Every command opens the store at the resolved root directory, runs one
//! operation and shuts the store down so pending file cleanup completes.

pub mod commands;
pub mod tree;

use colored::{ColoredString, Colorize};
use std::error::Error;

use crate::config::Config;
use crate::models::StorageManager;
use crate::store::Store;

pub type CliStore = Store<StorageManager>;

/// Left margin used on every output line
pub(crate) fn bar() -> ColoredString {
    "┃".bright_magenta()
}

pub(crate) fn usage(message: &str, usage: &str) {
    println!("{}  Error: {}", bar(), message);
    println!("{}  Usage: coursedesk {}", bar(), usage);
}

/// Pulls `--root DIR` (or `--root=DIR`) out of the argument list
pub fn split_root_flag(args: &[String]) -> (Option<String>, Vec<String>) {
    let mut root = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--root" {
            root = iter.next().cloned();
        } else if let Some(value) = arg.strip_prefix("--root=") {
            root = Some(value.to_string());
        } else {
            rest.push(arg.clone());
        }
    }
    (root, rest)
}

fn open_store(root: Option<&str>) -> Result<CliStore, Box<dyn Error>> {
    let config = Config::load(root)?;
    let storage = StorageManager::new(&config)?;
    Ok(Store::open(storage)?)
}

/// Executes CLI commands based on the provided arguments
pub fn execute_cli(args: &[String]) -> Result<(), Box<dyn Error>> {
    let (root, args) = split_root_flag(args);

    let Some(command) = args.first() else {
        print_help();
        return Ok(());
    };
    if matches!(command.as_str(), "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let mut store = open_store(root.as_deref())?;
    let rest = &args[1..];

    let result = match command.as_str() {
        "list" | "ls" => match rest.first() {
            Some(query) => match commands::find_formation(&store, query) {
                Some(formation) => {
                    tree::display_formation(&store, formation);
                    Ok(())
                }
                None => {
                    println!("{}  No formation found with name: {}", bar(), query);
                    tree::list_formations(store.data());
                    Ok(())
                }
            },
            None => {
                tree::display_tree(&store);
                Ok(())
            }
        },
        "groups" => {
            tree::list_groups(store.data());
            Ok(())
        }
        "add-formation" => commands::add_formation(&mut store, rest),
        "add-module" => commands::add_module(&mut store, rest),
        "add-link" => commands::add_link(&mut store, rest),
        "add-file" => commands::add_file(&mut store, rest),
        "move-module" => commands::move_module(&mut store, rest),
        "move-resource" => commands::move_resource(&mut store, rest),
        "add-group" => commands::add_group(&mut store, rest),
        "progress" => commands::progress(&mut store, rest),
        "open" => commands::open(&store, rest),
        "root" => commands::root(&mut store, rest),
        "export" => commands::export(&store, rest),
        "import" => commands::import(&mut store, rest),
        "backup" => commands::backup(&store),
        _ => {
            println!("{}  Unknown command: {}", bar(), command);
            print_help();
            Ok(())
        }
    };

    store.shutdown();
    result
}

/// Prints the help message with available commands
fn print_help() {
    println!("{}  {}", bar(), "COURSEDESK - COURSE LIBRARY".bold());

    println!("{}  {}", bar(), "USAGE:".bright_yellow());
    println!("{}  coursedesk [--root DIR] [COMMAND] [ARGS]", bar());
    println!("{}  {}", bar(), "COMMANDS:".bright_yellow());

    let commands = [
        ("list, ls", "Show every formation with its modules and resources"),
        ("list <FORMATION>", "Show one formation"),
        ("groups", "List groups with their progress"),
        ("add-formation <TITLE> [DESC]", "Create a formation"),
        ("add-module <F> <TITLE>", "Append a module to a formation"),
        ("add-link <F> <M> <LABEL> <URL>", "Attach a link resource"),
        ("add-file <F> <M> <PATH> [CAT]", "Copy a file into the library"),
        ("move-module <F> <FROM> <TO>", "Reorder modules (1-based positions)"),
        ("move-resource <F> <M> <FROM> <TO>", "Reorder resources in a module"),
        ("add-group <NAME> <F> [CITY]", "Create a group following a formation"),
        ("progress <G> [<M> <STATUS>]", "Show or set module progress"),
        ("open <F> <M> <R>", "Open a resource with the default app"),
        ("root [DIR]", "Show or move the root directory"),
        ("export [FILE]", "Write a JSON backup (stdout by default)"),
        ("import <FILE>", "Replace everything with a JSON backup"),
        ("backup", "Copy the data file into backups/"),
        ("help", "Display this help message"),
    ];
    for (usage, description) in commands {
        println!("{}  {:<36} {}", bar(), usage.bright_white(), description);
    }

    println!("{}  {}", bar(), "TIP:".bright_green());
    println!(
        "{}  <F>, <M>, <R> and <G> accept an id, a name or a 1-based position",
        bar()
    );
    println!(
        "{}  Set RUST_LOG=coursedesk=debug for detailed logs on stderr",
        bar()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn root_flag_is_removed_wherever_it_appears() {
        let (root, rest) = split_root_flag(&args(&["list", "--root", "/data", "Rust"]));
        assert_eq!(root.as_deref(), Some("/data"));
        assert_eq!(rest, args(&["list", "Rust"]));

        let (root, rest) = split_root_flag(&args(&["--root=/other", "groups"]));
        assert_eq!(root.as_deref(), Some("/other"));
        assert_eq!(rest, args(&["groups"]));

        let (root, rest) = split_root_flag(&args(&["groups"]));
        assert!(root.is_none());
        assert_eq!(rest, args(&["groups"]));
    }
}
