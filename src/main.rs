//! coursedesk - course library and group progress tracker
//!
//! Command-line front end over the persistent store. Formations, their
//! modules and resources, plus the groups following them live in one JSON
//! document under a root directory that also holds the managed resource files.

use std::error::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursedesk::cli;

fn main() -> Result<(), Box<dyn Error>> {
    color_eyre::install()?;

    // stdout carries command output, logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursedesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    cli::execute_cli(&args)
}
