//! # relsync
//!
//! Command-line front end of the relation consistency engine.
//!
//! ## Usage
//!
//! ```bash
//! # Create an empty store
//! relsync --config site.toml init
//!
//! # Validate the site configuration
//! relsync --config site.toml check-config
//!
//! # Save entities through the lifecycle hooks
//! relsync --config site.toml load -f entities.json
//!
//! # Inspect relations of a node
//! relsync --config site.toml relations --id 2
//! ```

use clap::Parser;
use relsync::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // RELSYNC_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("RELSYNC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "relsync=info,relsync_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!("relsync v{} - relation consistency engine", env!("CARGO_PKG_VERSION"));
    println!();
}
