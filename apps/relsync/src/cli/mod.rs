//! # relsync CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new store
//! - `status` - Show store and schema status
//! - `check-config` - Validate the site configuration
//! - `import-config` - Validate and apply a proposed configuration
//! - `load` - Save entities from a JSON file through the lifecycle hooks
//! - `relations` - List relation records referencing a node
//! - `label` - Show the generated label of a relation record
//! - `delete` - Delete an entity and run its delete hooks
//! - `audit` - Report incomplete and self-referencing relation records
//! - `export` - Write a snapshot of the store

mod commands;

use clap::{Parser, Subcommand};
use relsync_core::{EntityType, RelsyncError};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// relsync - relation consistency engine
///
/// Keeps relation records, their labels and mirror terms consistent.
#[derive(Parser, Debug)]
#[command(name = "relsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the site configuration (TOML)
    #[arg(short = 'C', long, global = true, default_value = "relsync.toml")]
    pub config: PathBuf,

    /// Path to the entity store
    #[arg(short = 'D', long, global = true, default_value = "relsync.db")]
    pub database: PathBuf,

    /// Storage backend: "file" (snapshot file) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty store
    Init {
        /// Force initialization even if the store exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show store and schema status
    Status,

    /// Validate the site configuration
    CheckConfig,

    /// Validate a proposed configuration and make it the active one
    ImportConfig {
        /// Path to the proposed configuration (TOML)
        #[arg(short, long)]
        proposed: PathBuf,

        /// Only report, never replace the active configuration
        #[arg(long)]
        dry_run: bool,
    },

    /// Save entities from a JSON file through the lifecycle hooks
    Load {
        /// Path to the entity file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List relation records referencing a node
    Relations {
        /// Node ID
        #[arg(short, long)]
        id: u64,
    },

    /// Show the generated label of a relation record
    Label {
        /// Relation record ID
        #[arg(short, long)]
        id: u64,
    },

    /// Delete an entity and run its delete hooks
    Delete {
        /// Entity type (node, term)
        #[arg(short = 't', long, default_value = "node")]
        entity_type: EntityType,

        /// Entity ID
        #[arg(short, long)]
        id: u64,
    },

    /// Report incomplete and self-referencing relation records
    Audit,

    /// Export the store
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (snapshot, json)
        #[arg(short = 't', long, default_value = "snapshot")]
        format: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), RelsyncError> {
    let ctx = Context {
        config: cli.config,
        database: cli.database,
        backend: cli.backend,
        json_mode: cli.json_mode,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::CheckConfig) => cmd_check_config(&ctx),
        Some(Commands::ImportConfig { proposed, dry_run }) => {
            cmd_import_config(&ctx, &proposed, dry_run)
        }
        Some(Commands::Load { file }) => cmd_load(&ctx, &file),
        Some(Commands::Relations { id }) => cmd_relations(&ctx, id),
        Some(Commands::Label { id }) => cmd_label(&ctx, id),
        Some(Commands::Delete { entity_type, id }) => cmd_delete(&ctx, entity_type, id),
        Some(Commands::Audit) => cmd_audit(&ctx),
        Some(Commands::Export { output, format }) => cmd_export(&ctx, &output, &format),
    }
}
