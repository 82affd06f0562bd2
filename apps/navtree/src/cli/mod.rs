//! # navtree CLI Module
//!
//! This module implements the CLI interface for navtree.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `tree` - Print the (filtered) menu tree
//! - `inspect` - Print the risk report
//! - `stats` - Show aggregate counts
//! - `audit` - Query the audit log
//! - `sync` - Create menus from a JSON definition file

mod commands;

use crate::config::{Backend, Config};
use clap::{Parser, Subcommand};
use navtree_core::MenuError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// navtree - navigation menu administration
///
/// Manages a console's menu hierarchy: ordering, permissions, risk
/// inspection and a full audit trail.
#[derive(Parser, Debug)]
#[command(name = "navtree")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./navtree.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the menu database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<Backend>,

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
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print the menu tree
    Tree {
        /// Case-insensitive match on name, code, path or permission key
        #[arg(short, long)]
        keyword: Option<String>,

        /// Menu type (directory, page, external, button)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Group id
        #[arg(short, long)]
        group: Option<String>,

        /// Only enabled (true) or disabled (false) menus
        #[arg(long)]
        enabled: Option<bool>,

        /// Only visible (true) or hidden (false) menus
        #[arg(long)]
        visible: Option<bool>,

        /// Permission binding (bound, unbound)
        #[arg(long)]
        permission_bind: Option<String>,
    },

    /// Print the risk report
    Inspect,

    /// Show aggregate counts
    Stats,

    /// Query the audit log
    Audit {
        /// Only records of this menu
        #[arg(short, long)]
        menu: Option<u64>,

        /// Operation (create, update, delete, move, reorder, ...)
        #[arg(short, long)]
        operation: Option<String>,

        /// Only records by this actor id
        #[arg(short, long)]
        actor: Option<String>,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Records per page (max 100)
        #[arg(long, default_value = "20")]
        page_size: usize,
    },

    /// Create missing menus from a JSON definition file
    Sync {
        /// Path to the definition file
        #[arg(short, long)]
        file: PathBuf,

        /// Actor id recorded on the audit trail
        #[arg(long)]
        actor_id: Option<String>,

        /// Actor name recorded on the audit trail
        #[arg(long)]
        actor_name: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve the effective configuration: file, environment, then flags.
pub fn resolve_config(cli: &Cli) -> Result<Config, MenuError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(Commands::Server { host, port }) = &cli.command {
        if let Some(host) = host {
            config.host = host.clone();
        }
        if let Some(port) = port {
            config.port = *port;
        }
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), MenuError> {
    let config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&config).await,
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Tree {
            keyword,
            kind,
            group,
            enabled,
            visible,
            permission_bind,
        }) => {
            let query = crate::api::TreeQuery {
                keyword,
                kind,
                group_id: group,
                enabled,
                visible,
                permission_bind,
            };
            cmd_tree(&config, json_mode, query)
        }
        Some(Commands::Inspect) => cmd_inspect(&config, json_mode),
        Some(Commands::Stats) => cmd_stats(&config, json_mode),
        Some(Commands::Audit {
            menu,
            operation,
            actor,
            page,
            page_size,
        }) => {
            let query = crate::api::AuditLogQuery {
                operation,
                actor_id: actor,
                start: None,
                end: None,
                page: Some(page),
                page_size: Some(page_size),
            };
            cmd_audit(&config, json_mode, menu, query)
        }
        Some(Commands::Sync {
            file,
            actor_id,
            actor_name,
        }) => cmd_sync(&config, json_mode, &file, actor_id, actor_name),
        None => {
            // No subcommand - show stats by default
            cmd_stats(&config, json_mode)
        }
    }
}
