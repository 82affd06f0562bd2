//! # navtree - Menu Administration Server
//!
//! The main binary for the navtree menu hierarchy engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for tree, inspection, audit and sync operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              apps/navtree (THE BINARY)           │
//! │                                                  │
//! │   ┌─────────────┐            ┌─────────────┐     │
//! │   │    CLI      │            │  HTTP API   │     │
//! │   │   (clap)    │            │   (axum)    │     │
//! │   └──────┬──────┘            └──────┬──────┘     │
//! │          └─────────────┬────────────┘            │
//! │                        ▼                         │
//! │                ┌───────────────┐                 │
//! │                │ navtree-core  │                 │
//! │                │ (THE ENGINE)  │                 │
//! │                └───────────────┘                 │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! navtree server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! navtree tree --type page
//! navtree inspect
//! navtree sync -f menus.json
//! ```

use clap::Parser;
use navtree::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // NAVTREE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NAVTREE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "navtree=info,navtree_core=info,tower_http=debug".into());

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

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(code = e.code(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the navtree startup banner.
fn print_banner() {
    println!(
        r#"
  navtree v{}
  menu hierarchy administration
"#,
        env!("CARGO_PKG_VERSION")
    );
}
