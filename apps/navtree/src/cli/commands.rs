//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AuditLogQuery, TreeQuery};
use crate::config::{Backend, Config};
use navtree_core::{
    Actor, MenuEngine, MenuError, MenuId, RedbStore, TreeView, parse_definitions,
    sync_definitions,
};
use std::path::Path;

/// Maximum size of a definition file for `sync` (10 MB).
const MAX_SYNC_FILE_SIZE: u64 = 10 * 1024 * 1024;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the engine on the configured backend.
pub fn open_engine(config: &Config) -> Result<MenuEngine, MenuError> {
    match config.backend {
        Backend::Redb => Ok(MenuEngine::with_redb(RedbStore::open(&config.database)?)),
        Backend::Memory => {
            tracing::warn!("memory backend: menus are discarded on exit");
            Ok(MenuEngine::in_memory())
        }
    }
}

/// Open the engine for a one-shot command, which needs menus that outlive
/// the process.
fn open_stored_engine(config: &Config) -> Result<MenuEngine, MenuError> {
    if config.backend == Backend::Memory {
        return Err(MenuError::Validation(
            "the memory backend starts empty on every run; use --backend redb".to_string(),
        ));
    }
    open_engine(config)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), MenuError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MenuError::Serialization(e.to_string()))?;
    println!("{text}");
    Ok(())
}

/// Read a definition file after checking it is a regular file of sane size.
fn read_definition_file(path: &Path) -> Result<String, MenuError> {
    let canonical = path.canonicalize().map_err(|e| {
        MenuError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| MenuError::Io(format!("Cannot read file metadata: {}", e)))?;
    if !metadata.is_file() {
        return Err(MenuError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_SYNC_FILE_SIZE {
        return Err(MenuError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SYNC_FILE_SIZE
        )));
    }
    std::fs::read_to_string(&canonical)
        .map_err(|e| MenuError::Io(format!("Cannot read {}: {}", path.display(), e)))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), MenuError> {
    let engine = open_engine(config)?;

    println!("navtree server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.host);
    println!("  Port:     {}", config.port);
    println!("  Backend:  {}", config.backend.as_str());
    println!("  Database: {}", config.database.display());
    println!();
    println!("Endpoints ({}):", api::MENU_API_PREFIX);
    println!("  POST   /               - Create a menu");
    println!("  GET    /tree           - Menu tree");
    println!("  GET    /inspection     - Risk report");
    println!("  GET    /stats          - Counts");
    println!("  POST   /reorder        - Batch reorder");
    println!("  GET    /{{id}}           - Menu detail");
    println!("  PUT    /{{id}}           - Update");
    println!("  DELETE /{{id}}           - Delete");
    println!("  GET    /health         - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config, engine).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(config: &Config, force: bool) -> Result<(), MenuError> {
    if config.backend == Backend::Memory {
        println!("Memory backend needs no initialization");
        return Ok(());
    }

    let path = &config.database;
    if path.exists() {
        if !force {
            return Err(MenuError::Validation(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| MenuError::Io(format!("Cannot remove {}: {}", path.display(), e)))?;
    }

    RedbStore::open(path)?;
    println!("Initialized new redb database at {}", path.display());
    Ok(())
}

// =============================================================================
// TREE COMMAND
// =============================================================================

/// Print the filtered menu tree.
pub fn cmd_tree(config: &Config, json_mode: bool, query: TreeQuery) -> Result<(), MenuError> {
    let filter = query.into_filter()?;
    let engine = open_stored_engine(config)?;
    let forest = engine.get_tree(&filter)?;

    if json_mode {
        return print_json(&forest);
    }
    if forest.is_empty() {
        println!("No menus");
        return Ok(());
    }
    let mut out = String::new();
    for root in &forest {
        render_tree(root, 0, &mut out);
    }
    print!("{out}");
    Ok(())
}

/// Append one indented line per node.
fn render_tree(view: &TreeView, depth: usize, out: &mut String) {
    let node = &view.node;
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "[{}] {} ({}) #{} order={}",
        node.kind, node.name, node.code, node.id, node.order
    ));
    if let Some(path) = &node.path {
        out.push_str(&format!(" {path}"));
    }
    if !node.enabled {
        out.push_str(" [disabled]");
    }
    if !node.visible {
        out.push_str(" [hidden]");
    }
    for flag in &view.risk_flags {
        out.push_str(&format!(" !{}", flag.as_str()));
    }
    out.push('\n');
    for child in &view.children {
        render_tree(child, depth + 1, out);
    }
}

// =============================================================================
// INSPECT / STATS COMMANDS
// =============================================================================

/// Print the risk report.
pub fn cmd_inspect(config: &Config, json_mode: bool) -> Result<(), MenuError> {
    let engine = open_stored_engine(config)?;
    let risks = engine.inspect()?;

    if json_mode {
        return print_json(&risks);
    }
    if risks.is_empty() {
        println!("No risks found");
        return Ok(());
    }
    println!("{} risk(s):", risks.len());
    for item in &risks {
        println!(
            "  {:<20} #{} {} ({}): {}",
            item.risk_type.as_str(),
            item.menu_id,
            item.menu_name,
            item.menu_code,
            item.description
        );
    }
    Ok(())
}

/// Show aggregate counts.
pub fn cmd_stats(config: &Config, json_mode: bool) -> Result<(), MenuError> {
    let engine = open_stored_engine(config)?;
    let stats = engine.stats()?;

    if json_mode {
        return print_json(&stats);
    }
    println!("Menu Statistics");
    println!("===============");
    println!("Database:           {}", config.database.display());
    println!("Total:              {}", stats.total);
    println!("Enabled:            {}", stats.enabled);
    println!("Hidden:             {}", stats.hidden);
    println!("Unbound permission: {}", stats.unbound_permission);
    Ok(())
}

// =============================================================================
// AUDIT COMMAND
// =============================================================================

/// Query the audit log.
pub fn cmd_audit(
    config: &Config,
    json_mode: bool,
    menu: Option<u64>,
    query: AuditLogQuery,
) -> Result<(), MenuError> {
    let query = query.into_query(menu.map(MenuId))?;
    let engine = open_stored_engine(config)?;
    let page = engine.audit_log(&query)?;

    if json_mode {
        return print_json(&page);
    }
    println!(
        "Audit log: {} record(s), page {} (size {})",
        page.total, page.page, page.page_size
    );
    for record in &page.records {
        let actor = record
            .actor_name
            .as_deref()
            .or(record.actor_id.as_deref())
            .unwrap_or("system");
        println!(
            "  {} #{} {:<16} menu={} by {} [{}]{}",
            record.created_at.to_rfc3339(),
            record.id.0,
            record.operation.as_str(),
            record.menu_id,
            actor,
            record.changed_fields.join(","),
            record
                .remark
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

// =============================================================================
// SYNC COMMAND
// =============================================================================

/// Create missing menus from a JSON definition file.
pub fn cmd_sync(
    config: &Config,
    json_mode: bool,
    file: &Path,
    actor_id: Option<String>,
    actor_name: Option<String>,
) -> Result<(), MenuError> {
    let text = read_definition_file(file)?;
    let defs = parse_definitions(&text)?;
    let actor = match actor_id {
        Some(id) => Actor::user(id, actor_name),
        None => Actor::system(),
    };

    let mut engine = open_stored_engine(config)?;
    let report = sync_definitions(&mut engine, &defs, &actor)?;

    if json_mode {
        return print_json(&report);
    }
    println!("Created: {}", report.created.len());
    for code in &report.created {
        println!("  + {code}");
    }
    println!("Skipped: {}", report.skipped.len());
    println!("Failed:  {}", report.failed.len());
    for failure in &report.failed {
        println!("  ! {} [{}] {}", failure.code, failure.error_code, failure.message);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use navtree_core::{CreateMenu, MenuFilter, MenuKind};

    fn redb_config(dir: &Path) -> Config {
        Config {
            database: dir.join("menus.redb"),
            ..Config::default()
        }
    }

    #[test]
    fn init_refuses_existing_database_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = redb_config(dir.path());

        cmd_init(&config, false).expect("first init");
        assert!(cmd_init(&config, false).is_err());
        cmd_init(&config, true).expect("forced init");
    }

    #[test]
    fn sync_file_persists_into_redb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = redb_config(dir.path());
        let defs = dir.path().join("menus.json");
        std::fs::write(
            &defs,
            r#"[{ "name": "Ops", "code": "ops", "children": [{ "name": "Jobs", "code": "jobs" }] }]"#,
        )
        .expect("write defs");

        cmd_sync(&config, true, &defs, Some("ci".to_string()), None).expect("sync");

        let engine = open_engine(&config).expect("open");
        let forest = engine.get_tree(&MenuFilter::default()).expect("tree");
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].node.path.as_deref(), Some("/ops/jobs"));
    }

    #[test]
    fn one_shot_commands_refuse_memory_backend() {
        let config = Config {
            backend: Backend::Memory,
            ..Config::default()
        };
        assert!(matches!(cmd_stats(&config, true), Err(MenuError::Validation(_))));
        assert!(matches!(
            cmd_tree(&config, true, TreeQuery::default()),
            Err(MenuError::Validation(_))
        ));
        cmd_init(&config, false).expect("memory init is a no-op");
    }

    #[test]
    fn render_tree_indents_children_and_marks_state() {
        let mut engine = MenuEngine::in_memory();
        let root = engine
            .create_menu(
                CreateMenu::new("Root", "root", MenuKind::Directory),
                &Actor::system(),
            )
            .expect("root");
        let child = engine
            .create_menu(
                CreateMenu::new("Leaf", "leaf", MenuKind::Page)
                    .under(root.id)
                    .with_path("/leaf"),
                &Actor::system(),
            )
            .expect("leaf");
        engine
            .toggle_visible(child.id, false, &Actor::system())
            .expect("hide");

        let forest = engine.get_tree(&MenuFilter::default()).expect("tree");
        let mut out = String::new();
        render_tree(&forest[0], 0, &mut out);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[directory] Root (root)"));
        assert!(lines[1].starts_with("  [page] Leaf (leaf)"));
        assert!(lines[1].contains("/leaf"));
        assert!(lines[1].contains("[hidden]"));
        assert!(lines[1].contains("!UNBOUND_PERMISSION"));
    }
}
