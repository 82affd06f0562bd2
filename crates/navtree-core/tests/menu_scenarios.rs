//! # Menu Engine Scenarios
//!
//! End-to-end behavior of the engine over the in-memory and redb stores.
//!
//! ## Groups
//! - Hierarchy: cycle rejection, cascade delete, order resolution
//! - Read side: risk inspection, filtered trees, round-trips
//! - Audit: idempotent toggles, swallowed audit failures
//! - Persistence: the same flows on redb

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::Utc;
use navtree_core::{
    Actor, AuditLog, AuditOperation, AuditPage, AuditQuery, AuditRecord, CreateMenu, MemoryAuditLog,
    MemoryStore, MenuEngine, MenuError, MenuFilter, MenuId, MenuKind, MenuNode, MenuRepository,
    MenuWrite, NewAuditRecord, RiskType,
};

fn actor() -> Actor {
    Actor::user("u-1", Some("Operator".to_string()))
}

fn dir(engine: &mut MenuEngine, code: &str, parent: Option<MenuId>) -> MenuNode {
    let mut req = CreateMenu::new(code.to_uppercase(), code, MenuKind::Directory);
    req.parent_id = parent;
    engine.create_menu(req, &actor()).expect("create directory")
}

fn page(engine: &mut MenuEngine, code: &str, parent: Option<MenuId>) -> MenuNode {
    let mut req = CreateMenu::new(code.to_uppercase(), code, MenuKind::Page)
        .with_path(format!("/{code}"));
    req.parent_id = parent;
    engine.create_menu(req, &actor()).expect("create page")
}

/// A raw row, inserted behind the engine's back.
fn raw(id: u64, code: &str, path: Option<&str>, permission_key: Option<&str>) -> MenuNode {
    let now = Utc::now();
    MenuNode {
        id: MenuId(id),
        name: code.to_uppercase(),
        code: code.to_string(),
        kind: MenuKind::Page,
        group_id: None,
        parent_id: None,
        path: path.map(str::to_string),
        route_name: None,
        component_key: None,
        external_url: None,
        open_mode: None,
        permission_key: permission_key.map(str::to_string),
        icon: None,
        visible: true,
        enabled: true,
        show_in_nav: true,
        cacheable: false,
        order: id as i64,
        created_at: now,
        created_by: None,
        updated_at: now,
        updated_by: None,
        deleted_at: None,
    }
}

fn records(engine: &MenuEngine, menu: MenuId) -> Vec<AuditRecord> {
    engine
        .audit_log(&AuditQuery::for_menu(menu))
        .expect("audit log")
        .records
}

// =============================================================================
// HIERARCHY
// =============================================================================

mod hierarchy {
    use super::*;

    #[test]
    fn moving_root_under_grandchild_is_rejected() {
        let mut engine = MenuEngine::in_memory();
        let r = dir(&mut engine, "r", None);
        let c1 = dir(&mut engine, "c1", Some(r.id));
        let c2 = dir(&mut engine, "c2", Some(c1.id));

        let result = engine.move_menu(r.id, Some(c2.id), 1, &actor());
        assert!(matches!(result, Err(MenuError::CycleDetected { .. })));

        let r_after = engine.repository().find(r.id).expect("find").expect("r");
        assert_eq!(r_after, r);
        let forest = engine.get_tree(&MenuFilter::default()).expect("tree");
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].size(), 3);
    }

    #[test]
    fn delete_with_children_requires_cascade() {
        let mut engine = MenuEngine::in_memory();
        let r = dir(&mut engine, "r", None);
        let c1 = dir(&mut engine, "c1", Some(r.id));
        let g1 = page(&mut engine, "g1", Some(c1.id));

        let refused = engine.delete_menu(c1.id, false, &actor());
        assert!(matches!(refused, Err(MenuError::HasChildren(1))));
        assert!(engine.repository().find(c1.id).expect("find").is_some());

        let impact = engine.delete_menu(c1.id, true, &actor()).expect("cascade");
        assert_eq!(impact.children_count, 1);
        assert_eq!(impact.deleted_count, 2);
        assert!(engine.repository().find(c1.id).expect("find").is_none());
        assert!(engine.repository().find(g1.id).expect("find").is_none());
        assert!(engine.repository().find(r.id).expect("find").is_some());

        let deletes = engine
            .audit_log(&AuditQuery {
                operation: Some(AuditOperation::Delete),
                ..AuditQuery::default()
            })
            .expect("audit");
        assert_eq!(deletes.total, 2);
        // Newest first: the requested node is written after its descendants.
        let ids: Vec<MenuId> = deletes.records.iter().map(|r| r.menu_id).collect();
        assert_eq!(ids, vec![c1.id, g1.id]);
        assert!(deletes.records[0].id > deletes.records[1].id);
        assert_eq!(deletes.records[1].remark.as_deref(), Some("cascade"));
        assert!(deletes.records[0].remark.is_none());
        assert!(deletes.records[0].before.is_some());
    }

    #[test]
    fn move_into_taken_order_lands_after_last_sibling() {
        let mut engine = MenuEngine::in_memory();
        let p = dir(&mut engine, "p", None);
        let a = engine
            .create_menu(
                CreateMenu::new("A", "a", MenuKind::Directory)
                    .under(p.id)
                    .with_order(0),
                &actor(),
            )
            .expect("a");
        let b = engine
            .create_menu(
                CreateMenu::new("B", "b", MenuKind::Directory)
                    .under(p.id)
                    .with_order(1),
                &actor(),
            )
            .expect("b");
        let c = dir(&mut engine, "c", None);

        let moved = engine.move_menu(c.id, Some(p.id), 1, &actor()).expect("move");
        assert_eq!(moved.parent_id, Some(p.id));
        assert_eq!(moved.order, 2);

        let repo = engine.repository();
        assert_eq!(repo.find(a.id).expect("find").expect("a").order, 0);
        assert_eq!(repo.find(b.id).expect("find").expect("b").order, 1);
    }
}

// =============================================================================
// READ SIDE
// =============================================================================

mod read_side {
    use super::*;

    #[test]
    fn inspection_flags_unbound_and_duplicate_paths() {
        let mut store = MemoryStore::new();
        store
            .commit(vec![
                MenuWrite::Insert(raw(1, "x", Some("/x"), Some(""))),
                MenuWrite::Insert(raw(2, "y", Some("/dup"), Some("menu:y"))),
                MenuWrite::Insert(raw(3, "z", Some("/dup"), Some("menu:z"))),
            ])
            .expect("seed");
        let engine = MenuEngine::new(Box::new(store), Box::new(MemoryAuditLog::new()));

        let report = engine.inspect().expect("inspect");
        let flagged: Vec<(MenuId, RiskType)> =
            report.iter().map(|i| (i.menu_id, i.risk_type)).collect();
        assert_eq!(
            flagged,
            vec![
                (MenuId(1), RiskType::UnboundPermission),
                (MenuId(2), RiskType::RouteConflict),
                (MenuId(3), RiskType::RouteConflict),
            ]
        );

        let y = engine.get_menu(MenuId(2)).expect("y");
        assert_eq!(y.view.risk_flags, vec![RiskType::RouteConflict]);
    }

    #[test]
    fn filtered_tree_counts_only_returned_children() {
        let mut engine = MenuEngine::in_memory();
        let d = dir(&mut engine, "d", None);
        let p1 = page(&mut engine, "p1", Some(d.id));
        let p2 = page(&mut engine, "p2", Some(p1.id));
        engine
            .create_menu(
                CreateMenu::new("Export", "export_btn", MenuKind::Button).under(p1.id),
                &actor(),
            )
            .expect("button");

        let filter = MenuFilter {
            kind: Some(MenuKind::Page),
            ..MenuFilter::default()
        };
        let forest = engine.get_tree(&filter).expect("tree");

        assert_eq!(forest.len(), 1);
        let top = &forest[0];
        assert_eq!(top.node.id, p1.id);
        assert_eq!(top.children_count, 1);
        assert_eq!(top.children[0].node.id, p2.id);
        assert_eq!(top.children[0].children_count, 0);

        assert_eq!(engine.get_menu(p1.id).expect("p1").view.children_count, 2);
    }

    #[test]
    fn created_optionals_round_trip() {
        let mut engine = MenuEngine::in_memory();
        let mut req = CreateMenu::new("Reports", "reports", MenuKind::Page).with_path("/reports");
        req.route_name = Some("ReportsHome".to_string());
        req.component_key = Some("reports/index".to_string());
        req.icon = Some("chart".to_string());
        req.group_id = Some(String::new());
        let created = engine.create_menu(req, &actor()).expect("create");

        let detail = engine.get_menu(created.id).expect("get");
        let node = &detail.view.node;
        assert_eq!(node.route_name.as_deref(), Some("ReportsHome"));
        assert_eq!(node.component_key.as_deref(), Some("reports/index"));
        assert_eq!(node.icon.as_deref(), Some("chart"));
        assert_eq!(node.group_id.as_deref(), Some(""));
        assert!(node.external_url.is_none());
        assert!(node.open_mode.is_none());
        assert!(node.permission_key.is_none());
        assert_eq!(node.created_by.as_deref(), Some("u-1"));

        let summary = detail.last_audit.expect("summary");
        assert_eq!(summary.operation, AuditOperation::Create);
        assert_eq!(summary.actor_name.as_deref(), Some("Operator"));
    }
}

// =============================================================================
// AUDIT
// =============================================================================

mod audit_trail {
    use super::*;

    #[test]
    fn toggling_to_current_state_is_silent() {
        let mut engine = MenuEngine::in_memory();
        let m = page(&mut engine, "m", None);

        let same = engine.toggle_enabled(m.id, true, &actor()).expect("toggle");
        assert_eq!(same, m);
        assert_eq!(records(&engine, m.id).len(), 1);

        let off = engine.toggle_enabled(m.id, false, &actor()).expect("toggle");
        assert!(!off.enabled);
        let trail = records(&engine, m.id);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].operation, AuditOperation::Disable);
        assert_eq!(trail[0].changed_fields, vec!["enabled"]);
    }

    /// Rejects every append.
    struct BrokenLog;

    impl AuditLog for BrokenLog {
        fn append(&mut self, _record: NewAuditRecord) -> Result<AuditRecord, MenuError> {
            Err(MenuError::Storage("audit table unavailable".to_string()))
        }

        fn query(&self, query: &AuditQuery) -> Result<AuditPage, MenuError> {
            Ok(query.paginate(Vec::new()))
        }
    }

    #[test]
    fn audit_failure_does_not_fail_the_write() {
        let mut engine = MenuEngine::new(Box::new(MemoryStore::new()), Box::new(BrokenLog));
        let m = page(&mut engine, "m", None);

        let hidden = engine.toggle_visible(m.id, false, &actor()).expect("toggle");
        assert!(!hidden.visible);
        let stored = engine.repository().find(m.id).expect("find").expect("m");
        assert!(!stored.visible);
        assert!(engine.get_menu(m.id).expect("get").last_audit.is_none());
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

mod persistence {
    use super::*;
    use navtree_core::RedbStore;

    #[test]
    fn redb_engine_survives_reopen() {
        let dir_handle = tempfile::tempdir().expect("tempdir");
        let path = dir_handle.path().join("menus.redb");

        let (root, child) = {
            let mut engine = MenuEngine::with_redb(RedbStore::open(&path).expect("open"));
            let root = dir(&mut engine, "root", None);
            let child = page(&mut engine, "child", Some(root.id));
            engine.toggle_visible(child.id, false, &actor()).expect("hide");
            (root, child)
        };

        let engine = MenuEngine::with_redb(RedbStore::open(&path).expect("reopen"));
        let forest = engine.get_tree(&MenuFilter::default()).expect("tree");
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].node.id, root.id);
        assert_eq!(forest[0].children[0].node.id, child.id);
        assert!(!forest[0].children[0].node.visible);

        let trail = records(&engine, child.id);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].operation, AuditOperation::Hide);
    }

    #[test]
    fn redb_ids_continue_after_reopen() {
        let dir_handle = tempfile::tempdir().expect("tempdir");
        let path = dir_handle.path().join("menus.redb");

        let first = {
            let mut engine = MenuEngine::with_redb(RedbStore::open(&path).expect("open"));
            dir(&mut engine, "first", None)
        };
        let mut engine = MenuEngine::with_redb(RedbStore::open(&path).expect("reopen"));
        let second = dir(&mut engine, "second", None);
        assert!(second.id > first.id);
        assert!(second.order > first.order);
    }
}
