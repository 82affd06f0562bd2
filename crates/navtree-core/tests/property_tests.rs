//! # Property-Based Tests
//!
//! Hierarchy invariants checked with proptest over random operation
//! sequences.

#![allow(clippy::unwrap_used, clippy::panic)]

use navtree_core::{
    Actor, CreateMenu, MenuEngine, MenuError, MenuId, MenuKind, MenuNode, ReorderEntry,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// `count` root directories with codes `n0..n{count}`.
fn seeded(count: usize) -> (MenuEngine, Vec<MenuId>) {
    let mut engine = MenuEngine::in_memory();
    let ids = (0..count)
        .map(|i| {
            engine
                .create_menu(
                    CreateMenu::new(format!("Node {i}"), format!("n{i}"), MenuKind::Directory),
                    &Actor::system(),
                )
                .expect("create")
                .id
        })
        .collect();
    (engine, ids)
}

fn live(engine: &MenuEngine) -> BTreeMap<MenuId, MenuNode> {
    engine
        .repository()
        .live_nodes()
        .expect("live nodes")
        .into_iter()
        .map(|n| (n.id, n))
        .collect()
}

/// Walk every parent chain; each must end at a root within `len` steps.
fn assert_acyclic(nodes: &BTreeMap<MenuId, MenuNode>) -> Result<(), TestCaseError> {
    for start in nodes.keys() {
        let mut seen = BTreeSet::from([*start]);
        let mut cursor = nodes[start].parent_id;
        let mut steps = 0usize;
        while let Some(parent) = cursor {
            prop_assert!(seen.insert(parent), "cycle through {}", parent);
            steps += 1;
            prop_assert!(steps <= nodes.len());
            cursor = nodes.get(&parent).and_then(|n| n.parent_id);
        }
    }
    Ok(())
}

fn assert_unique_sibling_orders(
    nodes: &BTreeMap<MenuId, MenuNode>,
) -> Result<(), TestCaseError> {
    let mut seen: BTreeSet<(Option<MenuId>, i64)> = BTreeSet::new();
    for node in nodes.values() {
        prop_assert!(
            seen.insert((node.parent_id, node.order)),
            "order {} repeated under {:?}",
            node.order,
            node.parent_id
        );
    }
    Ok(())
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// No sequence of moves produces a cycle, and orders stay unique.
    #[test]
    fn moves_never_create_cycles(
        moves in vec((0usize..12, proptest::option::of(0usize..12), 0i64..6), 1..40)
    ) {
        let (mut engine, ids) = seeded(12);

        for (subject, parent, order) in moves {
            let result = engine.move_menu(
                ids[subject],
                parent.map(|p| ids[p]),
                order,
                &Actor::system(),
            );
            match result {
                Ok(_) | Err(MenuError::CycleDetected { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
            let nodes = live(&engine);
            assert_acyclic(&nodes)?;
            assert_unique_sibling_orders(&nodes)?;
        }
    }

    /// A committed reorder batch leaves sibling orders unique.
    #[test]
    fn reorder_keeps_sibling_orders_unique(
        picks in vec((0usize..8, 0i64..10), 1..8)
    ) {
        let (mut engine, ids) = seeded(8);

        let entries: Vec<ReorderEntry> = picks
            .iter()
            .map(|&(i, order)| ReorderEntry { id: ids[i], order })
            .collect();
        let distinct_ids: BTreeSet<MenuId> = entries.iter().map(|e| e.id).collect();
        let distinct_orders: BTreeSet<i64> = entries.iter().map(|e| e.order).collect();
        let valid = distinct_ids.len() == entries.len() && distinct_orders.len() == entries.len();

        let before = live(&engine);
        let outcome = engine.reorder_menus(entries.clone(), &Actor::system()).expect("reorder");
        let after = live(&engine);

        if valid {
            prop_assert_eq!(outcome.success_count, entries.len());
            prop_assert!(outcome.errors.is_empty());
        } else {
            prop_assert_eq!(outcome.success_count, 0);
            prop_assert_eq!(outcome.failed_count, entries.len());
            prop_assert_eq!(&before, &after);
        }
        assert_unique_sibling_orders(&after)?;
    }

    /// Appending children assigns strictly increasing orders.
    #[test]
    fn appended_children_are_ordered(count in 1usize..20) {
        let (mut engine, ids) = seeded(1);
        let mut last = 0i64;
        for i in 0..count {
            let child = engine
                .create_menu(
                    CreateMenu::new(format!("Child {i}"), format!("c{i}"), MenuKind::Button)
                        .under(ids[0]),
                    &Actor::system(),
                )
                .expect("create");
            prop_assert!(child.order > last);
            last = child.order;
        }
    }
}
