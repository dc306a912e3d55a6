//! Property tests for the keyed children diff, driven through `MemoryHost`.

use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;
use spark_vdom::{h, props, HostOp, MemoryHost, NodeId, Renderer, RendererConfig, VNode};

fn list(keys: &[i64]) -> VNode {
    h(
        "ul",
        props! {},
        keys.iter()
            .map(|&key| h("li", props! { "key" => key }, key.to_string()))
            .collect::<Vec<_>>(),
    )
}

fn keyed_els(vnode: &VNode) -> HashMap<String, NodeId> {
    vnode
        .children()
        .as_nodes()
        .unwrap_or_default()
        .iter()
        .filter_map(|item| Some((item.key()?.to_string(), item.el()?)))
        .collect()
}

fn key_list() -> impl Strategy<Value = Vec<i64>> {
    proptest::sample::subsequence((0..16).collect::<Vec<i64>>(), 0..=16).prop_shuffle()
}

fn check_reorder(from: &[i64], to: &[i64], config: RendererConfig) -> Result<(), TestCaseError> {
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root("root");
    let renderer = Renderer::with_config(host.clone(), config);

    let old = list(from);
    renderer.render(&old, root).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let before = keyed_els(&old);
    host.clear_ops();

    let new = list(to);
    renderer.render(&new, root).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let ops = host.take_ops();

    // Host children follow the new key order
    let ul = new.el().ok_or_else(|| TestCaseError::fail("list not mounted"))?;
    let rendered: Vec<String> = host
        .children(ul)
        .into_iter()
        .map(|li| host.text(li).unwrap_or_default())
        .collect();
    let expected: Vec<String> = to.iter().map(i64::to_string).collect();
    prop_assert_eq!(rendered, expected);

    // Retained keys keep their host node; only dropped keys are removed
    let after = keyed_els(&new);
    let mut kept = 0;
    for (key, el) in &after {
        if let Some(previous) = before.get(key) {
            prop_assert_eq!(previous, el);
            kept += 1;
        }
    }
    let removes = ops.iter().filter(|op| op.is_remove()).count();
    let creates = ops.iter().filter(|op| op.is_create()).count();
    prop_assert_eq!(removes, from.len() - kept);
    prop_assert_eq!(creates, to.len() - kept);
    Ok(())
}

proptest! {
    #[test]
    fn reorder_matches_new_order(from in key_list(), to in key_list()) {
        check_reorder(&from, &to, RendererConfig::default())?;
    }

    #[test]
    fn reorder_without_move_optimisation(from in key_list(), to in key_list()) {
        check_reorder(&from, &to, RendererConfig::default().with_optimize_moves(false))?;
    }

    #[test]
    fn permutation_moves_are_minimal(keys in key_list()) {
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root("root");
        let renderer = Renderer::new(host.clone());

        let mut sorted = keys.clone();
        sorted.sort_unstable();
        renderer.render(&list(&sorted), root).map_err(|e| TestCaseError::fail(e.to_string()))?;
        host.clear_ops();

        renderer.render(&list(&keys), root).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let inserts = host.take_ops().into_iter().filter(HostOp::is_insert).count();

        // Moving from sorted order never needs more than n - LIS inserts
        prop_assert!(inserts <= keys.len().saturating_sub(longest_increasing(&keys)));
    }
}

fn longest_increasing(values: &[i64]) -> usize {
    let mut tails: Vec<i64> = Vec::new();
    for &value in values {
        let slot = tails.partition_point(|&t| t < value);
        if slot == tails.len() {
            tails.push(value);
        } else {
            tails[slot] = value;
        }
    }
    tails.len()
}

#[test]
fn moving_one_middle_node_is_a_single_insert() {
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root("root");
    let renderer = Renderer::new(host.clone());

    renderer.render(&list(&[1, 2, 3, 4, 5]), root).unwrap();
    host.clear_ops();
    renderer.render(&list(&[1, 3, 4, 2, 5]), root).unwrap();

    let ops = host.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].is_insert());
}
