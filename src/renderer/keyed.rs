//! Keyed children diff.
//!
//! Reconciles an old and a new child list in five phases:
//!
//! 1. patch the common prefix
//! 2. patch the common suffix
//! 3. old exhausted: mount the rest of the new list before the suffix
//! 4. new exhausted: unmount the rest of the old list
//! 5. otherwise remap the middle window:
//!    - key → new index for the new window
//!    - new index → old index table (`None` = no old match)
//!    - walk the old window: unmatched nodes are unmounted, matched pairs patched
//!    - walk the new window backwards: mount unmatched nodes, re-insert moved
//!      ones before their right neighbour (already in final position)
//!
//! With `optimize_moves`, matched nodes on the longest increasing run of old
//! indices keep their place, so only nodes that actually moved are
//! re-inserted.
//!
//! ```text
//! old  A B C D E        prefix A, suffix E
//! new  A C D B E        window [B C D] → [C D B]
//!                       table  [2 3 1], stable run {C, D}
//!                       → insert(B, before E)
//! ```

use std::collections::HashMap;

use super::patch::missing_element;
use super::Renderer;
use crate::error::Result;
use crate::types::{Key, NodeId};
use crate::vnode::{same_vnode_type, VNode};

impl Renderer {
    /// Reconcile `c1` into `c2` inside `container`.
    ///
    /// `anchor` is where nodes past the end of the list belong; `None` means
    /// the end of the container.
    pub fn patch_keyed_children(
        &self,
        c1: &[VNode],
        c2: &[VNode],
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        let mut i = 0;
        // Exclusive ends.
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        // 1. Prefix
        while i < e1 && i < e2 && same_vnode_type(&c1[i], &c2[i]) {
            self.patch(Some(&c1[i]), &c2[i], container, None)?;
            i += 1;
        }

        // 2. Suffix
        while i < e1 && i < e2 && same_vnode_type(&c1[e1 - 1], &c2[e2 - 1]) {
            self.patch(Some(&c1[e1 - 1]), &c2[e2 - 1], container, None)?;
            e1 -= 1;
            e2 -= 1;
        }

        if i == e1 {
            // 3. Pure append (or nothing left)
            let before = c2.get(e2).and_then(VNode::el).or(anchor);
            for node in &c2[i..e2] {
                self.patch(None, node, container, before)?;
            }
        } else if i == e2 {
            // 4. Pure truncation
            for node in &c1[i..e1] {
                self.unmount(node)?;
            }
        } else {
            // 5. General middle window
            self.patch_middle(c1, c2, (i, e1), (i, e2), container, anchor)?;
        }
        Ok(())
    }

    fn patch_middle(
        &self,
        c1: &[VNode],
        c2: &[VNode],
        (s1, e1): (usize, usize),
        (s2, e2): (usize, usize),
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        let mut key_to_new: HashMap<&Key, usize> = HashMap::with_capacity(e2 - s2);
        for (j, node) in c2.iter().enumerate().take(e2).skip(s2) {
            if let Some(key) = node.key() {
                if let Some(first) = key_to_new.insert(key, j) {
                    tracing::warn!(
                        %key,
                        first,
                        second = j,
                        "duplicate key in children; the earlier node is mounted fresh"
                    );
                }
            }
        }

        let window = e2 - s2;
        let mut new_to_old: Vec<Option<usize>> = vec![None; window];
        let mut moved = false;
        let mut max_new_index = 0;

        for (old_index, old) in c1.iter().enumerate().take(e1).skip(s1) {
            let candidate = match old.key() {
                Some(key) => key_to_new.get(key).copied(),
                // Keyless: first unclaimed keyless node of the same type.
                None => (s2..e2).find(|&j| {
                    c2[j].key().is_none() && new_to_old[j - s2].is_none() && same_vnode_type(old, &c2[j])
                }),
            };
            let matched = candidate.filter(|&j| new_to_old[j - s2].is_none() && same_vnode_type(old, &c2[j]));

            let Some(j) = matched else {
                self.unmount(old)?;
                continue;
            };
            new_to_old[j - s2] = Some(old_index);
            if j >= max_new_index {
                max_new_index = j;
            } else {
                moved = true;
            }
            self.patch(Some(old), &c2[j], container, None)?;
        }

        let stays = if !self.config.optimize_moves {
            vec![false; window]
        } else if moved {
            longest_increasing_run(&new_to_old)
        } else {
            vec![true; window]
        };

        for k in (0..window).rev() {
            let j = s2 + k;
            let node = &c2[j];
            let before = c2.get(j + 1).and_then(VNode::el).or(anchor);
            match new_to_old[k] {
                None => self.patch(None, node, container, before)?,
                Some(_) if !stays[k] => {
                    let el = node.el().ok_or_else(|| missing_element(node))?;
                    tracing::trace!(%el, "moving child");
                    self.host.insert(el, container, before)?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Mark the positions of one longest strictly increasing run of old indices.
///
/// `None` entries never belong to the run.
fn longest_increasing_run(sequence: &[Option<usize>]) -> Vec<bool> {
    let mut in_run = vec![false; sequence.len()];
    let mut predecessor: Vec<Option<usize>> = vec![None; sequence.len()];
    // tails[len] = position of the smallest tail of a run of length len + 1
    let mut tails: Vec<usize> = Vec::new();

    for (position, value) in sequence.iter().enumerate() {
        let Some(value) = *value else {
            continue;
        };
        let slot = tails.partition_point(|&t| sequence[t].is_some_and(|v| v < value));
        if slot > 0 {
            predecessor[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        in_run[position] = true;
        cursor = predecessor[position];
    }
    in_run
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::host::{HostOp, MemoryHost};
    use crate::props;
    use crate::types::PropValue;
    use crate::vnode::{h, text_vnode};
    use rstest::rstest;
    use std::rc::Rc;

    fn item(key: i64) -> VNode {
        h("li", props! { "key" => key }, key.to_string())
    }

    fn list(keys: &[i64]) -> VNode {
        h("ul", props! {}, keys.iter().copied().map(item).collect::<Vec<_>>())
    }

    /// Mount `from`, patch to `to`, return the host ops of the patch.
    fn diff(renderer: &Renderer, host: &MemoryHost, root: NodeId, from: &VNode, to: &VNode) -> Vec<HostOp> {
        renderer.patch(None, from, root, None).unwrap();
        host.clear_ops();
        renderer.patch(Some(from), to, root, None).unwrap();
        host.take_ops()
    }

    fn rendered_keys(host: &MemoryHost, ul: NodeId) -> Vec<String> {
        host.children(ul)
            .into_iter()
            .map(|li| host.text(li).unwrap_or_default())
            .collect()
    }

    fn setup(config: RendererConfig) -> (Rc<MemoryHost>, NodeId, Renderer) {
        crate::init_test_tracing();
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root("root");
        let renderer = Renderer::with_config(host.clone(), config);
        (host, root, renderer)
    }

    #[test]
    fn test_move_reinserts_only_moved_node() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = list(&[1, 2, 3, 4, 5]);
        let new = list(&[1, 3, 4, 2, 5]);
        let ops = diff(&renderer, &host, root, &old, &new);

        let old_items = old.children().as_nodes().unwrap();
        let b = old_items[1].el().unwrap();
        let e = old_items[4].el().unwrap();
        let ul = new.el().unwrap();
        assert_eq!(ops, vec![HostOp::Insert { child: b, parent: ul, anchor: Some(e) }]);
        assert_eq!(rendered_keys(&host, ul), vec!["1", "3", "4", "2", "5"]);
    }

    #[test]
    fn test_moved_window_nodes_are_still_patched() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = list(&[1, 2, 3, 4, 5]);
        let changed = |key: i64| h("li", props! { "key" => key, "class" => "hot" }, format!("{key}!"));
        let new = h(
            "ul",
            props! {},
            vec![item(1), changed(3), changed(4), item(2), item(5)],
        );
        let ops = diff(&renderer, &host, root, &old, &new);

        let old_items = old.children().as_nodes().unwrap();
        let [b, c, d, e] = [1, 2, 3, 4].map(|i| old_items[i].el().unwrap());
        let ul = new.el().unwrap();
        let restyled = |node: NodeId, text: &str| {
            [
                HostOp::PatchProp {
                    node,
                    key: "class".into(),
                    prev: None,
                    next: Some(PropValue::from("hot")),
                },
                HostOp::SetText { node, text: text.into() },
            ]
        };

        let mut expected = Vec::new();
        expected.extend(restyled(c, "3!"));
        expected.extend(restyled(d, "4!"));
        expected.push(HostOp::Insert { child: b, parent: ul, anchor: Some(e) });
        assert_eq!(ops, expected);

        let new_items = new.children().as_nodes().unwrap();
        assert_eq!(new_items[1].el(), Some(c));
        assert_eq!(new_items[2].el(), Some(d));
        assert_eq!(host.prop(c, "class"), Some(PropValue::from("hot")));
        assert_eq!(rendered_keys(&host, ul), vec!["1", "3!", "4!", "2", "5"]);
    }

    #[test]
    fn test_unoptimized_moves_reinsert_every_match() {
        let (host, root, renderer) = setup(RendererConfig::default().with_optimize_moves(false));
        let ops = diff(&renderer, &host, root, &list(&[1, 2, 3, 4, 5]), &list(&[1, 3, 4, 2, 5]));

        assert_eq!(ops.iter().filter(|op| op.is_insert()).count(), 3);
        assert!(!ops.iter().any(|op| op.is_create() || op.is_remove()));
    }

    #[test]
    fn test_pure_append_anchors_before_suffix() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = list(&[1, 4]);
        let new = list(&[1, 2, 3, 4]);
        let ops = diff(&renderer, &host, root, &old, &new);

        let creates = ops.iter().filter(|op| op.is_create()).count();
        // One element per new item, text set directly on it
        assert_eq!(creates, 2);
        assert!(!ops.iter().any(HostOp::is_remove));

        let four = old.children().as_nodes().unwrap()[1].el();
        let li_inserts: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                HostOp::Insert { parent, anchor, .. } if Some(*parent) == new.el() => Some(*anchor),
                _ => None,
            })
            .collect();
        assert_eq!(li_inserts, vec![four, four]);
        assert_eq!(rendered_keys(&host, new.el().unwrap()), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_pure_truncation_only_removes() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = list(&[1, 2, 3, 4]);
        let ops = diff(&renderer, &host, root, &old, &list(&[1, 4]));

        let removed: Vec<_> = old.children().as_nodes().unwrap()[1..3]
            .iter()
            .map(|n| HostOp::Remove { child: n.el().unwrap() })
            .collect();
        assert_eq!(ops, removed);
    }

    #[rstest]
    #[case(&[1, 2, 3], &[3, 2, 1])]
    #[case(&[1, 2, 3, 4], &[2, 5, 1, 3])]
    #[case(&[1, 2, 3], &[4, 5, 6])]
    #[case(&[], &[1, 2])]
    #[case(&[1, 2], &[])]
    #[case(&[5, 1, 2, 3, 4], &[1, 2, 3, 4, 5])]
    fn test_reorders_match_new_key_order(#[case] from: &[i64], #[case] to: &[i64]) {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = list(from);
        let new = list(to);
        diff(&renderer, &host, root, &old, &new);

        let expected: Vec<String> = to.iter().map(i64::to_string).collect();
        assert_eq!(rendered_keys(&host, new.el().unwrap()), expected);

        // Retained keys keep their host node
        for old_item in old.children().as_nodes().unwrap() {
            if let Some(new_item) = new
                .children()
                .as_nodes()
                .unwrap()
                .iter()
                .find(|n| n.key() == old_item.key())
            {
                assert_eq!(new_item.el(), old_item.el());
            }
        }
    }

    #[test]
    fn test_middle_removal_and_mount() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = list(&[1, 2, 3, 4]);
        let new = list(&[1, 5, 3, 4]);
        let ops = diff(&renderer, &host, root, &old, &new);

        let two = old.children().as_nodes().unwrap()[1].el().unwrap();
        assert!(ops.contains(&HostOp::Remove { child: two }));
        assert_eq!(rendered_keys(&host, new.el().unwrap()), vec!["1", "5", "3", "4"]);
    }

    #[test]
    fn test_keyless_nodes_match_by_type() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = h(
            "div",
            props! {},
            vec![h("p", props! {}, "a"), h("span", props! {}, "b"), text_vnode("c")],
        );
        let new = h(
            "div",
            props! {},
            vec![text_vnode("c"), h("span", props! {}, "b"), h("p", props! {}, "a")],
        );
        let ops = diff(&renderer, &host, root, &old, &new);

        assert!(!ops.iter().any(|op| op.is_create() || op.is_remove()));
        assert_eq!(host.to_markup(new.el().unwrap()), "<div>c<span>b</span><p>a</p></div>");
    }

    #[test]
    fn test_duplicate_keys_still_render() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = list(&[1, 2, 3]);
        let new = list(&[3, 2, 2]);
        diff(&renderer, &host, root, &old, &new);
        assert_eq!(rendered_keys(&host, new.el().unwrap()), vec!["3", "2", "2"]);
    }

    #[test]
    fn test_type_change_under_same_key_remounts() {
        let (host, root, renderer) = setup(RendererConfig::default());
        let old = h("div", props! {}, vec![item(1), item(2)]);
        let new = h(
            "div",
            props! {},
            vec![h("p", props! { "key" => 2 }, "2"), item(1)],
        );
        let ops = diff(&renderer, &host, root, &old, &new);

        let old_two = old.children().as_nodes().unwrap()[1].el().unwrap();
        assert!(ops.contains(&HostOp::Remove { child: old_two }));
        assert_eq!(host.to_markup(new.el().unwrap()), "<div><p>2</p><li>1</li></div>");
    }

    #[rstest]
    #[case(vec![Some(2), Some(3), Some(1)], vec![true, true, false])]
    #[case(vec![Some(0), None, Some(1)], vec![true, false, true])]
    #[case(vec![Some(3), Some(2), Some(1)], vec![false, false, true])]
    #[case(vec![], vec![])]
    fn test_longest_increasing_run(#[case] sequence: Vec<Option<usize>>, #[case] expected: Vec<bool>) {
        assert_eq!(longest_increasing_run(&sequence), expected);
    }
}
