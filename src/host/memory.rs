//! In-memory host surface.
//!
//! Keeps a node table plus a log of every primitive call, which makes it the
//! surface of choice for tests and for embedders that want to inspect what a
//! render would do:
//!
//! ```ignore
//! let host = Rc::new(MemoryHost::new());
//! let root = host.create_root("root");
//! create_app(host.clone(), counter, props! {}).mount(root)?;
//! assert_eq!(host.to_markup(root), "<root><button>0</button></root>");
//! host.clear_ops();
//! ```
//!
//! Props named `on<event>` holding a handler attach a listener for `<event>`
//! (lowercased) instead of being stored, and [`MemoryHost::dispatch`] fires
//! them.

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;

use super::{HostAdapter, TEXT_TAG};
use crate::error::HostError;
use crate::types::{Event, EventHandler, NodeId, PropValue, Props};

// =============================================================================
// Operations Log
// =============================================================================

/// One recorded primitive call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement {
        node: NodeId,
        tag: String,
    },
    SetText {
        node: NodeId,
        text: String,
    },
    PatchProp {
        node: NodeId,
        key: String,
        prev: Option<PropValue>,
        next: Option<PropValue>,
    },
    Insert {
        child: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
    },
    Remove {
        child: NodeId,
    },
}

impl HostOp {
    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::CreateElement { .. })
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, HostOp::Insert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, HostOp::Remove { .. })
    }
}

// =============================================================================
// Node Table
// =============================================================================

#[derive(Default)]
struct MemoryNode {
    tag: String,
    text: Option<String>,
    props: Props,
    listeners: IndexMap<String, EventHandler>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// Host surface backed by plain data structures.
///
/// Handles are indices into the node table and are never reused, so a
/// `NodeId` seen in an assertion always names the same node.
#[derive(Default)]
pub struct MemoryHost {
    nodes: RefCell<Vec<MemoryNode>>,
    ops: RefCell<Vec<HostOp>>,
}

fn event_name(key: &str) -> Option<String> {
    let name = key.strip_prefix("on")?;
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self, tag: &str) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(MemoryNode {
            tag: tag.to_owned(),
            ..MemoryNode::default()
        });
        id
    }

    fn record(&self, op: HostOp) {
        self.ops.borrow_mut().push(op);
    }

    fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&MemoryNode) -> R) -> Result<R, HostError> {
        let nodes = self.nodes.borrow();
        nodes.get(node.0).map(f).ok_or(HostError::UnknownNode(node))
    }

    /// Create a container node for mounting into. Not recorded as an op.
    pub fn create_root(&self, tag: &str) -> NodeId {
        self.allocate(tag)
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Every call recorded since the last clear.
    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.borrow().clone()
    }

    /// Return and clear the call log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    /// Number of nodes ever created, roots included.
    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.with_node(node, |n| n.children.clone()).unwrap_or_default()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.with_node(node, |n| n.parent).ok().flatten()
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |n| n.tag.clone()).ok()
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |n| n.text.clone()).ok().flatten()
    }

    pub fn prop(&self, node: NodeId, key: &str) -> Option<PropValue> {
        self.with_node(node, |n| n.props.get(key).cloned())
            .ok()
            .flatten()
    }

    pub fn has_listener(&self, node: NodeId, event: &str) -> bool {
        self.with_node(node, |n| n.listeners.contains_key(event))
            .unwrap_or(false)
    }

    /// Fire the `event` listener on `node`. Returns whether one ran.
    pub fn dispatch(&self, node: NodeId, event: &str, value: PropValue) -> Result<bool, HostError> {
        let handler = self.with_node(node, |n| n.listeners.get(event).cloned())?;
        // The node table borrow is released; the handler may write state
        // that re-renders synchronously.
        let Some(handler) = handler else {
            return Ok(false);
        };
        handler.call(&Event {
            name: event.to_owned(),
            target: node,
            value,
        });
        Ok(true)
    }

    /// Render the subtree under `node` as markup.
    ///
    /// Text nodes print their content; elements print their stored props in
    /// insertion order. Listeners are not shown.
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        let snapshot = self.with_node(node, |n| {
            (
                n.tag.clone(),
                n.text.clone(),
                n.props
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect::<Vec<_>>(),
                n.children.clone(),
            )
        });
        let Ok((tag, text, props, children)) = snapshot else {
            return;
        };

        if tag == TEXT_TAG {
            out.push_str(text.as_deref().unwrap_or_default());
            return;
        }

        let _ = write!(out, "<{tag}");
        for (key, value) in props {
            let _ = write!(out, " {key}=\"{value}\"");
        }
        out.push('>');
        if let Some(text) = text {
            out.push_str(&text);
        }
        for child in children {
            self.write_markup(child, out);
        }
        let _ = write!(out, "</{tag}>");
    }

    fn detach(nodes: &mut [MemoryNode], child: NodeId) {
        if let Some(parent) = nodes[child.0].parent.take() {
            nodes[parent.0].children.retain(|&c| c != child);
        }
    }
}

// =============================================================================
// HostAdapter
// =============================================================================

impl HostAdapter for MemoryHost {
    fn create_element(&self, tag: &str) -> Result<NodeId, HostError> {
        let node = self.allocate(tag);
        tracing::trace!(%node, tag, "create_element");
        self.record(HostOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn set_element_text(&self, node: NodeId, text: &str) -> Result<(), HostError> {
        {
            let mut nodes = self.nodes.borrow_mut();
            if node.0 >= nodes.len() {
                return Err(HostError::UnknownNode(node));
            }
            // Text replaces content wholesale.
            let children = std::mem::take(&mut nodes[node.0].children);
            for child in children {
                nodes[child.0].parent = None;
            }
            nodes[node.0].text = Some(text.to_owned());
        }
        tracing::trace!(%node, text, "set_element_text");
        self.record(HostOp::SetText {
            node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn patch_prop(
        &self,
        node: NodeId,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
    ) -> Result<(), HostError> {
        let replaced = {
            let mut nodes = self.nodes.borrow_mut();
            let target = nodes.get_mut(node.0).ok_or(HostError::UnknownNode(node))?;
            match event_name(key) {
                Some(event) => match next {
                    Some(PropValue::Handler(handler)) => {
                        target.listeners.insert(event, handler.clone()).map(PropValue::Handler)
                    }
                    _ => target.listeners.shift_remove(&event).map(PropValue::Handler),
                },
                None => match next {
                    Some(value) if !value.is_null() => {
                        target.props.insert(key.to_owned(), value.clone())
                    }
                    _ => target.props.shift_remove(key),
                },
            }
        };
        // Old values may hold closures; drop them outside the table borrow.
        drop(replaced);

        tracing::trace!(%node, key, "patch_prop");
        self.record(HostOp::PatchProp {
            node,
            key: key.to_owned(),
            prev: prev.cloned(),
            next: next.cloned(),
        });
        Ok(())
    }

    fn insert(&self, child: NodeId, parent: NodeId, anchor: Option<NodeId>) -> Result<(), HostError> {
        {
            let mut nodes = self.nodes.borrow_mut();
            for id in [child, parent].into_iter().chain(anchor) {
                if id.0 >= nodes.len() {
                    return Err(HostError::UnknownNode(id));
                }
            }

            let mut ancestor = Some(parent);
            while let Some(id) = ancestor {
                if id == child {
                    return Err(HostError::Cycle { child, parent });
                }
                ancestor = nodes[id.0].parent;
            }

            if let Some(anchor) = anchor {
                if anchor == child || nodes[anchor.0].parent != Some(parent) {
                    return Err(HostError::InvalidAnchor { anchor, parent });
                }
            }

            Self::detach(&mut nodes, child);
            let siblings = &mut nodes[parent.0].children;
            let position = anchor
                .and_then(|anchor| siblings.iter().position(|&c| c == anchor))
                .unwrap_or(siblings.len());
            siblings.insert(position, child);
            nodes[child.0].parent = Some(parent);
        }

        tracing::trace!(%child, %parent, anchor = ?anchor, "insert");
        self.record(HostOp::Insert {
            child,
            parent,
            anchor,
        });
        Ok(())
    }

    fn remove(&self, child: NodeId) -> Result<(), HostError> {
        {
            let mut nodes = self.nodes.borrow_mut();
            if child.0 >= nodes.len() {
                return Err(HostError::UnknownNode(child));
            }
            Self::detach(&mut nodes, child);
        }
        tracing::trace!(%child, "remove");
        self.record(HostOp::Remove { child });
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
