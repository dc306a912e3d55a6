//! Host Adapter - the boundary to a concrete rendering surface.
//!
//! The reconciler never touches a surface directly. It calls the five
//! primitives of [`HostAdapter`] and nothing else:
//!
//! | Primitive | Effect |
//! |---|---|
//! | `create_element(tag)` | new detached node, returns its handle |
//! | `set_element_text(node, text)` | replace the node's content with text |
//! | `patch_prop(node, key, prev, next)` | add/update (`next = Some`) or remove (`next = None`) one property |
//! | `insert(child, parent, anchor)` | append, or insert before `anchor` |
//! | `remove(child)` | detach from its parent if attached |
//!
//! The adapter decides what a property means on its surface, including
//! attaching listeners for event props. [`memory::MemoryHost`] is the
//! in-memory reference surface.

pub mod memory;

pub use memory::{HostOp, MemoryHost};

use crate::error::HostError;
use crate::types::{NodeId, PropValue};

/// Tag the reconciler creates text nodes with.
pub const TEXT_TAG: &str = "#text";

/// Operations a rendering surface supplies to the reconciler.
///
/// Calls are synchronous. Methods take `&self`; surfaces keep their own
/// interior mutability so a single adapter can be shared by a renderer and
/// the embedder at once.
pub trait HostAdapter {
    /// Create a detached node for `tag`.
    fn create_element(&self, tag: &str) -> Result<NodeId, HostError>;

    /// Replace the node's content with `text`.
    fn set_element_text(&self, node: NodeId, text: &str) -> Result<(), HostError>;

    /// Apply a property change. `next == None` removes the property.
    fn patch_prop(
        &self,
        node: NodeId,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
    ) -> Result<(), HostError>;

    /// Insert `child` into `parent` before `anchor`, or at the end without one.
    ///
    /// Inserting a node that is already attached moves it.
    fn insert(&self, child: NodeId, parent: NodeId, anchor: Option<NodeId>)
        -> Result<(), HostError>;

    /// Detach `child` from its parent. Detached nodes are left alone.
    fn remove(&self, child: NodeId) -> Result<(), HostError>;
}
