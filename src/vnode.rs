//! Virtual nodes - the in-memory description of a tree to render.
//!
//! A [`VNode`] is a cheap `Rc` handle. Everything except `el` and the owning
//! component instance is fixed at construction; those two are written by the
//! reconciler when the node is mounted or carried over from an older version
//! of the same logical node.
//!
//! # Example
//!
//! ```ignore
//! use spark_vdom::{h, props, text_vnode};
//!
//! let list = h(
//!     "ul",
//!     props! { "class" => "todo" },
//!     vec![
//!         h("li", props! { "key" => 1 }, "write tests"),
//!         h("li", props! { "key" => 2 }, "ship"),
//!     ],
//! );
//! ```

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::component::{ComponentDef, ComponentHandle};
use crate::types::{Key, NodeId, Props, ShapeFlags, KEY_PROP};

// =============================================================================
// Node Type
// =============================================================================

/// What a virtual node stands for.
#[derive(Clone)]
pub enum VNodeType {
    /// A host element with this tag.
    Element(Cow<'static, str>),
    /// The reserved text marker. Its content lives in `Children::Text`.
    Text,
    /// A component, compared by definition identity.
    Component(Rc<ComponentDef>),
}

impl VNodeType {
    /// Tag for host elements, `None` otherwise.
    pub fn tag(&self) -> Option<&str> {
        match self {
            VNodeType::Element(tag) => Some(&**tag),
            _ => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, VNodeType::Component(_))
    }

    /// Short name for logs and error messages.
    pub fn name(&self) -> &str {
        match self {
            VNodeType::Element(tag) => &**tag,
            VNodeType::Text => "#text",
            VNodeType::Component(def) => def.name(),
        }
    }
}

impl PartialEq for VNodeType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Text, VNodeType::Text) => true,
            (VNodeType::Component(a), VNodeType::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Text => write!(f, "Text"),
            VNodeType::Component(def) => write!(f, "Component({})", def.name()),
        }
    }
}

impl From<&'static str> for VNodeType {
    fn from(tag: &'static str) -> Self {
        VNodeType::Element(Cow::Borrowed(tag))
    }
}

impl From<String> for VNodeType {
    fn from(tag: String) -> Self {
        VNodeType::Element(Cow::Owned(tag))
    }
}

impl From<Rc<ComponentDef>> for VNodeType {
    fn from(def: Rc<ComponentDef>) -> Self {
        VNodeType::Component(def)
    }
}

// =============================================================================
// Children
// =============================================================================

/// Children of a virtual node.
#[derive(Clone, Debug, Default)]
pub enum Children {
    #[default]
    None,
    Text(String),
    Nodes(Vec<VNode>),
}

impl Children {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[VNode]> {
        match self {
            Children::Nodes(nodes) => Some(nodes.as_slice()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Children::None)
    }

    /// Shape name used in diagnostics.
    pub(crate) fn shape_name(&self) -> &'static str {
        match self {
            Children::None => "empty",
            Children::Text(_) => "text",
            Children::Nodes(_) => "array",
        }
    }

    fn shape_flag(&self) -> ShapeFlags {
        match self {
            Children::None => ShapeFlags::empty(),
            Children::Text(_) => ShapeFlags::TEXT_CHILDREN,
            Children::Nodes(_) => ShapeFlags::ARRAY_CHILDREN,
        }
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.to_owned())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Nodes(nodes)
    }
}

impl From<Option<Children>> for Children {
    fn from(children: Option<Children>) -> Self {
        children.unwrap_or_default()
    }
}

// =============================================================================
// VNode
// =============================================================================

pub(crate) struct VNodeData {
    pub(crate) node_type: VNodeType,
    pub(crate) props: Option<Props>,
    pub(crate) children: Children,
    pub(crate) key: Option<Key>,
    pub(crate) shape_flag: ShapeFlags,
    pub(crate) el: Cell<Option<NodeId>>,
    pub(crate) component: RefCell<Option<ComponentHandle>>,
}

/// Handle to one virtual node. Clones share the node.
#[derive(Clone)]
pub struct VNode(pub(crate) Rc<VNodeData>);

/// Create a virtual node, deriving its key and shape flag.
pub fn create_vnode(
    node_type: impl Into<VNodeType>,
    props: Option<Props>,
    children: impl Into<Children>,
) -> VNode {
    let node_type = node_type.into();
    let children = children.into();

    let kind = match &node_type {
        VNodeType::Element(_) => ShapeFlags::ELEMENT,
        VNodeType::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
        VNodeType::Text => ShapeFlags::empty(),
    };
    let key = props
        .as_ref()
        .and_then(|props| props.get(KEY_PROP))
        .and_then(Key::from_prop);

    VNode(Rc::new(VNodeData {
        shape_flag: kind | children.shape_flag(),
        node_type,
        props,
        children,
        key,
        el: Cell::new(None),
        component: RefCell::new(None),
    }))
}

/// Element shorthand. An empty prop map is stored as absent.
pub fn h(tag: impl Into<VNodeType>, props: Props, children: impl Into<Children>) -> VNode {
    let props = (!props.is_empty()).then_some(props);
    create_vnode(tag, props, children)
}

/// Text node shorthand.
pub fn text_vnode(text: impl Into<String>) -> VNode {
    create_vnode(VNodeType::Text, None, Children::Text(text.into()))
}

/// Component node shorthand.
pub fn component_vnode(def: &Rc<ComponentDef>, props: Props) -> VNode {
    let props = (!props.is_empty()).then_some(props);
    create_vnode(def.clone(), props, Children::None)
}

/// Whether two nodes are the same logical node: equal type and equal key.
pub fn same_vnode_type(a: &VNode, b: &VNode) -> bool {
    a.0.node_type == b.0.node_type && a.0.key == b.0.key
}

impl VNode {
    pub fn node_type(&self) -> &VNodeType {
        &self.0.node_type
    }

    pub fn props(&self) -> Option<&Props> {
        self.0.props.as_ref()
    }

    pub fn children(&self) -> &Children {
        &self.0.children
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn shape_flag(&self) -> ShapeFlags {
        self.0.shape_flag
    }

    /// Host handle, once mounted.
    pub fn el(&self) -> Option<NodeId> {
        self.0.el.get()
    }

    pub(crate) fn set_el(&self, el: Option<NodeId>) {
        self.0.el.set(el);
    }

    /// Owning component instance (component nodes only, once mounted).
    pub fn component(&self) -> Option<ComponentHandle> {
        self.0.component.borrow().clone()
    }

    pub(crate) fn set_component(&self, instance: Option<ComponentHandle>) {
        *self.0.component.borrow_mut() = instance;
    }

    /// Whether both handles point at the very same node.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("type", &self.0.node_type)
            .field("key", &self.0.key)
            .field("shape_flag", &self.0.shape_flag)
            .field("el", &self.0.el.get())
            .field("children", &self.0.children)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
