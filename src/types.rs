//! Core types shared by the reconciler, the component model and host adapters.
//!
//! - [`NodeId`] - opaque handle to a node on the host surface
//! - [`ShapeFlags`] - what a virtual node is and what kind of children it has
//! - [`Key`] - list identity used by the keyed diff
//! - [`PropValue`] / [`Props`] - property values handed to the host
//! - [`EventHandler`] / [`Event`] - listener values for `on*` props

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

// =============================================================================
// NodeId - Host surface handle
// =============================================================================

/// Handle to a node living on the host surface.
///
/// The reconciler never looks inside a handle; adapters allocate them and
/// map them to whatever the real surface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Shape Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Classification of a virtual node, fixed at creation.
    ///
    /// One of `ELEMENT`/`STATEFUL_COMPONENT` describes the node itself, one of
    /// `TEXT_CHILDREN`/`ARRAY_CHILDREN` describes its children (if any).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u8 {
        const ELEMENT = 1;
        const STATEFUL_COMPONENT = 1 << 2;
        const TEXT_CHILDREN = 1 << 3;
        const ARRAY_CHILDREN = 1 << 4;
    }
}

// =============================================================================
// Key - Identity in keyed lists
// =============================================================================

/// Identity of a node among its siblings, taken from the `key` prop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl Key {
    /// Extract a key from a prop value. Only integers and strings qualify.
    pub fn from_prop(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Int(n) => Some(Key::Int(*n)),
            PropValue::Str(s) => Some(Key::Str(Rc::from(s.as_str()))),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event delivered by a host to a listener attached through an `on*` prop.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name without the `on` prefix, lowercased (`"click"`).
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Payload, `PropValue::Null` when the event carries none.
    pub value: PropValue,
}

/// Listener stored in a prop.
///
/// Two handlers are equal only when they are the same allocation, so a render
/// that rebuilds its closures produces a prop change while one that reuses an
/// `EventHandler` does not.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the listener.
    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// PropValue - Property values
// =============================================================================

/// A single property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Handler(EventHandler),
}

impl PropValue {
    /// Wrap a closure as an event handler value.
    pub fn handler(f: impl Fn(&Event) + 'static) -> Self {
        PropValue::Handler(EventHandler::new(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => write!(f, "null"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(n) => write!(f, "{n}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Str(s) => write!(f, "{s}"),
            PropValue::Handler(_) => write!(f, "[handler]"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<usize> for PropValue {
    /// Saturates at `i64::MAX`.
    fn from(value: usize) -> Self {
        PropValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropValue::Null, Into::into)
    }
}

/// Ordered property map. Iteration order is insertion order, so host calls
/// happen in the order props were written.
pub type Props = IndexMap<String, PropValue>;

/// Prop name reserved for list identity. Never forwarded to the host.
pub const KEY_PROP: &str = "key";

/// Build a [`Props`] map.
///
/// ```ignore
/// let props = props! { "id" => "main", "key" => 3 };
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::types::Props::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::types::Props::new();
        $(
            props.insert(::std::string::String::from($name), $crate::types::PropValue::from($value));
        )+
        props
    }};
}

// =============================================================================
// Tests
// =============================================================================
