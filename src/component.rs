//! Component definitions and instances.
//!
//! A [`ComponentDef`] is the static description: a name, an optional `setup`
//! and an optional static `render`. Mounting a component node creates a
//! [`ComponentInstance`] that owns the resolved render function, whatever
//! state `setup` produced, the last rendered sub-tree and the update effect.
//!
//! # Example
//!
//! ```ignore
//! let counter = ComponentDef::new("Counter")
//!     .with_setup(|_props| {
//!         let count = create_ref(0);
//!         SetupResult::render(move |_ctx| h("span", props! {}, count.get().to_string()))
//!     })
//!     .into_rc();
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{RenderError, Result};
use crate::reactive::Effect;
use crate::types::{PropValue, Props};
use crate::vnode::{VNode, VNodeData};

/// Produces a component's sub-tree.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

/// Runs once per instance with its initial props.
pub type SetupFn = Rc<dyn Fn(&Props) -> SetupResult>;

/// Shared, mutable component instance.
pub type ComponentHandle = Rc<RefCell<ComponentInstance>>;

// =============================================================================
// Setup Result
// =============================================================================

/// What `setup` hands back.
#[derive(Clone)]
pub enum SetupResult {
    /// A render function, used in place of the definition's static render.
    Render(RenderFn),
    /// State exposed to the static render through [`RenderContext::state`].
    State(Rc<dyn Any>),
    /// Nothing. The static render is used.
    Empty,
}

impl SetupResult {
    pub fn render(f: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        SetupResult::Render(Rc::new(f))
    }

    pub fn state<T: 'static>(state: T) -> Self {
        SetupResult::State(Rc::new(state))
    }
}

impl fmt::Debug for SetupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupResult::Render(_) => write!(f, "Render(..)"),
            SetupResult::State(_) => write!(f, "State(..)"),
            SetupResult::Empty => write!(f, "Empty"),
        }
    }
}

// =============================================================================
// Definition
// =============================================================================

/// Static description of a component.
pub struct ComponentDef {
    name: String,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
}

impl ComponentDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            render: None,
        }
    }

    pub fn with_setup(mut self, setup: impl Fn(&Props) -> SetupResult + 'static) -> Self {
        self.setup = Some(Rc::new(setup));
        self
    }

    pub fn with_render(mut self, render: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    /// Finish building. Component identity is the `Rc` allocation.
    pub fn into_rc(self) -> Rc<Self> {
        Rc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

// =============================================================================
// Render Context
// =============================================================================

/// What a render function sees: current props and setup state.
pub struct RenderContext {
    props: Props,
    setup_state: Option<Rc<dyn Any>>,
}

impl RenderContext {
    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    /// Setup state, if `setup` returned a value of type `T`.
    pub fn state<T: 'static>(&self) -> Option<&T> {
        self.setup_state.as_deref()?.downcast_ref()
    }
}

// =============================================================================
// Instance
// =============================================================================

thread_local! {
    static NEXT_UID: Cell<u64> = const { Cell::new(0) };
}

/// Live component, created on first mount.
pub struct ComponentInstance {
    pub uid: u64,
    pub def: Rc<ComponentDef>,
    /// Latest vnode for this instance.
    pub(crate) vnode: Weak<VNodeData>,
    /// Instance whose render mounted this one.
    pub(crate) parent: Weak<RefCell<ComponentInstance>>,
    pub props: Props,
    pub(crate) setup_state: Option<Rc<dyn Any>>,
    pub(crate) render: Option<RenderFn>,
    pub sub_tree: Option<VNode>,
    pub is_mounted: bool,
    /// Re-render effect, installed at mount.
    pub update: Option<Effect>,
}

/// Create an unmounted instance for a component vnode.
///
/// Returns `None` when the vnode is not a component.
pub fn create_component_instance(vnode: &VNode) -> Option<ComponentHandle> {
    let crate::vnode::VNodeType::Component(def) = vnode.node_type() else {
        return None;
    };
    let uid = NEXT_UID.with(|next| {
        let uid = next.get();
        next.set(uid + 1);
        uid
    });

    Some(Rc::new(RefCell::new(ComponentInstance {
        uid,
        def: def.clone(),
        vnode: Rc::downgrade(&vnode.0),
        parent: Weak::new(),
        props: vnode.props().cloned().unwrap_or_default(),
        setup_state: None,
        render: None,
        sub_tree: None,
        is_mounted: false,
        update: None,
    })))
}

/// Run `setup` and resolve the render function.
///
/// A render function from `setup` wins; otherwise the definition's static
/// render is used, with any returned state kept for it.
pub fn setup_component(instance: &ComponentHandle) -> Result<()> {
    let (def, props) = {
        let instance = instance.borrow();
        (instance.def.clone(), instance.props.clone())
    };

    // Setup runs with no instance borrow held; it may create reactive state
    // and effects freely.
    let result = match &def.setup {
        Some(setup) => setup(&props),
        None => SetupResult::Empty,
    };

    let mut instance = instance.borrow_mut();
    match result {
        SetupResult::Render(render) => instance.render = Some(render),
        SetupResult::State(state) => instance.setup_state = Some(state),
        SetupResult::Empty => {}
    }
    if instance.render.is_none() {
        instance.render = def.render.clone();
    }
    if instance.render.is_none() {
        return Err(RenderError::MissingRender {
            component: def.name.clone(),
        });
    }
    tracing::debug!(component = %def.name, uid = instance.uid, "component set up");
    Ok(())
}

impl ComponentInstance {
    /// Snapshot of what the next render needs.
    pub(crate) fn render_parts(&self) -> Option<(RenderFn, RenderContext)> {
        let render = self.render.clone()?;
        Some((
            render,
            RenderContext {
                props: self.props.clone(),
                setup_state: self.setup_state.clone(),
            },
        ))
    }

    /// The vnode currently representing this instance, if still alive.
    pub fn vnode(&self) -> Option<VNode> {
        self.vnode.upgrade().map(VNode)
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// The instance whose render tree contains this one.
    pub fn parent(&self) -> Option<ComponentHandle> {
        self.parent.upgrade()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.uid)
            .field("name", &self.def.name)
            .field("props", &self.props)
            .field("is_mounted", &self.is_mounted)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
