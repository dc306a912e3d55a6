//! Reconciler - turns virtual trees into host operations.
//!
//! A [`Renderer`] owns a host adapter and its configuration. Everything it
//! does goes through [`Renderer::patch`]:
//!
//! ```text
//! patch(old, next)
//!   ├─ text marker        → create / set text
//!   ├─ ELEMENT            → mount_element | patch_props + patch_children
//!   │                                         └─ array/array → keyed diff
//!   └─ STATEFUL_COMPONENT → mount_component (update effect) | carry instance
//! ```
//!
//! - [`patch`] - the dispatch, element and component paths, unmount
//! - [`keyed`] - the keyed children diff
//!
//! # Example
//!
//! ```ignore
//! let host = Rc::new(MemoryHost::new());
//! let root = host.create_root("root");
//! let renderer = Renderer::new(host.clone());
//!
//! renderer.render(&h("p", props! {}, "one"), root)?;
//! renderer.render(&h("p", props! {}, "two"), root)?; // one set_element_text
//! ```

mod keyed;
mod patch;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::app::App;
use crate::component::ComponentDef;
use crate::config::RendererConfig;
use crate::error::Result;
use crate::host::HostAdapter;
use crate::types::{NodeId, Props};
use crate::vnode::VNode;

/// Reconciler bound to one host surface.
///
/// Clones share the host and the per-container root table. Component update
/// effects hold a clone.
#[derive(Clone)]
pub struct Renderer {
    host: Rc<dyn HostAdapter>,
    config: RendererConfig,
    /// Last tree rendered into each container through [`Renderer::render`].
    roots: Rc<RefCell<HashMap<NodeId, VNode>>>,
}

impl Renderer {
    pub fn new(host: Rc<dyn HostAdapter>) -> Self {
        Self::with_config(host, RendererConfig::default())
    }

    pub fn with_config(host: Rc<dyn HostAdapter>, config: RendererConfig) -> Self {
        Self {
            host,
            config,
            roots: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn host(&self) -> &Rc<dyn HostAdapter> {
        &self.host
    }

    pub fn config(&self) -> RendererConfig {
        self.config
    }

    /// Render a bare tree into `container`.
    ///
    /// The first call mounts; later calls diff against the previous tree in
    /// the same container.
    pub fn render(&self, vnode: &VNode, container: NodeId) -> Result<()> {
        let previous = self.roots.borrow().get(&container).cloned();
        self.patch(previous.as_ref(), vnode, container, None)?;
        self.roots.borrow_mut().insert(container, vnode.clone());
        Ok(())
    }

    /// Unmount whatever [`render`](Self::render) put into `container`.
    pub fn clear(&self, container: NodeId) -> Result<()> {
        let previous = self.roots.borrow_mut().remove(&container);
        match previous {
            Some(vnode) => self.unmount(&vnode),
            None => Ok(()),
        }
    }

    /// App handle for a root component rendered by this renderer.
    pub fn create_app(&self, root: Rc<ComponentDef>, props: Props) -> App {
        App::new(self.clone(), root, props)
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("roots", &self.roots.borrow().len())
            .finish()
    }
}
