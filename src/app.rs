//! Application entry point.
//!
//! ```ignore
//! let host = Rc::new(MemoryHost::new());
//! let root = host.create_root("app");
//!
//! let mut app = create_app(host.clone(), counter, props! { "start" => 1 });
//! app.mount(root)?;
//! // ... writes, then at the end of the tick:
//! run_microtasks()?;
//! app.unmount()?;
//! ```

use std::rc::Rc;

use crate::component::{ComponentDef, ComponentHandle};
use crate::error::{RenderError, Result};
use crate::host::HostAdapter;
use crate::renderer::Renderer;
use crate::types::{NodeId, Props};
use crate::vnode::{create_vnode, Children, VNode};

/// A root component bound to a renderer, mountable once at a time.
#[derive(Debug)]
pub struct App {
    renderer: Renderer,
    root: Rc<ComponentDef>,
    props: Props,
    mounted: Option<(VNode, NodeId)>,
}

/// Create an app for `root` over `host` with the default renderer config.
pub fn create_app(host: Rc<dyn HostAdapter>, root: Rc<ComponentDef>, props: Props) -> App {
    App::new(Renderer::new(host), root, props)
}

impl App {
    pub(crate) fn new(renderer: Renderer, root: Rc<ComponentDef>, props: Props) -> Self {
        Self {
            renderer,
            root,
            props,
            mounted: None,
        }
    }

    /// Build the root node and mount it into `container`.
    pub fn mount(&mut self, container: NodeId) -> Result<()> {
        if self.mounted.is_some() {
            return Err(RenderError::AlreadyMounted);
        }

        let props = (!self.props.is_empty()).then(|| self.props.clone());
        let vnode = create_vnode(self.root.clone(), props, Children::None);
        self.renderer.patch(None, &vnode, container, None)?;

        tracing::debug!(component = self.root.name(), %container, "app mounted");
        self.mounted = Some((vnode, container));
        Ok(())
    }

    /// Unmount the root and stop every component under it.
    pub fn unmount(&mut self) -> Result<()> {
        let (vnode, container) = self.mounted.take().ok_or(RenderError::NotMounted)?;
        self.renderer.unmount(&vnode)?;
        tracing::debug!(component = self.root.name(), %container, "app unmounted");
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Instance of the root component while mounted.
    pub fn root_instance(&self) -> Option<ComponentHandle> {
        self.mounted.as_ref().and_then(|(vnode, _)| vnode.component())
    }

    /// Host handle of the root component's rendered tree.
    pub fn root_element(&self) -> Option<NodeId> {
        self.mounted.as_ref().and_then(|(vnode, _)| vnode.el())
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::SetupResult;
    use crate::host::MemoryHost;
    use crate::props;
    use crate::reactive::create_ref;
    use crate::scheduler::{reset_scheduler, run_microtasks};
    use crate::types::PropValue;
    use crate::vnode::h;

    fn greeting() -> Rc<ComponentDef> {
        ComponentDef::new("Greeting")
            .with_render(|ctx| {
                let name = ctx.prop("name").map(ToString::to_string).unwrap_or_default();
                h("h1", props! {}, format!("hello {name}"))
            })
            .into_rc()
    }

    #[test]
    fn test_mount_renders_root_with_props() {
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root("app");
        let mut app = create_app(host.clone(), greeting(), props! { "name" => "ada" });

        app.mount(root).unwrap();
        assert!(app.is_mounted());
        assert_eq!(host.to_markup(root), "<app><h1>hello ada</h1></app>");
        assert_eq!(app.root_element(), host.children(root).first().copied());
        assert_eq!(
            app.root_instance().unwrap().borrow().props["name"],
            PropValue::from("ada")
        );
    }

    #[test]
    fn test_mount_twice_and_unmount_unmounted() {
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root("app");
        let mut app = create_app(host.clone(), greeting(), props! {});

        assert_eq!(app.unmount(), Err(RenderError::NotMounted));
        app.mount(root).unwrap();
        assert_eq!(app.mount(root), Err(RenderError::AlreadyMounted));

        app.unmount().unwrap();
        assert!(host.children(root).is_empty());
        assert!(app.root_instance().is_none());
    }

    #[test]
    fn test_event_driven_update() {
        reset_scheduler();
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root("app");

        let counter = ComponentDef::new("Counter")
            .with_setup(|_| {
                let count = create_ref(0_i64);
                SetupResult::render(move |_| {
                    let c = count.clone();
                    h(
                        "button",
                        props! { "onClick" => PropValue::handler(move |_| c.update(|n| *n += 1)) },
                        count.get().to_string(),
                    )
                })
            })
            .into_rc();

        let mut app = create_app(host.clone(), counter, props! {});
        app.mount(root).unwrap();
        let button = app.root_element().unwrap();

        host.dispatch(button, "click", PropValue::Null).unwrap();
        host.dispatch(button, "click", PropValue::Null).unwrap();
        assert_eq!(host.to_markup(root), "<app><button>0</button></app>");

        run_microtasks().unwrap();
        assert_eq!(host.to_markup(root), "<app><button>2</button></app>");
        assert_eq!(app.root_element(), Some(button));
    }

    #[test]
    fn test_renderer_create_app_uses_its_config() {
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root("app");
        let renderer = Renderer::with_config(
            host.clone(),
            crate::config::RendererConfig::default().with_optimize_moves(false),
        );
        let mut app = renderer.create_app(greeting(), props! { "name" => "bo" });
        app.mount(root).unwrap();
        assert!(!app.renderer().config().optimize_moves);
        assert_eq!(host.to_markup(root), "<app><h1>hello bo</h1></app>");
    }
}
