//! Patch dispatch, element and component processing, unmount.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::Renderer;
use crate::component::{
    create_component_instance, setup_component, ComponentHandle, ComponentInstance,
};
use crate::error::{RenderError, Result};
use crate::host::TEXT_TAG;
use crate::reactive::{untracked, Effect, EffectOptions};
use crate::scheduler::queue_job;
use crate::types::{NodeId, Props, ShapeFlags, KEY_PROP};
use crate::vnode::{same_vnode_type, Children, VNode, VNodeType};

pub(crate) fn missing_element(node: &VNode) -> RenderError {
    RenderError::MissingElement {
        node: node.node_type().name().to_owned(),
    }
}

/// Whether a node from an earlier patch made it onto the host.
///
/// A patch that failed partway leaves nodes behind that never did.
fn reached_host(node: &VNode) -> bool {
    if node.node_type().is_component() {
        node.component().is_some_and(|instance| instance.borrow().is_mounted)
    } else {
        node.el().is_some()
    }
}

// =============================================================================
// Render stack
// =============================================================================

thread_local! {
    /// Instances whose render output is being patched, innermost last.
    static RENDERING: RefCell<Vec<Weak<RefCell<ComponentInstance>>>> =
        const { RefCell::new(Vec::new()) };
}

struct RenderingGuard;

impl RenderingGuard {
    fn enter(instance: &ComponentHandle) -> Self {
        RENDERING.with(|stack| stack.borrow_mut().push(Rc::downgrade(instance)));
        RenderingGuard
    }
}

impl Drop for RenderingGuard {
    fn drop(&mut self) {
        let _ = RENDERING.try_with(|stack| stack.borrow_mut().pop());
    }
}

fn rendering_parent() -> Weak<RefCell<ComponentInstance>> {
    RENDERING
        .with(|stack| stack.borrow().last().cloned())
        .unwrap_or_default()
}

/// Give `el` to every ancestor component whose sub-tree root is `vnode`.
fn lift_el(instance: &ComponentHandle, vnode: &VNode, el: Option<NodeId>) {
    let mut child = vnode.clone();
    let mut parent = instance.borrow().parent();
    while let Some(outer) = parent {
        let (sub_tree, outer_vnode, next) = {
            let outer = outer.borrow();
            (outer.sub_tree.clone(), outer.vnode(), outer.parent())
        };
        if !sub_tree.is_some_and(|tree| tree.ptr_eq(&child)) {
            break;
        }
        let Some(outer_vnode) = outer_vnode else {
            break;
        };
        outer_vnode.set_el(el);
        child = outer_vnode;
        parent = next;
    }
}

impl Renderer {
    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Reconcile `next` against `old` inside `container`.
    ///
    /// With no `old`, `next` is mounted before `anchor` (or appended). A
    /// different logical node in `old` is replaced: `next` is mounted where
    /// `old` sits, then `old` is unmounted.
    pub fn patch(
        &self,
        old: Option<&VNode>,
        next: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        let mut anchor = anchor;
        let old = match old {
            Some(old) if old.ptr_eq(next) => return Ok(()),
            Some(old) if !same_vnode_type(old, next) => {
                tracing::debug!(old = old.node_type().name(), new = next.node_type().name(), "replacing node");
                anchor = old.el().or(anchor);
                self.patch(None, next, container, anchor)?;
                return self.unmount(old);
            }
            Some(old) if !reached_host(old) => {
                tracing::debug!(node = old.node_type().name(), "previous node never reached the host, mounting fresh");
                None
            }
            old => old,
        };

        if matches!(next.node_type(), VNodeType::Text) {
            return self.process_text(old, next, container, anchor);
        }

        let shape = next.shape_flag();
        if shape.contains(ShapeFlags::ELEMENT) {
            self.process_element(old, next, container, anchor)
        } else if shape.contains(ShapeFlags::STATEFUL_COMPONENT) {
            self.process_component(old, next, container, anchor)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Text
    // =========================================================================

    fn process_text(
        &self,
        old: Option<&VNode>,
        next: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        let text = next.children().as_text().unwrap_or_default();
        match old {
            None => {
                let el = self.host.create_element(TEXT_TAG)?;
                self.host.set_element_text(el, text)?;
                self.host.insert(el, container, anchor)?;
                next.set_el(Some(el));
            }
            Some(old) => {
                let el = old.el().ok_or_else(|| missing_element(old))?;
                next.set_el(Some(el));
                if old.children().as_text() != Some(text) {
                    self.host.set_element_text(el, text)?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Elements
    // =========================================================================

    fn process_element(
        &self,
        old: Option<&VNode>,
        next: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        match old {
            None => self.mount_element(next, container, anchor),
            Some(old) => self.patch_element(old, next),
        }
    }

    fn mount_element(&self, next: &VNode, container: NodeId, anchor: Option<NodeId>) -> Result<()> {
        let tag = next.node_type().name();
        let el = self.host.create_element(tag)?;

        match next.children() {
            Children::Text(text) => self.host.set_element_text(el, text)?,
            Children::Nodes(children) => self.mount_children(children, el, None)?,
            Children::None => {}
        }

        if let Some(props) = next.props() {
            for (key, value) in props {
                if key != KEY_PROP {
                    self.host.patch_prop(el, key, None, Some(value))?;
                }
            }
        }

        self.host.insert(el, container, anchor)?;
        // Only an attached element counts as mounted.
        next.set_el(Some(el));
        tracing::debug!(tag, %el, "mounted element");
        Ok(())
    }

    fn patch_element(&self, old: &VNode, next: &VNode) -> Result<()> {
        let el = old.el().ok_or_else(|| missing_element(old))?;
        next.set_el(Some(el));
        self.patch_props(el, old.props(), next.props())?;
        self.patch_children(old, next, el)
    }

    /// Emit the minimal set of `patch_prop` calls turning `old` into `next`.
    ///
    /// Changed or added keys are set, keys only in `old` are removed and
    /// unchanged keys produce no call.
    pub fn patch_props(&self, el: NodeId, old: Option<&Props>, next: Option<&Props>) -> Result<()> {
        let empty = Props::new();
        let old = old.unwrap_or(&empty);
        let next = next.unwrap_or(&empty);

        for (key, value) in next {
            if key == KEY_PROP {
                continue;
            }
            let prev = old.get(key);
            if prev != Some(value) {
                self.host.patch_prop(el, key, prev, Some(value))?;
            }
        }
        for (key, value) in old {
            if key != KEY_PROP && !next.contains_key(key) {
                self.host.patch_prop(el, key, Some(value), None)?;
            }
        }
        Ok(())
    }

    fn patch_children(&self, old: &VNode, next: &VNode, el: NodeId) -> Result<()> {
        match (old.children(), next.children()) {
            (previous, Children::Text(text)) => {
                if previous.as_text() != Some(text.as_str()) {
                    if let Children::Nodes(children) = previous {
                        // The text write detaches them; only their instances need stopping.
                        children.iter().for_each(|child| self.teardown(child));
                    }
                    self.host.set_element_text(el, text)?;
                }
                Ok(())
            }
            (Children::Nodes(c1), Children::Nodes(c2)) => self.patch_keyed_children(c1, c2, el, None),
            (Children::None, Children::Nodes(c2)) => self.mount_children(c2, el, None),
            (Children::Nodes(c1), Children::None) => self.unmount_children(c1),
            (Children::Text(_), Children::None) => Ok(self.host.set_element_text(el, "")?),
            (Children::Text(_), Children::Nodes(c2)) => {
                if self.config.strict_children {
                    return Err(RenderError::UnsupportedChildren {
                        from: old.children().shape_name(),
                        to: next.children().shape_name(),
                    });
                }
                self.host.set_element_text(el, "")?;
                self.mount_children(c2, el, None)
            }
            (Children::None, Children::None) => Ok(()),
        }
    }

    pub(crate) fn mount_children(
        &self,
        children: &[VNode],
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        for child in children {
            self.patch(None, child, container, anchor)?;
        }
        Ok(())
    }

    fn unmount_children(&self, children: &[VNode]) -> Result<()> {
        for child in children {
            self.unmount(child)?;
        }
        Ok(())
    }

    // =========================================================================
    // Components
    // =========================================================================

    fn process_component(
        &self,
        old: Option<&VNode>,
        next: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        match old {
            None => self.mount_component(next, container, anchor),
            Some(old) => self.update_component(old, next),
        }
    }

    fn mount_component(&self, next: &VNode, container: NodeId, anchor: Option<NodeId>) -> Result<()> {
        let instance = create_component_instance(next).ok_or_else(|| missing_element(next))?;
        instance.borrow_mut().parent = rendering_parent();
        next.set_component(Some(instance.clone()));
        setup_component(&instance)?;
        self.setup_render_effect(&instance, container, anchor)
    }

    /// Install the instance's update effect and run it once to mount.
    ///
    /// Later triggers go through the job queue, so any number of writes in
    /// one tick re-render the component once.
    fn setup_render_effect(
        &self,
        instance: &ComponentHandle,
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        let weak = Rc::downgrade(instance);
        let renderer = self.clone();
        let mut mount_anchor = anchor;

        let update = Effect::try_new(
            move || {
                let Some(instance) = weak.upgrade() else {
                    return Ok(());
                };
                renderer.render_component(&instance, container, mount_anchor.take())
            },
            EffectOptions::lazy().with_scheduler(queue_job),
        )?;
        instance.borrow_mut().update = Some(update.clone());

        if let Err(err) = update.run() {
            update.stop();
            return Err(err);
        }
        Ok(())
    }

    /// Body of a component's update effect: render, then mount or diff.
    fn render_component(
        &self,
        instance: &ComponentHandle,
        container: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        let (parts, previous, name, uid) = {
            let instance = instance.borrow();
            (
                instance.render_parts(),
                instance.sub_tree.clone(),
                instance.name().to_owned(),
                instance.uid,
            )
        };
        let Some((render, ctx)) = parts else {
            return Err(RenderError::MissingRender { component: name });
        };

        // Reads during render are this component's dependencies.
        let tree = render(&ctx);
        let patched = {
            let _rendering = RenderingGuard::enter(instance);
            untracked(|| self.patch(previous.as_ref(), &tree, container, anchor))
        };

        // Even a failed patch may have moved host nodes over to `tree`; the
        // next run diffs against it.
        let vnode = {
            let mut instance = instance.borrow_mut();
            instance.sub_tree = Some(tree.clone());
            if patched.is_ok() {
                instance.is_mounted = true;
            }
            instance.vnode()
        };
        // A root element is only set once it is attached.
        if let (Some(vnode), Some(el)) = (vnode, tree.el()) {
            vnode.set_el(Some(el));
            lift_el(instance, &vnode, Some(el));
        }
        patched?;

        if previous.is_some() {
            tracing::debug!(component = %name, uid, "updated component");
        } else {
            tracing::debug!(component = %name, uid, "mounted component");
        }
        Ok(())
    }

    /// A parent re-render reached an existing component node.
    ///
    /// The instance and host handle move to the new node. Changed props are
    /// stored and the instance's own update is queued.
    fn update_component(&self, old: &VNode, next: &VNode) -> Result<()> {
        let instance = old.component().ok_or_else(|| missing_element(old))?;
        next.set_component(Some(instance.clone()));
        next.set_el(old.el());

        let (changed, update) = {
            let mut instance = instance.borrow_mut();
            instance.vnode = Rc::downgrade(&next.0);
            let props = next.props().cloned().unwrap_or_default();
            let changed = instance.props != props;
            if changed {
                instance.props = props;
            }
            (changed, instance.update.clone())
        };

        if changed {
            if let Some(update) = update {
                tracing::debug!(component = next.node_type().name(), "props changed, queueing update");
                queue_job(&update);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Unmount
    // =========================================================================

    /// Remove a mounted node from the host and stop every component inside it.
    pub fn unmount(&self, vnode: &VNode) -> Result<()> {
        self.teardown(vnode);
        if let Some(el) = vnode.el() {
            self.host.remove(el)?;
            tracing::debug!(node = vnode.node_type().name(), %el, "unmounted");
        }
        Ok(())
    }

    /// Stop component instances in a subtree without touching the host.
    fn teardown(&self, vnode: &VNode) {
        if let Some(instance) = vnode.component() {
            let (update, sub_tree) = {
                let mut instance = instance.borrow_mut();
                instance.is_mounted = false;
                (instance.update.take(), instance.sub_tree.clone())
            };
            if let Some(update) = update {
                update.stop();
            }
            if let Some(sub_tree) = sub_tree {
                self.teardown(&sub_tree);
            }
        } else if let Children::Nodes(children) = vnode.children() {
            children.iter().for_each(|child| self.teardown(child));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
