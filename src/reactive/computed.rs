//! Computed - memoized derived value.
//!
//! A `Computed` is a lazy effect plus a dirty flag:
//!
//! ```text
//! source write ──► runner's scheduler ──► dirty = true ──► trigger(computed, "value")
//!                                                            │
//!                             effects that read the computed ◄┘
//! ```
//!
//! The getter only runs on a read while dirty. Invalidation happens at most
//! once between two reads, however many sources change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::dep::{self, TargetId};
use super::effect::{Effect, EffectOptions};
use super::state::VALUE_KEY;

struct ComputedInner<T> {
    target: TargetId,
    dirty: Rc<Cell<bool>>,
    value: Rc<RefCell<Option<T>>>,
    runner: Effect,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.runner.stop();
        dep::release_target(self.target);
    }
}

/// Memoized value derived from other reactive state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a [`Computed`] from a getter. Nothing runs until the first read.
///
/// ```ignore
/// let count = create_ref(2);
/// let c = count.clone();
/// let doubled = computed(move || c.get() * 2);
/// assert_eq!(doubled.get(), 4);
/// ```
pub fn computed<T: 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    let target = dep::new_target();
    let dirty = Rc::new(Cell::new(true));
    let value: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));

    let value_for_runner = value.clone();
    let dirty_for_scheduler = dirty.clone();

    let runner = Effect::create(
        Box::new(move || {
            let next = getter();
            *value_for_runner.borrow_mut() = Some(next);
            Ok(())
        }),
        EffectOptions::lazy().with_scheduler(move |_| {
            if !dirty_for_scheduler.get() {
                dirty_for_scheduler.set(true);
                dep::trigger(target, VALUE_KEY);
            }
        }),
    );

    Computed {
        inner: Rc::new(ComputedInner {
            target,
            dirty,
            value,
            runner,
        }),
    }
}

impl<T> Computed<T> {
    pub fn target(&self) -> TargetId {
        self.inner.target
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Tracked read through a closure, recomputing first if dirty.
    ///
    /// # Panics
    ///
    /// If the getter reads this same computed (a dependency cycle).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if self.inner.dirty.get() {
            if self.inner.runner.is_running() {
                panic!("computed value read while it is being computed");
            }
            // The runner body never returns an error.
            let _ = self.inner.runner.run();
            self.inner.dirty.set(false);
        }
        dep::track(self.inner.target, VALUE_KEY);
        let value = self.inner.value.borrow();
        match value.as_ref() {
            Some(value) => f(value),
            None => panic!("computed value read while it is being computed"),
        }
    }
}

impl<T: Clone> Computed<T> {
    /// Tracked read of the memoized value.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("target", &self.inner.target)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
