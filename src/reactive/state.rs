//! Reactive state containers.
//!
//! - [`Reactive`] - keyed record; every field is tracked on its own
//! - [`Ref`] - a single tracked cell, stored under the fixed key `"value"`
//!
//! There is no language-level interception: reads go through `get`/`with`
//! (which track) and writes go through `set`/`remove`/`update` (which
//! trigger). Writes always release their borrow before triggering, so an
//! effect that runs synchronously can read the new value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::dep::{self, TargetId};

/// Key under which a [`Ref`] (and a `Computed`) tracks its value.
pub const VALUE_KEY: &str = "value";

// =============================================================================
// Reactive Record
// =============================================================================

struct ReactiveInner<V> {
    target: TargetId,
    fields: RefCell<IndexMap<String, V>>,
}

impl<V> Drop for ReactiveInner<V> {
    fn drop(&mut self) {
        dep::release_target(self.target);
    }
}

/// Keyed record whose field reads are tracked and whose writes trigger.
///
/// Clones share the same record.
pub struct Reactive<V> {
    inner: Rc<ReactiveInner<V>>,
}

impl<V> Clone for Reactive<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Wrap a set of fields in a [`Reactive`] record.
///
/// ```ignore
/// let state = reactive([("count", 0), ("step", 1)]);
/// state.set("count", state.get("count").unwrap_or(0) + 1);
/// ```
pub fn reactive<V, K, I>(fields: I) -> Reactive<V>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    Reactive {
        inner: Rc::new(ReactiveInner {
            target: dep::new_target(),
            fields: RefCell::new(fields.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }),
    }
}

impl<V> Reactive<V> {
    pub fn target(&self) -> TargetId {
        self.inner.target
    }

    /// Tracked read through a closure, without cloning.
    ///
    /// # Panics
    ///
    /// The record stays borrowed while `f` runs, so `set` or `remove` on the
    /// same record from inside `f` panics. Use [`Reactive::get`] to read a
    /// copy first when the closure needs to write back.
    pub fn with<R>(&self, key: &str, f: impl FnOnce(Option<&V>) -> R) -> R {
        dep::track(self.inner.target, key);
        f(self.inner.fields.borrow().get(key))
    }

    /// Tracked presence check.
    pub fn contains_key(&self, key: &str) -> bool {
        dep::track(self.inner.target, key);
        self.inner.fields.borrow().contains_key(key)
    }

    /// Write a field, then notify its dependents.
    ///
    /// Every write triggers, even when the value is unchanged.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let previous = self.inner.fields.borrow_mut().insert(key.clone(), value);
        drop(previous);
        dep::trigger(self.inner.target, &key);
    }

    /// Remove a field, notifying its dependents if it existed.
    pub fn remove(&self, key: &str) -> Option<V> {
        let removed = self.inner.fields.borrow_mut().shift_remove(key);
        if removed.is_some() {
            dep::trigger(self.inner.target, key);
        }
        removed
    }

    /// Untracked field names, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }
}

impl<V: Clone> Reactive<V> {
    /// Tracked read of one field.
    pub fn get(&self, key: &str) -> Option<V> {
        self.with(key, |value| value.cloned())
    }
}

impl<V: fmt::Debug> fmt::Debug for Reactive<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.inner.target)
            .field("fields", &self.inner.fields.borrow())
            .finish()
    }
}

// =============================================================================
// Ref - Single tracked cell
// =============================================================================

struct RefInner<T> {
    target: TargetId,
    value: RefCell<T>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        dep::release_target(self.target);
    }
}

/// Single tracked value.
pub struct Ref<T> {
    inner: Rc<RefInner<T>>,
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a [`Ref`] holding `value`.
pub fn create_ref<T>(value: T) -> Ref<T> {
    Ref::new(value)
}

impl<T> Ref<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefInner {
                target: dep::new_target(),
                value: RefCell::new(value),
            }),
        }
    }

    pub fn target(&self) -> TargetId {
        self.inner.target
    }

    /// Tracked read through a closure.
    ///
    /// # Panics
    ///
    /// The value stays borrowed while `f` runs; calling `update` on the same
    /// ref from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        dep::track(self.inner.target, VALUE_KEY);
        f(&*self.inner.value.borrow())
    }

    /// Mutate in place and notify dependents unconditionally.
    ///
    /// # Panics
    ///
    /// The value is mutably borrowed while `f` runs; reading the same ref from
    /// inside `f` panics. Dependents are notified after the borrow ends, so
    /// they are free to read.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self.inner.value.borrow_mut());
        dep::trigger(self.inner.target, VALUE_KEY);
    }
}

impl<T: Clone> Ref<T> {
    /// Tracked read.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Untracked read.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq> Ref<T> {
    /// Store a new value. Dependents are notified only if it differs.
    pub fn set(&self, value: T) {
        let previous = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            std::mem::replace(&mut *current, value)
        };
        drop(previous);
        dep::trigger(self.inner.target, VALUE_KEY);
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("target", &self.inner.target)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
