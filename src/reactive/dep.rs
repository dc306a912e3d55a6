//! Dependency graph - which effects read which `(target, key)` pairs.
//!
//! The graph is thread-local and built lazily:
//!
//! ```text
//! TargetId ──► key ──► Dep { effect, effect, ... }
//! ```
//!
//! An entry appears on the first tracked read and disappears when the target
//! is released (its last handle dropped) or when the last effect leaves it.
//!
//! Values removed from the graph are always moved out of the `RefCell` borrow
//! before they are dropped. Dropping an effect can drop the state its closure
//! captured, and that state releases its own entry here.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use indexmap::IndexMap;

use super::effect::{active_effect, schedule_run, Effect, EffectId};

/// Identity of a reactive source (a `Reactive` record, a `Ref`, a `Computed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

/// Effects that depend on one `(target, key)` pair, in subscription order.
pub(crate) type Dep = IndexMap<EffectId, Effect>;

// =============================================================================
// Graph State
// =============================================================================

thread_local! {
    static TARGET_MAP: RefCell<HashMap<TargetId, HashMap<String, Dep>>> = RefCell::new(HashMap::new());

    static NEXT_TARGET_ID: Cell<u64> = const { Cell::new(0) };
}

/// Allocate a fresh target identity.
pub(crate) fn new_target() -> TargetId {
    NEXT_TARGET_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        TargetId(id)
    })
}

// =============================================================================
// Track / Trigger
// =============================================================================

/// Record the active effect (if any) as a dependent of `(target, key)`.
pub fn track(target: TargetId, key: &str) {
    let Some(effect) = active_effect() else {
        return;
    };

    let inserted = TARGET_MAP.with(|map| {
        let mut map = map.borrow_mut();
        let deps = map.entry(target).or_default();
        if !deps.contains_key(key) {
            deps.insert(key.to_owned(), Dep::default());
        }
        let Some(dep) = deps.get_mut(key) else {
            return false;
        };
        if dep.contains_key(&effect.id()) {
            false
        } else {
            dep.insert(effect.id(), effect.clone());
            true
        }
    });

    if inserted {
        effect.record_dep(target, key);
    }
}

/// Notify every effect that depends on `(target, key)`.
///
/// The Dep is copied before anything fires, so an effect that re-subscribes
/// itself while running is still only scheduled once for this write. The
/// effect currently executing is skipped; it is already observing the latest
/// value.
pub fn trigger(target: TargetId, key: &str) {
    let effects: Vec<Effect> = TARGET_MAP.with(|map| {
        map.borrow()
            .get(&target)
            .and_then(|deps| deps.get(key))
            .map(|dep| dep.values().cloned().collect())
            .unwrap_or_default()
    });

    if effects.is_empty() {
        return;
    }

    let current = active_effect().map(|e| e.id());
    tracing::trace!(?target, key, dependents = effects.len(), "trigger");

    for effect in &effects {
        if Some(effect.id()) == current {
            continue;
        }
        schedule_run(effect);
    }
}

// =============================================================================
// Cleanup
// =============================================================================

/// Remove one effect from one Dep, dropping empty entries.
pub(crate) fn untrack(target: TargetId, key: &str, effect: EffectId) {
    let removed = TARGET_MAP.try_with(|map| {
        let mut map = map.borrow_mut();
        let deps = map.get_mut(&target)?;
        let dep = deps.get_mut(key)?;
        let removed = dep.shift_remove(&effect);
        if dep.is_empty() {
            deps.remove(key);
        }
        if deps.is_empty() {
            map.remove(&target);
        }
        removed
    });
    drop(removed);
}

/// Forget everything recorded for a target. Called when its last handle drops.
pub(crate) fn release_target(target: TargetId) {
    let removed = TARGET_MAP.try_with(|map| map.borrow_mut().remove(&target));
    drop(removed);
}

/// Number of effects currently recorded for `(target, key)`.
pub fn dependent_count(target: TargetId, key: &str) -> usize {
    TARGET_MAP.with(|map| {
        map.borrow()
            .get(&target)
            .and_then(|deps| deps.get(key))
            .map_or(0, IndexMap::len)
    })
}

/// Whether the graph holds any entry for `target`.
pub fn is_tracked(target: TargetId) -> bool {
    TARGET_MAP.with(|map| map.borrow().contains_key(&target))
}

// =============================================================================
// Tests
// =============================================================================
