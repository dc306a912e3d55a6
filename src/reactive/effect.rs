//! Effects - re-runnable computations that track what they read.
//!
//! While an effect runs it is the thread's *active effect*: every tracked read
//! records it in the dependency graph. A write to anything it read later
//! re-runs it, or hands it to its scheduler if it has one.
//!
//! ```ignore
//! let count = create_ref(0);
//! let c = count.clone();
//! let e = effect(move || println!("count = {}", c.get()));
//! count.set(1); // prints "count = 1"
//! e.stop();
//! ```
//!
//! Before every run an effect leaves all the Deps it joined last time, so
//! reads that stop happening (a branch not taken anymore) stop triggering it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::dep::{self, TargetId};
use crate::error::Result;

/// Boxed body of an effect.
pub(crate) type EffectFn = Box<dyn FnMut() -> Result<()>>;

/// Scheduler hook: receives the triggered effect instead of it running directly.
pub type Scheduler = Rc<dyn Fn(&Effect)>;

/// Identity of an effect, used for dedup in Deps and in the job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

// =============================================================================
// Options
// =============================================================================

/// Creation options for [`effect_with`] and [`Effect::try_new`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Skip the initial run. The effect collects nothing until run explicitly.
    pub lazy: bool,
    /// Called on trigger instead of running the effect.
    pub scheduler: Option<Scheduler>,
}

impl EffectOptions {
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: impl Fn(&Effect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

// =============================================================================
// Active Effect
// =============================================================================

thread_local! {
    static ACTIVE_EFFECT: RefCell<Option<Effect>> = const { RefCell::new(None) };

    static NEXT_EFFECT_ID: Cell<u64> = const { Cell::new(0) };
}

/// The effect currently collecting dependencies, if any.
pub(crate) fn active_effect() -> Option<Effect> {
    ACTIVE_EFFECT.with(|active| active.borrow().clone())
}

/// Whether a read right now would be tracked.
pub fn is_tracking() -> bool {
    ACTIVE_EFFECT.with(|active| active.borrow().is_some())
}

/// Swaps the active effect and restores the previous one on drop, so nested
/// runs (a parent render mounting a child component) and unwinding panics
/// both leave the pointer where it was.
struct ActiveEffectGuard {
    previous: Option<Effect>,
}

impl ActiveEffectGuard {
    fn replace(effect: Option<Effect>) -> Self {
        let previous = ACTIVE_EFFECT.with(|active| active.replace(effect));
        Self { previous }
    }
}

impl Drop for ActiveEffectGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = ACTIVE_EFFECT.try_with(|active| *active.borrow_mut() = previous);
    }
}

/// Clears the running flag on drop.
struct RunningGuard<'a>(&'a Cell<bool>);

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Run `f` without tracking any reads.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ActiveEffectGuard::replace(None);
    f()
}

// =============================================================================
// Effect
// =============================================================================

struct EffectInner {
    id: EffectId,
    f: RefCell<EffectFn>,
    scheduler: Option<Scheduler>,
    lazy: bool,
    /// `(target, key)` pairs joined during the last run.
    deps: RefCell<Vec<(TargetId, String)>>,
    active: Cell<bool>,
    running: Cell<bool>,
}

/// Handle to an effect. Clones share the same effect.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub(crate) fn create(f: EffectFn, options: EffectOptions) -> Self {
        let id = NEXT_EFFECT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            EffectId(id)
        });
        Self {
            inner: Rc::new(EffectInner {
                id,
                f: RefCell::new(f),
                scheduler: options.scheduler,
                lazy: options.lazy,
                deps: RefCell::new(Vec::new()),
                active: Cell::new(true),
                running: Cell::new(false),
            }),
        }
    }

    /// Create an effect whose body can fail.
    ///
    /// Unless `options.lazy`, the body runs once right away and its error,
    /// if any, is returned instead of the effect.
    pub fn try_new(
        f: impl FnMut() -> Result<()> + 'static,
        options: EffectOptions,
    ) -> Result<Self> {
        let effect = Self::create(Box::new(f), options);
        if !effect.inner.lazy {
            effect.run()?;
        }
        Ok(effect)
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// False once [`stop`](Self::stop) was called.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    pub fn has_scheduler(&self) -> bool {
        self.inner.scheduler.is_some()
    }

    /// Number of `(target, key)` pairs this effect depends on right now.
    pub fn dep_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Run the body now, re-collecting dependencies.
    ///
    /// Stopped effects do nothing. A run requested while the effect is
    /// already on the stack is skipped.
    pub fn run(&self) -> Result<()> {
        if !self.inner.active.get() {
            return Ok(());
        }
        if self.inner.running.get() {
            tracing::warn!(effect = self.inner.id.0, "skipping re-entrant effect run");
            return Ok(());
        }

        let _running = RunningGuard::enter(&self.inner.running);
        self.cleanup();
        let _active = ActiveEffectGuard::replace(Some(self.clone()));
        let mut f = self.inner.f.borrow_mut();
        f()
    }

    /// Detach from every Dep and turn future runs into no-ops.
    pub fn stop(&self) {
        if self.inner.active.replace(false) {
            self.cleanup();
        }
    }

    pub(crate) fn record_dep(&self, target: TargetId, key: &str) {
        self.inner.deps.borrow_mut().push((target, key.to_owned()));
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.inner.deps.borrow_mut());
        for (target, key) in deps {
            dep::untrack(target, &key, self.inner.id);
        }
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.get())
            .field("lazy", &self.inner.lazy)
            .field("scheduler", &self.inner.scheduler.is_some())
            .finish()
    }
}

// =============================================================================
// Constructors and Dispatch
// =============================================================================

/// Create an effect and run it once to collect its dependencies.
pub fn effect(f: impl FnMut() + 'static) -> Effect {
    effect_with(f, EffectOptions::default())
}

/// Create an effect with options (`lazy`, `scheduler`).
pub fn effect_with(mut f: impl FnMut() + 'static, options: EffectOptions) -> Effect {
    let effect = Effect::create(
        Box::new(move || {
            f();
            Ok(())
        }),
        options,
    );
    if !effect.is_lazy() {
        run_logged(&effect);
    }
    effect
}

/// Dispatch a triggered effect: its scheduler if it has one, else run it now.
pub fn schedule_run(effect: &Effect) {
    match &effect.inner.scheduler {
        Some(scheduler) => scheduler(effect),
        None => run_logged(effect),
    }
}

/// Synchronous runs started by a write have no caller to report to.
fn run_logged(effect: &Effect) {
    if let Err(err) = effect.run() {
        tracing::error!(effect = effect.inner.id.0, error = %err, "effect failed");
    }
}

// =============================================================================
// Tests
// =============================================================================
