//! Reactive core - dependency tracking and re-execution.
//!
//! - [`dep`] - the `(target, key) → effects` graph, `track` and `trigger`
//! - [`effect`] - [`Effect`], the active-effect pointer, `schedule_run`
//! - [`state`] - [`Reactive`] records and [`Ref`] cells
//! - [`computed`] - [`Computed`] memoized values
//!
//! # Flow
//!
//! ```text
//! effect runs ──► reads Reactive/Ref/Computed ──► track(target, key)
//! write       ──► trigger(target, key) ──► schedule_run(effect)
//!                                            ├─ scheduler(effect)   (queued)
//!                                            └─ effect.run()        (now)
//! ```
//!
//! All state is thread-local. One thread is one reactive world.

pub mod computed;
pub mod dep;
pub mod effect;
pub mod state;

pub use computed::{computed, Computed};
pub use dep::{track, trigger, TargetId};
pub use effect::{
    effect, effect_with, is_tracking, schedule_run, untracked, Effect, EffectId, EffectOptions,
    Scheduler,
};
pub use state::{create_ref, reactive, Reactive, Ref, VALUE_KEY};
