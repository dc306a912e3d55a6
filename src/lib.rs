//! # spark-vdom
//!
//! Reactive virtual-tree runtime for Rust.
//!
//! ## Architecture
//!
//! Reactive state feeds component render effects; their re-runs are batched
//! by the job scheduler and turned into host operations by the reconciler:
//!
//! ```text
//! write → trigger → queue_job → run_microtasks → flush_jobs
//!       → component render → patch(old, new) → HostAdapter calls
//! ```
//!
//! Everything is single-threaded. Each thread has its own dependency graph,
//! active effect and job queue.
//!
//! ## Modules
//!
//! - [`reactive`] - `reactive`, `create_ref`, `computed`, `effect`, track/trigger
//! - [`scheduler`] - job queue, `next_tick`, `flush_jobs`, microtask boundary
//! - [`vnode`] - virtual nodes and shape flags
//! - [`component`] - component definitions, instances and setup
//! - [`renderer`] - `patch` and the keyed children diff
//! - [`host`] - the host adapter contract and an in-memory surface
//! - [`app`] - `create_app` / `mount`
//! - [`config`] - renderer and scheduler settings
//! - [`error`] - error types
//!
//! ## Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use spark_vdom::*;
//!
//! let counter = ComponentDef::new("Counter")
//!     .with_setup(|_| {
//!         let count = create_ref(0);
//!         SetupResult::render(move |_| {
//!             let c = count.clone();
//!             h(
//!                 "button",
//!                 props! { "onClick" => PropValue::handler(move |_| c.update(|n| *n += 1)) },
//!                 count.get().to_string(),
//!             )
//!         })
//!     })
//!     .into_rc();
//!
//! let host = Rc::new(MemoryHost::new());
//! let root = host.create_root("app");
//! let mut app = create_app(host.clone(), counter, props! {});
//! app.mount(root)?;
//! ```

pub mod app;
pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod reactive;
pub mod renderer;
pub mod scheduler;
pub mod types;
pub mod vnode;

// Re-export commonly used items
pub use types::*;

pub use app::{create_app, App};

pub use component::{
    create_component_instance, setup_component, ComponentDef, ComponentHandle, ComponentInstance,
    RenderContext, RenderFn, SetupFn, SetupResult,
};

pub use config::{
    reset_scheduler_config, scheduler_config, set_scheduler_config, RendererConfig,
    SchedulerConfig,
};

pub use error::{HostError, RenderError, Result};

pub use host::{HostAdapter, HostOp, MemoryHost, TEXT_TAG};

pub use reactive::{
    computed, create_ref, effect, effect_with, reactive, schedule_run, track, trigger, untracked,
    Computed, Effect, EffectId, EffectOptions, Reactive, Ref,
};

pub use renderer::Renderer;

pub use scheduler::{flush_jobs, next_tick, queue_job, run_microtasks, tick, NextTick};

pub use vnode::{
    component_vnode, create_vnode, h, same_vnode_type, text_vnode, Children, VNode, VNodeType,
};

/// Route `tracing` output to the test harness. Safe to call from every test.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
