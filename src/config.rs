//! Runtime configuration.
//!
//! - [`RendererConfig`] - per-renderer switches, passed to
//!   [`Renderer::with_config`](crate::renderer::Renderer::with_config)
//! - [`SchedulerConfig`] - settings of the thread-local job scheduler,
//!   read on every flush
//!
//! # Example
//!
//! ```ignore
//! use spark_vdom::config::{set_scheduler_config, SchedulerConfig};
//!
//! set_scheduler_config(SchedulerConfig { max_flush_jobs: 500 });
//! ```

use std::cell::Cell;

// =============================================================================
// Renderer Config
// =============================================================================

/// Switches that change how the reconciler emits host operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    /// Skip re-inserting matched list nodes that sit on the longest run of
    /// already-ordered nodes. When off, every matched node in a reordered
    /// window is re-inserted before its right neighbour.
    pub optimize_moves: bool,

    /// Treat text children becoming array children as an error. When off,
    /// the old text is cleared and the new children are mounted.
    pub strict_children: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            optimize_moves: true,
            strict_children: true,
        }
    }
}

impl RendererConfig {
    pub fn with_optimize_moves(mut self, enabled: bool) -> Self {
        self.optimize_moves = enabled;
        self
    }

    pub fn with_strict_children(mut self, enabled: bool) -> Self {
        self.strict_children = enabled;
        self
    }
}

// =============================================================================
// Scheduler Config
// =============================================================================

/// Default cap on jobs run by one flush.
pub const DEFAULT_MAX_FLUSH_JOBS: usize = 10_000;

/// Settings of the job scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Jobs a single flush may run before it gives up and drops the queue.
    pub max_flush_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_flush_jobs: DEFAULT_MAX_FLUSH_JOBS,
        }
    }
}

thread_local! {
    static SCHEDULER_CONFIG: Cell<SchedulerConfig> = Cell::new(SchedulerConfig::default());
}

/// Current scheduler settings for this thread.
pub fn scheduler_config() -> SchedulerConfig {
    SCHEDULER_CONFIG.with(Cell::get)
}

/// Replace the scheduler settings for this thread.
pub fn set_scheduler_config(config: SchedulerConfig) {
    SCHEDULER_CONFIG.with(|c| c.set(config));
}

/// Restore default scheduler settings.
pub fn reset_scheduler_config() {
    set_scheduler_config(SchedulerConfig::default());
}
