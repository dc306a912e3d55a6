//! Error types for the runtime.
//!
//! Two layers:
//! - [`HostError`] - raised by a [`HostAdapter`](crate::host::HostAdapter) implementation
//! - [`RenderError`] - everything the reconciler, component setup and the
//!   scheduler can report. Host errors convert into it unchanged.
//!
//! Nothing in the runtime retries. Errors either fail a mount outright or are
//! handed back to whoever called `patch`, `mount` or the flush.

use thiserror::Error;

use crate::types::NodeId;

/// Convenience alias used across the crate.
pub type Result<T, E = RenderError> = std::result::Result<T, E>;

/// Failure reported by a host adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The handle does not name a node on this surface.
    #[error("unknown host node {0}")]
    UnknownNode(NodeId),

    /// Insert was asked to place a node before an anchor that is not a child
    /// of the target parent.
    #[error("anchor {anchor} is not a child of {parent}")]
    InvalidAnchor { anchor: NodeId, parent: NodeId },

    /// Inserting would make a node its own ancestor.
    #[error("cannot insert {child} into its own subtree at {parent}")]
    Cycle { child: NodeId, parent: NodeId },

    /// Anything else the concrete surface wants to report.
    #[error("host surface error: {0}")]
    Surface(String),
}

/// Failure reported by the reconciler, component setup or the scheduler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A component produced neither a render function from `setup` nor a
    /// static `render`.
    #[error("component `{component}` has no render function: setup returned none and no static render is defined")]
    MissingRender { component: String },

    /// An old/new children pair mixes text and array children.
    #[error("cannot reconcile {from} children into {to} children")]
    UnsupportedChildren {
        from: &'static str,
        to: &'static str,
    },

    /// A node that should be mounted carries no host handle.
    #[error("virtual node <{node}> has no host element; was it mounted?")]
    MissingElement { node: String },

    /// `App::mount` was called on an app that is already mounted.
    #[error("app is already mounted")]
    AlreadyMounted,

    /// `App::unmount` was called on an app that was never mounted.
    #[error("app is not mounted")]
    NotMounted,

    /// A scheduled job panicked. The flush carried on with the other jobs.
    #[error("job panicked: {message}")]
    JobPanicked { message: String },

    /// A single flush ran more jobs than the configured limit, which usually
    /// means a render keeps mutating state it depends on.
    #[error("flush exceeded {limit} jobs; the remaining queue was dropped")]
    FlushLimitExceeded { limit: usize },

    /// More than one job failed during a flush.
    #[error("{} jobs failed during flush", failures.len())]
    JobsFailed { failures: Vec<RenderError> },

    /// Error raised by the host adapter.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl RenderError {
    /// Fold a list of failures into a single result.
    ///
    /// No failures is `Ok`, one failure is returned as-is, several are wrapped
    /// in [`RenderError::JobsFailed`] (nested aggregates are flattened).
    pub(crate) fn collect(failures: Vec<RenderError>) -> Result<()> {
        let mut flat = Vec::with_capacity(failures.len());
        for failure in failures {
            match failure {
                RenderError::JobsFailed { failures } => flat.extend(failures),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(RenderError::JobsFailed { failures: flat }),
        }
    }

    /// Failures carried by this error (itself, unless it is an aggregate).
    pub fn failures(&self) -> Vec<&RenderError> {
        match self {
            RenderError::JobsFailed { failures } => failures.iter().collect(),
            other => vec![other],
        }
    }
}
