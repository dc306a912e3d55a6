//! Job Scheduler - batches effect re-runs into one flush per tick.
//!
//! Component updates never run inside the write that caused them. Their
//! effect's scheduler calls [`queue_job`], which records the effect once and
//! makes sure a single [`flush_jobs`] is waiting at the next microtask
//! boundary.
//!
//! # Microtask boundary
//!
//! There is no implicit event loop. The embedder crosses the boundary by
//! calling [`run_microtasks`] once its synchronous work is done (or by
//! awaiting [`tick`]):
//!
//! ```ignore
//! count.set(1);
//! count.set(2);
//! count.set(3);              // three writes, one queued job
//! run_microtasks()?;         // one re-render
//! ```
//!
//! # Failure isolation
//!
//! A job that returns an error or panics does not stop the flush. Every
//! failure is collected and returned to whoever drove the flush.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use indexmap::IndexMap;

use crate::config::scheduler_config;
use crate::error::{RenderError, Result};
use crate::reactive::{Effect, EffectId};

/// Deferred callback run at the microtask boundary.
type Microtask = Box<dyn FnOnce() -> Result<()>>;

// =============================================================================
// Scheduler State
// =============================================================================

thread_local! {
    /// Pending jobs in first-enqueued order, keyed by identity for dedup.
    static JOB_QUEUE: RefCell<IndexMap<EffectId, Effect>> = RefCell::new(IndexMap::new());

    /// Set while a flush is waiting in the microtask queue.
    static FLUSH_PENDING: Cell<bool> = const { Cell::new(false) };

    static MICROTASKS: RefCell<VecDeque<Microtask>> = RefCell::new(VecDeque::new());

    /// Number of completed microtask drains.
    static TICK_EPOCH: Cell<u64> = const { Cell::new(0) };
}

// =============================================================================
// Job Queue
// =============================================================================

/// Queue an effect for the next flush.
///
/// An effect already waiting is not added again. The first job of a batch
/// schedules the flush itself.
pub fn queue_job(job: &Effect) {
    let inserted = JOB_QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.contains_key(&job.id()) {
            false
        } else {
            queue.insert(job.id(), job.clone());
            true
        }
    });

    if inserted {
        tracing::trace!(job = ?job.id(), "queued job");
        queue_flush();
    }
}

fn queue_flush() {
    if FLUSH_PENDING.with(|pending| pending.replace(true)) {
        return;
    }
    queue_microtask(Box::new(|| flush_jobs().map(|_| ())));
}

/// Run queued jobs until the queue is empty.
///
/// Jobs queued while flushing run in the same pass. Returns how many jobs
/// ran; failures are returned together once the queue is drained.
pub fn flush_jobs() -> Result<usize> {
    let span = tracing::debug_span!("flush_jobs");
    let _enter = span.enter();

    let limit = scheduler_config().max_flush_jobs;
    let mut ran = 0;
    let mut failures = Vec::new();

    loop {
        let job = JOB_QUEUE.with(|queue| queue.borrow_mut().shift_remove_index(0));
        let Some((id, job)) = job else {
            break;
        };

        if ran >= limit {
            let dropped = JOB_QUEUE.with(|queue| std::mem::take(&mut *queue.borrow_mut()));
            tracing::error!(limit, dropped = dropped.len() + 1, "flush limit exceeded");
            drop(dropped);
            failures.push(RenderError::FlushLimitExceeded { limit });
            break;
        }
        ran += 1;

        match panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(job = ?id, error = %err, "job failed");
                failures.push(err);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(job = ?id, %message, "job panicked");
                failures.push(RenderError::JobPanicked { message });
            }
        }
    }

    FLUSH_PENDING.with(|pending| pending.set(false));
    tracing::debug!(ran, failed = failures.len(), "flush complete");

    RenderError::collect(failures).map(|()| ran)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Whether a flush is waiting at the next boundary.
pub fn is_flush_pending() -> bool {
    FLUSH_PENDING.with(Cell::get)
}

/// Number of jobs waiting to run.
pub fn pending_jobs() -> usize {
    JOB_QUEUE.with(|queue| queue.borrow().len())
}

// =============================================================================
// Microtasks
// =============================================================================

fn queue_microtask(task: Microtask) {
    MICROTASKS.with(|tasks| tasks.borrow_mut().push_back(task));
}

/// Defer `f` to the next microtask boundary.
pub fn next_tick(f: impl FnOnce() + 'static) {
    queue_microtask(Box::new(move || {
        f();
        Ok(())
    }));
}

/// Cross the microtask boundary: run every deferred callback, including ones
/// queued while draining.
///
/// Returns the number of callbacks run. Each callback's failure is isolated;
/// all of them are reported after the drain.
pub fn run_microtasks() -> Result<usize> {
    let mut ran = 0;
    let mut failures = Vec::new();

    loop {
        let task = MICROTASKS.with(|tasks| tasks.borrow_mut().pop_front());
        let Some(task) = task else {
            break;
        };
        ran += 1;
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => failures.push(err),
            Err(payload) => failures.push(RenderError::JobPanicked {
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    TICK_EPOCH.with(|epoch| epoch.set(epoch.get() + 1));
    RenderError::collect(failures).map(|()| ran)
}

/// Number of deferred callbacks waiting for the boundary.
pub fn pending_microtasks() -> usize {
    MICROTASKS.with(|tasks| tasks.borrow().len())
}

/// Awaitable marker that completes once the current tick has been flushed.
///
/// If nothing else crossed the boundary by the time it is polled, polling
/// crosses it.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct NextTick {
    epoch: u64,
}

/// Completion marker for the next microtask boundary.
pub fn tick() -> NextTick {
    NextTick {
        epoch: TICK_EPOCH.with(Cell::get),
    }
}

impl Future for NextTick {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if TICK_EPOCH.with(Cell::get) > self.epoch {
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(run_microtasks().map(|_| ()))
    }
}

/// Drop every queued job and deferred callback on this thread.
pub fn reset_scheduler() {
    let jobs = JOB_QUEUE.with(|queue| std::mem::take(&mut *queue.borrow_mut()));
    let tasks = MICROTASKS.with(|tasks| std::mem::take(&mut *tasks.borrow_mut()));
    FLUSH_PENDING.with(|pending| pending.set(false));
    drop(jobs);
    drop(tasks);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{reset_scheduler_config, set_scheduler_config, SchedulerConfig};
    use crate::reactive::{create_ref, effect_with, EffectOptions};
    use std::rc::Rc;
    use std::task::Waker;

    fn queued_effect(f: impl FnMut() -> Result<()> + 'static) -> Effect {
        Effect::try_new(f, EffectOptions::lazy().with_scheduler(queue_job))
            .expect("lazy effects do not run on creation")
    }

    #[test]
    fn test_three_writes_one_run() {
        reset_scheduler();
        let count = create_ref(0);
        let runs = Rc::new(Cell::new(0));

        let (c, r) = (count.clone(), runs.clone());
        let _e = effect_with(
            move || {
                let _ = c.get();
                r.set(r.get() + 1);
            },
            EffectOptions::default().with_scheduler(queue_job),
        );
        assert_eq!(runs.get(), 1);

        count.set(1);
        count.set(2);
        count.set(3);
        assert_eq!(runs.get(), 1);
        assert_eq!(pending_jobs(), 1);
        assert!(is_flush_pending());
        assert_eq!(pending_microtasks(), 1);

        assert_eq!(run_microtasks(), Ok(1));
        assert_eq!(runs.get(), 2);
        assert!(!is_flush_pending());
    }

    #[test]
    fn test_flush_is_fifo() {
        reset_scheduler();
        let order = Rc::new(RefCell::new(Vec::new()));

        let jobs: Vec<Effect> = (0..3)
            .map(|n| {
                let order = order.clone();
                queued_effect(move || {
                    order.borrow_mut().push(n);
                    Ok(())
                })
            })
            .collect();

        queue_job(&jobs[2]);
        queue_job(&jobs[0]);
        queue_job(&jobs[2]);
        queue_job(&jobs[1]);

        assert_eq!(flush_jobs(), Ok(3));
        assert_eq!(*order.borrow(), vec![2, 0, 1]);
    }

    #[test]
    fn test_job_queued_during_flush_runs_in_same_pass() {
        reset_scheduler();
        let runs = Rc::new(Cell::new(0));

        let r = runs.clone();
        let second = queued_effect(move || {
            r.set(r.get() + 1);
            Ok(())
        });

        let second_clone = second.clone();
        let first = queued_effect(move || {
            queue_job(&second_clone);
            Ok(())
        });

        queue_job(&first);
        assert_eq!(run_microtasks(), Ok(1));
        assert_eq!(runs.get(), 1);
        assert_eq!(pending_jobs(), 0);
        // The nested queue_job did not schedule a second flush
        assert_eq!(pending_microtasks(), 0);
    }

    #[test]
    fn test_failing_job_does_not_block_others() {
        reset_scheduler();
        let runs = Rc::new(Cell::new(0));

        let failing = queued_effect(|| Err(RenderError::NotMounted));
        let panicking = queued_effect(|| panic!("render exploded"));
        let r = runs.clone();
        let healthy = queued_effect(move || {
            r.set(r.get() + 1);
            Ok(())
        });

        queue_job(&failing);
        queue_job(&panicking);
        queue_job(&healthy);

        let err = flush_jobs().unwrap_err();
        assert_eq!(runs.get(), 1);
        assert_eq!(
            err,
            RenderError::JobsFailed {
                failures: vec![
                    RenderError::NotMounted,
                    RenderError::JobPanicked {
                        message: "render exploded".to_string()
                    },
                ]
            }
        );
        assert!(!is_flush_pending());
    }

    #[test]
    fn test_flush_limit_drops_runaway_queue() {
        reset_scheduler();
        set_scheduler_config(SchedulerConfig { max_flush_jobs: 5 });

        let runs = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let (r, s) = (runs.clone(), slot.clone());
        let looping = queued_effect(move || {
            r.set(r.get() + 1);
            if let Some(me) = s.borrow().as_ref() {
                queue_job(me);
            }
            Ok(())
        });
        *slot.borrow_mut() = Some(looping.clone());

        queue_job(&looping);
        let err = flush_jobs().unwrap_err();
        assert_eq!(err, RenderError::FlushLimitExceeded { limit: 5 });
        assert_eq!(runs.get(), 5);
        assert_eq!(pending_jobs(), 0);

        slot.borrow_mut().take();
        reset_scheduler_config();
    }

    #[test]
    fn test_next_tick_defers_callback() {
        reset_scheduler();
        let called = Rc::new(Cell::new(false));
        let c = called.clone();
        next_tick(move || c.set(true));
        assert!(!called.get());

        assert_eq!(run_microtasks(), Ok(1));
        assert!(called.get());
    }

    #[test]
    fn test_tick_future_crosses_boundary() {
        reset_scheduler();
        let called = Rc::new(Cell::new(false));
        let c = called.clone();
        next_tick(move || c.set(true));

        let mut marker = tick();
        let mut cx = Context::from_waker(Waker::noop());
        assert_eq!(Pin::new(&mut marker).poll(&mut cx), Poll::Ready(Ok(())));
        assert!(called.get());

        // Polling again after the boundary resolves without draining
        next_tick(|| {});
        assert_eq!(Pin::new(&mut marker).poll(&mut cx), Poll::Ready(Ok(())));
        assert_eq!(pending_microtasks(), 1);
    }
}
