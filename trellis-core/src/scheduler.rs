//! Microtask Scheduling
//!
//! A state change never touches the native tree directly. It marks
//! components dirty, and the root asks a [`Scheduler`] to run one refresh
//! "soon", after the code that made the change has returned. Every write made
//! before that point is folded into the same pass.
//!
//! Two schedulers are provided:
//!
//! - [`MicrotaskQueue`]: a FIFO the host drains explicitly with
//!   [`MicrotaskQueue::run_until_idle`]. Deterministic, used by tests.
//! - [`TokioScheduler`]: spawns each task onto the current tokio `LocalSet`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Runs tasks after the current synchronous work completes.
pub trait Scheduler {
    fn queue_microtask(&self, task: Task);
}

/// A manually drained task queue.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run queued tasks until none are left, including tasks queued by the
    /// tasks themselves. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "microtask queue drained");
        }
        ran
    }
}

impl Scheduler for MicrotaskQueue {
    fn queue_microtask(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Schedules tasks with `tokio::task::spawn_local`.
///
/// Must be used from inside a `tokio::task::LocalSet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn queue_microtask(&self, task: Task) {
        tokio::task::spawn_local(async move {
            task();
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_fifo_order() {
        let queue = MicrotaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3 {
            let log = log.clone();
            queue.queue_microtask(Box::new(move || log.borrow_mut().push(n)));
        }
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_queued_while_draining_also_run() {
        let queue = MicrotaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (inner_queue, inner_log) = (queue.clone(), log.clone());
        queue.queue_microtask(Box::new(move || {
            inner_log.borrow_mut().push("outer");
            let log = inner_log.clone();
            inner_queue.queue_microtask(Box::new(move || log.borrow_mut().push("inner")));
        }));

        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn tokio_scheduler_runs_on_local_set() {
        let local = tokio::task::LocalSet::new();
        let hit = Rc::new(RefCell::new(false));
        let hit_clone = hit.clone();

        local
            .run_until(async move {
                TokioScheduler.queue_microtask(Box::new(move || *hit_clone.borrow_mut() = true));
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
            })
            .await;

        assert!(*hit.borrow());
    }
}
