//! Deferred execution of completion callbacks.
//!
//! A latch never invokes its completion callback from inside the call that released the last
//! hold. It hands the callback to a [`Scheduler`] instead, which runs it at some later point on
//! the same thread. This keeps a callback that itself holds or releases (possibly on a latch
//! state that was just recycled) from re-entering the releasing call before it has unwound.

use std::any::type_name;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + 'static>;

/// Runs tasks later on the current thread.
///
/// Implementations must not run the task before `schedule()` returns and must run tasks in the
/// order they were scheduled.
pub trait Scheduler {
    /// Queues `task` to run after the current synchronous call stack has unwound.
    fn schedule(&self, task: Task);
}

impl<S> Scheduler for Rc<S>
where
    S: Scheduler + ?Sized,
{
    fn schedule(&self, task: Task) {
        (**self).schedule(task);
    }
}

/// A first-in-first-out run-later queue for hosts that drive their own loop.
///
/// Scheduled tasks sit in the queue until the host calls [`run_once()`][1] or
/// [`run_until_idle()`][2]. Clones share the same queue.
///
/// # Examples
///
/// ```
/// use holdfast::{Latch, TickQueue};
///
/// let queue = TickQueue::new();
/// let latch = Latch::new(queue.clone());
///
/// let hold = latch.hold();
/// latch.go(|outcome| assert!(outcome.is_ok()));
/// hold.release();
///
/// // The callback only runs once the host gets around to it.
/// assert_eq!(queue.len(), 1);
/// assert_eq!(queue.run_until_idle(), 1);
/// ```
///
/// [1]: Self::run_once
/// [2]: Self::run_until_idle
#[derive(Clone, Default)]
pub struct TickQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TickQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the oldest queued task, if any. Returns whether a task ran.
    pub fn run_once(&self) -> bool {
        // The borrow must end before the task runs, as the task may schedule more tasks.
        let task = self.tasks.borrow_mut().pop_front();

        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs queued tasks until the queue is empty, including tasks scheduled by the tasks
    /// themselves. Returns the number of tasks that ran.
    pub fn run_until_idle(&self) -> usize {
        let mut count: usize = 0;

        while self.run_once() {
            count = count.wrapping_add(1);
        }

        count
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Whether no tasks are waiting to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Scheduler for TickQueue {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for TickQueue {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("len", &self.tasks.borrow().len())
            .finish()
    }
}

/// Schedules tasks onto the tokio [`LocalSet`][1] of the current thread.
///
/// Must only be used from inside a `LocalSet` context, as `tokio::task::spawn_local()` panics
/// otherwise.
///
/// # Examples
///
/// ```
/// use holdfast::{Latch, SpawnLocal};
/// use tokio::task::LocalSet;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// LocalSet::new()
///     .run_until(async {
///         let latch = Latch::new(SpawnLocal);
///
///         let hold = latch.hold();
///         let completion = latch.go_async();
///         hold.release();
///
///         assert!(matches!(completion.await, Some(Ok(()))));
///     })
///     .await;
/// # }
/// ```
///
/// [1]: tokio::task::LocalSet
#[cfg(feature = "tokio")]
#[derive(Clone, Copy, Debug, Default)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct SpawnLocal;

#[cfg(feature = "tokio")]
impl Scheduler for SpawnLocal {
    fn schedule(&self, task: Task) {
        drop(tokio::task::spawn_local(async move { task() }));
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;

    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(TickQueue: Send, Sync);

    #[test]
    fn runs_in_schedule_order() {
        let queue = TickQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = Rc::clone(&log);
            queue.schedule(Box::new(move || log.borrow_mut().push(i)));
        }

        assert!(log.borrow().is_empty());
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.borrow(), [0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn nested_schedule_runs_after_existing() {
        let queue = TickQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let inner_queue = queue.clone();
            let log = Rc::clone(&log);

            queue.schedule(Box::new(move || {
                log.borrow_mut().push("outer");

                let log = Rc::clone(&log);
                inner_queue.schedule(Box::new(move || log.borrow_mut().push("nested")));
            }));
        }

        {
            let log = Rc::clone(&log);
            queue.schedule(Box::new(move || log.borrow_mut().push("second")));
        }

        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.borrow(), ["outer", "second", "nested"]);
    }

    #[test]
    fn run_once_on_empty() {
        let queue = TickQueue::new();

        assert!(!queue.run_once());
        assert_eq!(queue.run_until_idle(), 0);
    }

    #[test]
    fn rc_scheduler_forwards() {
        let queue = Rc::new(TickQueue::new());
        let ran = Rc::new(Cell::new(false));

        {
            let ran = Rc::clone(&ran);
            Scheduler::schedule(&queue, Box::new(move || ran.set(true)));
        }

        assert!(!ran.get());
        queue.run_until_idle();
        assert!(ran.get());
    }
}
