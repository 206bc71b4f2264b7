use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::{
    Binding, BoxError, Detached, Epoch, EpochCounter, Latch, LatchPoolBuilder, LatchState,
    OnComplete, Pool, Released, Scheduler,
};

/// A pool of reusable latches.
///
/// Each [`acquire()`][1] starts a new use of a latch. Once every hold of that use has been
/// released, the latch state goes back to the pool and the next `acquire()` reuses it instead
/// of allocating. Handles left over from an earlier use ([`Latch`] clones and [`Release`][2]
/// tokens) keep pointing at the recycled state but can no longer affect it: every state carries
/// the epoch of its current use and handles from a different epoch are ignored.
///
/// Clones of the pool share the same storage and scheduler.
///
/// # Examples
///
/// ```
/// use holdfast::{LatchPool, TickQueue};
///
/// let queue = TickQueue::new();
/// let pool = LatchPool::new(queue.clone());
///
/// for i in 0..3 {
///     let latch = pool.acquire();
///
///     let hold = latch.hold();
///     latch.go(move |outcome| {
///         assert!(outcome.is_ok());
///         println!("operation {i} done");
///     });
///     hold.release();
///
///     queue.run_until_idle();
/// }
///
/// // All three operations ran on the same recycled latch state.
/// assert_eq!(pool.len(), 1);
/// ```
///
/// [1]: Self::acquire
/// [2]: crate::Release
#[derive(Clone)]
pub struct LatchPool {
    core: Rc<PoolCore>,
}

impl LatchPool {
    /// Creates an empty pool that defers completion callbacks to `scheduler`.
    #[must_use]
    pub fn new<S>(scheduler: S) -> Self
    where
        S: Scheduler + 'static,
    {
        Self::builder(scheduler).build()
    }

    /// Starts building a pool with a custom configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use holdfast::{LatchPool, TickQueue};
    ///
    /// let pool = LatchPool::builder(TickQueue::new())
    ///     .initial_capacity(16)
    ///     .build();
    ///
    /// assert_eq!(pool.idle_len(), 16);
    /// ```
    pub fn builder<S>(scheduler: S) -> LatchPoolBuilder
    where
        S: Scheduler + 'static,
    {
        LatchPoolBuilder::new(Box::new(scheduler))
    }

    pub(crate) fn new_inner(scheduler: Box<dyn Scheduler>, initial_capacity: usize) -> Self {
        Self {
            core: Rc::new(PoolCore {
                states: RefCell::new(Pool::with_vacant(initial_capacity)),
                epochs: EpochCounter::new(),
                scheduler,
            }),
        }
    }

    /// Starts a new use of a latch, with the implicit initial hold already outstanding.
    #[must_use]
    pub fn acquire(&self) -> Latch {
        PoolCore::acquire(&self.core)
    }

    /// Number of latch states the pool has ever created, in use or idle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.states.borrow().len()
    }

    /// Whether the pool has not created any latch states yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of latch states currently in use (acquired and not yet completed).
    #[must_use]
    pub fn active_len(&self) -> usize {
        let states = self.core.states.borrow();
        states.len().saturating_sub(states.vacant_len())
    }

    /// Number of latch states waiting to be reused.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.core.states.borrow().vacant_len()
    }
}

impl fmt::Debug for LatchPool {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("core", &self.core)
            .finish()
    }
}

/// Storage shared by a pool and every handle it issued.
pub(crate) struct PoolCore {
    states: RefCell<Pool<LatchState>>,
    epochs: EpochCounter,
    scheduler: Box<dyn Scheduler>,
}

impl PoolCore {
    fn acquire(this: &Rc<Self>) -> Latch {
        let epoch = this.epochs.next();

        let index = {
            let mut states = this.states.borrow_mut();

            let len_before = states.len();
            let index = states.get();

            if states.len() != len_before {
                debug!(len = states.len(), "latch pool grew");
            }

            states
                .get_mut(index)
                .expect("pool just handed out this index")
                .begin(epoch);

            index
        };

        trace!(index, %epoch, "latch acquired");

        Latch::from_parts(Rc::clone(this), index, epoch)
    }

    pub(crate) fn hold(&self, index: usize, epoch: Epoch) -> Binding {
        let binding = self
            .states
            .borrow_mut()
            .get_mut(index)
            .map_or(Binding::Inert, |state| state.hold(epoch));

        match binding {
            Binding::Slot(slot) => trace!(index, %epoch, %slot, "hold registered"),
            Binding::Overflow { .. } => debug!(index, %epoch, "hold rejected, latch at capacity"),
            Binding::Inert => trace!(index, %epoch, "hold requested after completion"),
        }

        binding
    }

    /// Registers the completion callback of the current use.
    ///
    /// The callback is dropped if another one was already registered or the use has already
    /// completed.
    pub(crate) fn register(&self, index: usize, epoch: Epoch, callback: OnComplete) {
        let rejected = match self.states.borrow_mut().get_mut(index) {
            Some(state) => state.register(epoch, callback).err(),
            None => Some(callback),
        };

        // Dropped outside the borrow, the callback may own handles into this pool.
        if let Some(callback) = rejected {
            trace!(index, %epoch, "completion callback not registered");
            drop(callback);
        }
    }

    /// Releases whatever `binding` holds. Returns `true` if this release completed the latch.
    pub(crate) fn release(
        &self,
        index: usize,
        epoch: Epoch,
        binding: Binding,
        error: Option<BoxError>,
    ) -> bool {
        let released = {
            let mut states = self.states.borrow_mut();

            let Some(state) = states.get_mut(index) else {
                return false;
            };

            let released = state.release(epoch, binding, error);

            if matches!(released, Released::Completed(_)) {
                states.put(index);
            }

            released
        };

        // The states borrow must have ended before anything reaches the scheduler.
        match released {
            Released::Ignored => {
                trace!(index, %epoch, ?binding, "release absorbed");
                false
            }
            Released::Pending => false,
            Released::Completed(detached) => {
                self.complete(index, epoch, detached);
                true
            }
        }
    }

    fn complete(&self, index: usize, epoch: Epoch, detached: Detached) {
        let Detached { callback, outcome } = detached;

        trace!(
            index,
            %epoch,
            errors = outcome.as_ref().err().map_or(0, |errors| errors.len()),
            "latch completed"
        );

        match callback {
            Some(callback) => self.scheduler.schedule(Box::new(move || callback(outcome))),
            None => trace!(index, %epoch, "latch completed without a callback"),
        }
    }

    pub(crate) fn is_current(&self, index: usize, epoch: Epoch) -> bool {
        self.states
            .borrow()
            .get_ref(index)
            .is_some_and(|state| state.is_current(epoch))
    }

    pub(crate) fn outstanding(&self, index: usize, epoch: Epoch) -> usize {
        self.states
            .borrow()
            .get_ref(index)
            .map_or(0, |state| state.outstanding(epoch))
    }

    pub(crate) fn error_count(&self, index: usize, epoch: Epoch) -> usize {
        self.states
            .borrow()
            .get_ref(index)
            .map_or(0, |state| state.error_count(epoch))
    }
}

impl fmt::Debug for PoolCore {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("states", &self.states)
            .field("epochs", &self.epochs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;

    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::TickQueue;

    assert_not_impl_any!(LatchPool: Send, Sync);

    #[test]
    fn sequential_uses_recycle_one_state() {
        let queue = TickQueue::new();
        let pool = LatchPool::new(queue.clone());

        for _ in 0..10_000 {
            let latch = pool.acquire();

            for _ in 0..crate::MAX_HOLDS {
                assert!(!latch.hold().release());
            }

            assert!(latch.release());
            queue.run_until_idle();
        }

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.idle_len(), 1);
        assert_eq!(pool.active_len(), 0);
    }

    #[test]
    fn concurrent_uses_get_distinct_states() {
        let pool = LatchPool::new(TickQueue::new());

        let a = pool.acquire();
        let b = pool.acquire();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.active_len(), 2);

        assert!(a.release());
        assert_eq!(pool.active_len(), 1);
        assert_eq!(pool.idle_len(), 1);

        assert!(b.release());
        assert_eq!(pool.active_len(), 0);
    }

    #[test]
    fn preallocated_states_are_used_first() {
        let pool = LatchPool::builder(TickQueue::new())
            .initial_capacity(4)
            .build();

        assert_eq!(pool.len(), 4);
        assert!(!pool.is_empty());

        let latches = (0..4).map(|_| pool.acquire()).collect::<Vec<_>>();
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.idle_len(), 0);

        let extra = pool.acquire();
        assert_eq!(pool.len(), 5);

        drop(latches);
        drop(extra);
    }

    #[test]
    fn unreleased_latch_stays_out_of_pool() {
        let pool = LatchPool::new(TickQueue::new());

        let latch = pool.acquire();
        let _hold = latch.hold();
        drop(latch);

        assert_eq!(pool.active_len(), 1);
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn completion_is_deferred_to_scheduler() {
        let queue = TickQueue::new();
        let pool = LatchPool::new(queue.clone());

        let called = Rc::new(Cell::new(0));

        let latch = pool.acquire();
        {
            let called = Rc::clone(&called);
            assert!(latch.go(move |_| called.set(called.get() + 1)));
        }

        assert_eq!(called.get(), 0);
        assert_eq!(queue.len(), 1);

        queue.run_until_idle();
        assert_eq!(called.get(), 1);
    }

    #[test]
    fn rejected_callback_is_dropped_immediately() {
        let pool = LatchPool::new(TickQueue::new());
        let latch = pool.acquire();
        let hold = latch.hold();

        latch.go(|_| {});

        let captured = Rc::new(());
        {
            let captured = Rc::clone(&captured);
            latch.go(move |_| drop(captured));
        }

        assert_eq!(Rc::strong_count(&captured), 1);

        assert!(hold.release());
    }

    #[test]
    fn empty_pool() {
        let pool = LatchPool::new(TickQueue::new());

        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
    }
}
