use std::fmt;
use std::rc::Rc;

use futures::channel::oneshot;

use crate::{
    Binding, BoxError, Completion, Epoch, LatchPool, OnComplete, Outcome, PoolCore, Release,
    Scheduler, SlotId,
};

/// One use of a countdown latch: a set of outstanding holds and a completion callback that
/// runs exactly once, after all of them have been released.
///
/// A latch starts with one implicit hold already outstanding. The owner requests more holds
/// via [`hold()`][1], hands the returned [`Release`] tokens to sub-operations, and finally
/// releases the implicit hold via [`go()`][2] (or one of its variants), which is also where
/// the completion callback is registered. This way the latch cannot complete while the owner
/// is still handing out holds, regardless of how quickly the sub-operations finish.
///
/// The completion callback never runs inside the call that released the last hold. It is
/// handed to the [`Scheduler`] of the pool and receives `Ok(())` if nothing went wrong, or the
/// errors reported through the releases in the order they arrived.
///
/// Clones of a latch refer to the same use. Once the use completes, all clones become inert:
/// [`hold()`][1] returns tokens that do nothing and [`go()`][2] returns `false` without
/// registering anything.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use holdfast::{Latch, TickQueue};
///
/// let queue = TickQueue::new();
/// let latch = Latch::new(queue.clone());
///
/// let first = latch.hold();
/// let second = latch.hold();
///
/// let done = Rc::new(Cell::new(false));
/// latch.go({
///     let done = Rc::clone(&done);
///     move |outcome| {
///         let errors = outcome.unwrap_err();
///         assert_eq!(errors.len(), 1);
///         assert_eq!(errors.first().to_string(), "disk on fire");
///         done.set(true);
///     }
/// });
///
/// first.release();
/// second.fail("disk on fire");
///
/// // Completion is deferred until the host runs the queue.
/// assert!(!done.get());
/// queue.run_until_idle();
/// assert!(done.get());
/// ```
///
/// [1]: Self::hold
/// [2]: Self::go
#[derive(Clone)]
pub struct Latch {
    core: Rc<PoolCore>,
    index: usize,
    epoch: Epoch,
}

impl Latch {
    /// Creates a latch that is not part of any shared pool.
    ///
    /// Use a [`LatchPool`] instead when creating latches at a high rate, so their state gets
    /// recycled.
    #[must_use]
    pub fn new<S>(scheduler: S) -> Self
    where
        S: Scheduler + 'static,
    {
        LatchPool::new(scheduler).acquire()
    }

    pub(crate) fn from_parts(core: Rc<PoolCore>, index: usize, epoch: Epoch) -> Self {
        Self { core, index, epoch }
    }

    /// Registers one more pending unit of work and returns the token that releases it.
    ///
    /// A latch use can have at most [`MAX_HOLDS`][crate::MAX_HOLDS] holds besides the implicit
    /// one. Requesting more does not fail: the request is recorded as a
    /// [capacity error][crate::Cause::CapacityExceeded] tagged with [`SlotId::NONE`] that will
    /// be delivered to the completion callback, and the returned token does nothing when
    /// released.
    ///
    /// Requesting a hold after the latch use has completed returns a token that does nothing.
    pub fn hold(&self) -> Release {
        let binding = self.core.hold(self.index, self.epoch);
        Release::new(Rc::clone(&self.core), self.index, self.epoch, binding)
    }

    /// Releases the implicit initial hold and registers the completion callback.
    ///
    /// The first registered callback wins: if a callback is already registered, `on_complete`
    /// is dropped without being called. It is also dropped if the latch use has already
    /// completed.
    ///
    /// Returns `true` if this call released the last outstanding hold.
    #[expect(
        clippy::must_use_candidate,
        reason = "callers mostly release without caring whether they were last"
    )]
    pub fn go<F>(&self, on_complete: F) -> bool
    where
        F: FnOnce(Outcome) + 'static,
    {
        self.register(Box::new(on_complete));
        self.release_initial(None)
    }

    /// Reports an error, releases the implicit initial hold and registers the completion
    /// callback.
    ///
    /// The error is tagged with [`SlotId::INITIAL`]. If the implicit hold has already been
    /// released, the error is discarded. See [`go()`][Self::go] for how the callback is treated.
    #[expect(
        clippy::must_use_candidate,
        reason = "callers mostly release without caring whether they were last"
    )]
    pub fn go_with_error<E, F>(&self, error: E, on_complete: F) -> bool
    where
        E: Into<BoxError>,
        F: FnOnce(Outcome) + 'static,
    {
        self.register(Box::new(on_complete));
        self.release_initial(Some(error.into()))
    }

    /// Releases the implicit initial hold and returns a future that resolves to the outcome
    /// once the latch completes.
    ///
    /// The future resolves to `None` if a completion callback was already registered (the
    /// earlier registration wins) or the latch use had already completed.
    pub fn go_async(&self) -> Completion {
        let (sender, receiver) = oneshot::channel();

        self.go(move |outcome| {
            // Nobody may be awaiting the outcome anymore.
            drop(sender.send(outcome));
        });

        Completion::new(receiver)
    }

    /// Releases the implicit initial hold without registering a completion callback.
    ///
    /// Returns `true` if this call released the last outstanding hold.
    #[expect(
        clippy::must_use_candidate,
        reason = "callers mostly release without caring whether they were last"
    )]
    pub fn release(&self) -> bool {
        self.release_initial(None)
    }

    /// Reports an error and releases the implicit initial hold without registering a
    /// completion callback.
    #[expect(
        clippy::must_use_candidate,
        reason = "callers mostly release without caring whether they were last"
    )]
    pub fn fail<E>(&self, error: E) -> bool
    where
        E: Into<BoxError>,
    {
        self.release_initial(Some(error.into()))
    }

    /// Whether the latch use has completed (all holds released).
    #[must_use]
    pub fn is_completed(&self) -> bool {
        !self.core.is_current(self.index, self.epoch)
    }

    /// Number of holds still outstanding, including the implicit one. Zero once completed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.core.outstanding(self.index, self.epoch)
    }

    /// Number of errors recorded so far. Zero once completed, as the errors have been handed
    /// over to the completion callback.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.core.error_count(self.index, self.epoch)
    }

    fn register(&self, callback: OnComplete) {
        self.core.register(self.index, self.epoch, callback);
    }

    fn release_initial(&self, error: Option<BoxError>) -> bool {
        self.core.release(
            self.index,
            self.epoch,
            Binding::Slot(SlotId::INITIAL),
            error,
        )
    }
}

impl fmt::Debug for Latch {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Latch")
            .field("index", &self.index)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
