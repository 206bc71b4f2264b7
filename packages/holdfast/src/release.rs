use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::{Binding, BoxError, Epoch, PoolCore, SlotId};

/// Releases one hold of a latch. Returned by [`Latch::hold()`][crate::Latch::hold].
///
/// Only the first call to [`release()`][1] or [`fail()`][2] on a token counts. Every later call
/// is a no-op that returns `false`, as is any call made after the latch use the token belongs
/// to has completed, even if the underlying latch state has since been recycled for a new use.
///
/// Dropping a token does not release its hold. A latch with a hold that is never released
/// never completes.
///
/// [1]: Self::release
/// [2]: Self::fail
#[must_use = "the latch cannot complete until the hold is released"]
pub struct Release {
    core: Rc<PoolCore>,
    index: usize,
    epoch: Epoch,

    /// Overflow bindings are swapped for [`Binding::Inert`] on first use, as the capacity
    /// error they amend has no slot bit to clear.
    binding: Cell<Binding>,
}

impl Release {
    pub(crate) fn new(core: Rc<PoolCore>, index: usize, epoch: Epoch, binding: Binding) -> Self {
        Self {
            core,
            index,
            epoch,
            binding: Cell::new(binding),
        }
    }

    /// Releases the hold.
    ///
    /// Returns `true` if this was the last outstanding hold, completing the latch. Returns
    /// `false` if other holds remain, or if this token has no effect anymore (already
    /// released, issued after completion or rejected for capacity reasons).
    #[expect(
        clippy::must_use_candidate,
        reason = "callers mostly release without caring whether they were last"
    )]
    pub fn release(&self) -> bool {
        self.core.release(self.index, self.epoch, self.take_binding(), None)
    }

    /// Releases the hold, reporting an error.
    ///
    /// The error is tagged with the [slot][Self::slot] of this token and delivered to the
    /// completion callback, after any errors reported before it. Anything convertible into a
    /// boxed error is accepted, including plain `&str` and `String` messages.
    ///
    /// If this token was rejected because the latch was at capacity, the error is appended to
    /// the capacity error recorded for it, unless the token was already used. Otherwise, if the
    /// token has no effect anymore, the error is discarded.
    ///
    /// Returns the same as [`release()`][Self::release].
    #[expect(
        clippy::must_use_candidate,
        reason = "callers mostly release without caring whether they were last"
    )]
    pub fn fail<E>(&self, error: E) -> bool
    where
        E: Into<BoxError>,
    {
        self.core.release(
            self.index,
            self.epoch,
            self.take_binding(),
            Some(error.into()),
        )
    }

    /// The slot this token releases.
    ///
    /// [`SlotId::NONE`] for tokens that were rejected for capacity reasons or issued after the
    /// latch use completed.
    #[must_use]
    pub fn slot(&self) -> SlotId {
        match self.binding.get() {
            Binding::Slot(slot) => slot,
            Binding::Overflow { .. } | Binding::Inert => SlotId::NONE,
        }
    }

    fn take_binding(&self) -> Binding {
        let binding = self.binding.get();

        if matches!(binding, Binding::Overflow { .. }) {
            self.binding.set(Binding::Inert);
        }

        binding
    }
}

impl fmt::Debug for Release {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("index", &self.index)
            .field("epoch", &self.epoch)
            .field("binding", &self.binding.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::RefCell;

    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{Latch, MAX_HOLDS, TickQueue};

    assert_not_impl_any!(Release: Send, Sync, Clone);

    #[test]
    fn slots_are_distinct() {
        let latch = Latch::new(TickQueue::new());

        let a = latch.hold();
        let b = latch.hold();

        assert_ne!(a.slot(), b.slot());
        assert_ne!(a.slot(), SlotId::INITIAL);
        assert_ne!(a.slot(), SlotId::NONE);
    }

    #[test]
    fn second_release_is_noop() {
        let latch = Latch::new(TickQueue::new());

        let a = latch.hold();
        let b = latch.hold();
        assert!(!latch.release());

        assert!(!a.release());
        assert!(!a.release());
        assert_eq!(latch.outstanding(), 1);

        assert!(b.release());
        assert!(!b.release());
    }

    #[test]
    fn overflow_token_is_noop() {
        let latch = Latch::new(TickQueue::new());

        let holds = (0..MAX_HOLDS).map(|_| latch.hold()).collect::<Vec<_>>();
        let overflow = latch.hold();

        assert_eq!(overflow.slot(), SlotId::NONE);
        assert_eq!(latch.outstanding(), MAX_HOLDS + 1);

        assert!(!overflow.release());
        assert!(!overflow.fail("after release"));
        assert_eq!(latch.outstanding(), MAX_HOLDS + 1);
        assert_eq!(latch.error_count(), 1);

        for hold in &holds {
            hold.release();
        }

        assert!(latch.release());
    }

    #[test]
    fn overflow_token_reports_only_once() {
        let queue = TickQueue::new();
        let latch = Latch::new(queue.clone());

        let holds = (0..MAX_HOLDS).map(|_| latch.hold()).collect::<Vec<_>>();
        let overflow = latch.hold();

        assert!(!overflow.fail("first"));
        assert!(!overflow.fail("second"));
        assert!(!overflow.release());
        assert_eq!(latch.error_count(), 1);

        for hold in &holds {
            hold.release();
        }

        let outcome = Rc::new(RefCell::new(None));
        assert!(latch.go({
            let outcome = Rc::clone(&outcome);
            move |result| *outcome.borrow_mut() = Some(result)
        }));
        queue.run_until_idle();

        let errors = outcome.borrow_mut().take().unwrap().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().causes().len(), 2);
        assert!(errors.first().to_string().ends_with("& first"));
    }

    #[test]
    fn token_after_completion_is_inert() {
        let latch = Latch::new(TickQueue::new());

        assert!(latch.release());

        let late = latch.hold();
        assert_eq!(late.slot(), SlotId::NONE);
        assert!(!late.release());
        assert!(!late.fail("too late"));
    }
}
