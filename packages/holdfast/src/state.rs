//! The recyclable state of a latch and its transitions.
//!
//! A state is either active (carrying the epoch of the current use) or vacant (sitting in the
//! pool's free list, epoch cleared). Every transition first checks the epoch of the caller
//! against the epoch of the state; a mismatch means the caller belongs to an earlier use and
//! the transition is absorbed without touching anything.

use std::fmt;
use std::mem;

use crate::{BoxError, Cause, Epoch, Errors, HoldError, Outcome, SlotId, SlotSet};

/// Callback invoked once all holds of a latch use have been released.
pub(crate) type OnComplete = Box<dyn FnOnce(Outcome) + 'static>;

/// What a hold request produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Binding {
    /// A regular hold that counts towards completion.
    Slot(SlotId),

    /// A hold rejected for capacity reasons. The capacity error was recorded at `error_index`
    /// in the error list; a report through this binding is appended to that error. The token
    /// holding it turns inert after its first release attempt.
    Overflow { error_index: usize },

    /// The latch use already completed. Nothing this binding does has any effect.
    Inert,
}

/// Result of a release attempt.
#[derive(Debug)]
pub(crate) enum Released {
    /// The release was absorbed: stale epoch, slot already released or an inert binding.
    Ignored,

    /// The release counted but other holds remain outstanding.
    Pending,

    /// The release was the last one. The state is now vacant and must go back to the pool;
    /// the callback (if any) must be scheduled with the outcome.
    Completed(Detached),
}

/// Everything detached from a state at the moment it completes.
pub(crate) struct Detached {
    pub(crate) callback: Option<OnComplete>,
    pub(crate) outcome: Outcome,
}

impl fmt::Debug for Detached {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detached")
            .field("has_callback", &self.callback.is_some())
            .field("outcome", &self.outcome)
            .finish()
    }
}

#[derive(Default)]
pub(crate) struct LatchState {
    epoch: Option<Epoch>,
    slots: SlotSet,
    errors: Vec<HoldError>,
    callback: Option<OnComplete>,
}

impl LatchState {
    /// Starts a new use of a vacant state. The implicit initial hold is allocated as
    /// [`SlotId::INITIAL`].
    pub(crate) fn begin(&mut self, epoch: Epoch) {
        debug_assert!(self.epoch.is_none(), "began a use of a state that is still active");

        self.epoch = Some(epoch);
        self.slots.reset();
        self.errors.clear();
        self.callback = None;

        let initial = self.slots.allocate();
        debug_assert_eq!(initial, Ok(SlotId::INITIAL));
    }

    pub(crate) fn is_current(&self, epoch: Epoch) -> bool {
        self.epoch == Some(epoch)
    }

    pub(crate) fn hold(&mut self, epoch: Epoch) -> Binding {
        if !self.is_current(epoch) {
            return Binding::Inert;
        }

        match self.slots.allocate() {
            Ok(slot) => Binding::Slot(slot),
            Err(_) => {
                let error_index = self.errors.len();
                self.errors
                    .push(HoldError::new(SlotId::NONE, Cause::CapacityExceeded));

                Binding::Overflow { error_index }
            }
        }
    }

    /// Registers `callback` unless one is already registered.
    ///
    /// Returns the callback back to the caller if it was not registered.
    pub(crate) fn register(
        &mut self,
        epoch: Epoch,
        callback: OnComplete,
    ) -> Result<(), OnComplete> {
        if !self.is_current(epoch) || self.callback.is_some() {
            return Err(callback);
        }

        self.callback = Some(callback);
        Ok(())
    }

    pub(crate) fn release(
        &mut self,
        epoch: Epoch,
        binding: Binding,
        error: Option<BoxError>,
    ) -> Released {
        if !self.is_current(epoch) {
            return Released::Ignored;
        }

        let slot = match binding {
            Binding::Slot(slot) => slot,
            Binding::Overflow { error_index } => {
                if let Some(error) = error {
                    if let Some(existing) = self.errors.get_mut(error_index) {
                        existing.append(Cause::Reported(error));
                    }
                }

                return Released::Ignored;
            }
            Binding::Inert => return Released::Ignored,
        };

        if !self.slots.is_outstanding(slot) {
            return Released::Ignored;
        }

        if let Some(error) = error {
            self.errors.push(HoldError::reported(slot, error));
        }

        if !self.slots.mark_done(slot).is_empty() {
            return Released::Pending;
        }

        Released::Completed(self.finish())
    }

    fn finish(&mut self) -> Detached {
        self.epoch = None;

        let errors = mem::take(&mut self.errors);

        Detached {
            callback: self.callback.take(),
            outcome: Errors::new(errors).map_or(Ok(()), Err),
        }
    }

    pub(crate) fn outstanding(&self, epoch: Epoch) -> usize {
        if self.is_current(epoch) {
            self.slots.outstanding_count()
        } else {
            0
        }
    }

    pub(crate) fn error_count(&self, epoch: Epoch) -> usize {
        if self.is_current(epoch) {
            self.errors.len()
        } else {
            0
        }
    }
}

impl fmt::Debug for LatchState {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatchState")
            .field("epoch", &self.epoch)
            .field("slots", &self.slots)
            .field("errors", &self.errors)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
