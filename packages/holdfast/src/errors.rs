use std::error;
use std::fmt::{self, Display};
use std::{slice, vec};

use smallvec::SmallVec;
use thiserror::Error;

use crate::{MAX_HOLDS, SlotId};

/// Any error value a caller can report through a release.
///
/// Everything convertible into this type is accepted, which includes all `Send + Sync` error
/// types as well as plain `&str` and `String` messages (wrapped into an error on the way in).
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// What the completion callback receives: `Ok(())` if nothing went wrong, otherwise every
/// error reported during the use of the latch, in the order the reports arrived.
pub type Outcome = Result<(), Errors>;

/// A single reason for a [`HoldError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Cause {
    /// More holds were requested than one latch use can track at the same time.
    #[error("capacity of {} concurrent holds exceeded", MAX_HOLDS)]
    CapacityExceeded,

    /// The caller reported an error when releasing a hold.
    #[error(transparent)]
    Reported(BoxError),
}

/// An error tagged with the slot of the hold that produced it.
///
/// Usually there is exactly one cause. A report made through a hold that was rejected for
/// capacity reasons is appended to the capacity error instead of replacing it, in which case
/// the causes are kept in reporting order and displayed joined by `&`.
#[derive(Debug)]
pub struct HoldError {
    slot: SlotId,
    causes: SmallVec<[Cause; 1]>,
}

impl HoldError {
    pub(crate) fn new(slot: SlotId, cause: Cause) -> Self {
        let mut causes = SmallVec::new();
        causes.push(cause);

        Self { slot, causes }
    }

    pub(crate) fn reported(slot: SlotId, error: BoxError) -> Self {
        Self::new(slot, Cause::Reported(error))
    }

    pub(crate) fn append(&mut self, cause: Cause) {
        self.causes.push(cause);
    }

    /// The slot of the hold that produced the error.
    ///
    /// [`SlotId::NONE`] means the error did not come from an allocated hold
    /// (e.g. the hold was rejected because the latch was at capacity).
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// The causes of the error, in reporting order. Never empty.
    #[must_use]
    pub fn causes(&self) -> &[Cause] {
        &self.causes
    }

    /// Whether the error originates from a hold rejected for capacity reasons.
    #[must_use]
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self.causes.first(), Some(Cause::CapacityExceeded))
    }
}

impl Display for HoldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cause) in self.causes.iter().enumerate() {
            if i > 0 {
                write!(f, " & ")?;
            }

            write!(f, "{cause}")?;
        }

        Ok(())
    }
}

impl error::Error for HoldError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        let cause: &(dyn error::Error + 'static) = self.causes.first()?;
        Some(cause)
    }
}

/// The ordered, non-empty list of errors reported during one use of a latch.
#[derive(Debug)]
pub struct Errors(Vec<HoldError>);

impl Errors {
    /// Returns `None` for an empty list, which is the "nothing went wrong" case.
    pub(crate) fn new(errors: Vec<HoldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    /// Number of errors. Always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len()`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first error that was reported.
    #[must_use]
    #[expect(
        clippy::indexing_slicing,
        reason = "construction guarantees at least one element"
    )]
    pub fn first(&self) -> &HoldError {
        &self.0[0]
    }

    /// Iterates the errors in reporting order.
    pub fn iter(&self) -> slice::Iter<'_, HoldError> {
        self.0.iter()
    }

    /// The errors in reporting order.
    #[must_use]
    pub fn as_slice(&self) -> &[HoldError] {
        &self.0
    }

    /// Consumes the list, returning the errors in reporting order.
    #[must_use]
    pub fn into_vec(self) -> Vec<HoldError> {
        self.0
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hold(s) failed: ", self.0.len())?;

        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }

            write!(f, "[{}] {error}", error.slot())?;
        }

        Ok(())
    }
}

impl error::Error for Errors {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(self.first())
    }
}

impl IntoIterator for Errors {
    type Item = HoldError;
    type IntoIter = vec::IntoIter<HoldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a HoldError;
    type IntoIter = slice::Iter<'a, HoldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
