use std::cell::Cell;
use std::fmt;
use std::num::NonZero;

/// Generation tag of one use of a pooled latch state.
///
/// Handles capture the epoch they were issued under and compare it against the epoch the
/// state currently carries. A mismatch means the handle outlived the use it belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Epoch(NonZero<u64>);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Issues epochs that are unique within one counter.
#[derive(Debug)]
pub(crate) struct EpochCounter {
    last: Cell<u64>,
}

impl EpochCounter {
    pub(crate) const fn new() -> Self {
        Self { last: Cell::new(0) }
    }

    pub(crate) fn next(&self) -> Epoch {
        let value = self
            .last
            .get()
            .checked_add(1)
            .expect("epoch counter overflowed - more than u64::MAX latch uses in one pool");

        self.last.set(value);

        Epoch(NonZero::new(value).expect("incremented from a non-negative value"))
    }
}
