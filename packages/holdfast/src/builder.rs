use std::fmt;

use crate::{LatchPool, Scheduler};

/// Builder for creating an instance of [`LatchPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`LatchPool::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use holdfast::{LatchPool, TickQueue};
///
/// let pool = LatchPool::builder(TickQueue::new())
///     .initial_capacity(64)
///     .build();
///
/// assert_eq!(pool.len(), 64);
/// assert_eq!(pool.active_len(), 0);
/// ```
///
/// [1]: LatchPool::new
#[must_use]
pub struct LatchPoolBuilder {
    scheduler: Box<dyn Scheduler>,
    initial_capacity: usize,
}

impl fmt::Debug for LatchPoolBuilder {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatchPoolBuilder")
            .field("initial_capacity", &self.initial_capacity)
            .finish_non_exhaustive()
    }
}

impl LatchPoolBuilder {
    pub(crate) fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            initial_capacity: 0,
        }
    }

    /// Sets the number of latch states to create up front.
    ///
    /// The pool grows on demand either way; pre-creating states moves the allocations out of
    /// the first burst of [`acquire()`][LatchPool::acquire] calls. Defaults to zero.
    pub fn initial_capacity(mut self, count: usize) -> Self {
        self.initial_capacity = count;
        self
    }

    /// Builds the latch pool with the specified configuration.
    #[must_use]
    pub fn build(self) -> LatchPool {
        LatchPool::new_inner(self.scheduler, self.initial_capacity)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::TickQueue;

    #[test]
    fn default_starts_empty() {
        let pool = LatchPool::builder(TickQueue::new()).build();

        assert!(pool.is_empty());
    }

    #[test]
    fn last_capacity_wins() {
        let pool = LatchPool::builder(TickQueue::new())
            .initial_capacity(8)
            .initial_capacity(2)
            .build();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.idle_len(), 2);
    }
}
