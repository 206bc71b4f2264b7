use std::any::type_name;
use std::fmt;

/// Index-addressed arena that recycles instances of `T` through a free list.
///
/// [`get()`][1] hands out the index of a vacant instance if there is one and only constructs a
/// new instance (via `T::default()`) when the free list is empty. [`put()`][2] makes an index
/// vacant again. The pool never resets or drops recycled instances; whoever owns the instances
/// is responsible for bringing a recycled instance back into a usable state.
///
/// Indexes are stable for the lifetime of the pool, so they can be stored in handles.
///
/// [1]: Self::get
/// [2]: Self::put
pub(crate) struct Pool<T> {
    items: Vec<T>,

    /// Indexes of vacant items, most recently vacated last.
    vacant: Vec<usize>,
}

impl<T: Default> Pool<T> {
    /// Creates a pool with `count` vacant instances already constructed.
    pub(crate) fn with_vacant(count: usize) -> Self {
        let mut pool = Self {
            items: Vec::with_capacity(count),
            vacant: Vec::with_capacity(count),
        };

        for index in 0..count {
            pool.items.push(T::default());
            pool.vacant.push(index);
        }

        // Hand out the lowest index first.
        pool.vacant.reverse();

        pool
    }

    /// Takes a vacant item out of the pool, constructing a new one if none is vacant.
    pub(crate) fn get(&mut self) -> usize {
        if let Some(index) = self.vacant.pop() {
            return index;
        }

        let index = self.items.len();
        self.items.push(T::default());
        index
    }
}

impl<T> Pool<T> {
    /// Returns an item to the pool so a future [`get()`][Self::get] can hand it out again.
    pub(crate) fn put(&mut self, index: usize) {
        debug_assert!(index < self.items.len(), "index {index} was never handed out");
        debug_assert!(
            !self.vacant.contains(&index),
            "index {index} returned to pool twice"
        );

        self.vacant.push(index);
    }

    pub(crate) fn get_ref(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Number of items ever constructed by the pool, vacant or not.
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Number of items currently sitting in the free list.
    pub(crate) fn vacant_len(&self) -> usize {
        self.vacant.len()
    }
}

impl<T> fmt::Debug for Pool<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("len", &self.items.len())
            .field("vacant", &self.vacant.len())
            .finish()
    }
}
