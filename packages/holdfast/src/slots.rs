use std::fmt;

/// Number of slot ids a single latch use can hand out, including the implicit initial hold.
///
/// The slots live in a 64-bit set with bit 0 reserved for [`SlotId::NONE`].
pub const SLOT_CAPACITY: usize = u64::BITS as usize - 1;

/// Maximum number of holds a single latch use can have outstanding at the same time, not
/// counting the implicit initial hold released by [`Latch::go()`][crate::Latch::go].
pub const MAX_HOLDS: usize = SLOT_CAPACITY - 1;

/// Identifies one hold within a single use of a latch.
///
/// Errors reported through a [`Release`][crate::Release] are tagged with the slot id of that
/// release, so the completion callback can correlate failures with specific sub-operations.
///
/// Slot 1 is always the implicit initial hold. Slot 0 ([`SlotId::NONE`]) is never allocated;
/// it tags errors that do not belong to any allocated slot, such as capacity exhaustion.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SlotId(u8);

impl SlotId {
    /// The "no slot" sentinel.
    pub const NONE: Self = Self(0);

    /// The slot of the implicit initial hold.
    pub const INITIAL: Self = Self(1);

    /// The numeric value of the slot id.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether this is the [`SlotId::NONE`] sentinel.
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(value: u8) -> Self {
        Self(value)
    }

    fn bit(self) -> u64 {
        1_u64 << self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// All slot ids of a latch use have been handed out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct CapacityExceeded;

/// Fixed-width set of outstanding slot ids.
///
/// Ids are handed out in increasing order and are never reused until the set is [reset][1],
/// so every id identifies exactly one hold within one latch use.
///
/// [1]: Self::reset
#[derive(Clone, Copy, Eq, PartialEq)]
pub(crate) struct SlotSet {
    outstanding: u64,

    /// The id the next allocation will hand out. Starts at 1 because 0 is the sentinel.
    /// Reaching `u64::BITS` means the set is exhausted.
    next: u32,
}

impl SlotSet {
    pub(crate) const fn new() -> Self {
        Self {
            outstanding: 0,
            next: 1,
        }
    }

    pub(crate) fn allocate(&mut self) -> Result<SlotId, CapacityExceeded> {
        if self.next >= u64::BITS {
            return Err(CapacityExceeded);
        }

        #[expect(
            clippy::cast_possible_truncation,
            reason = "guarded above, next is always below 64"
        )]
        let id = SlotId(self.next as u8);

        self.next = self.next.wrapping_add(1);
        self.outstanding |= id.bit();

        Ok(id)
    }

    /// Marks the slot as done and returns the set of slots that remain outstanding.
    ///
    /// Marking [`SlotId::NONE`] or an already-done slot changes nothing.
    pub(crate) fn mark_done(&mut self, id: SlotId) -> Self {
        if !id.is_none() {
            self.outstanding &= !id.bit();
        }

        *self
    }

    pub(crate) fn is_outstanding(&self, id: SlotId) -> bool {
        !id.is_none() && self.outstanding & id.bit() != 0
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.outstanding == 0
    }

    pub(crate) fn outstanding_count(&self) -> usize {
        self.outstanding.count_ones() as usize
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SlotSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SlotSet {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotSet")
            .field("outstanding", &format_args!("{:#066b}", self.outstanding))
            .field("next", &self.next)
            .finish()
    }
}
