//! Generational handle table
//!
//! Plugins are referred to by opaque 32-bit handles rather than table
//! indices. Each slot carries a 16-bit generation counter that is bumped when
//! the slot is released, so a handle issued for a previous occupant fails
//! validation in O(1) instead of silently aliasing the new one.

use std::num::NonZeroU32;

/// Slot count used when a caller asks for a zero-capacity table.
pub const DEFAULT_CAPACITY: usize = 8;

/// An opaque reference to a table slot: generation in the high 16 bits,
/// slot index in the low 16.
///
/// Generations start at 1 and skip 0 when they wrap, so a packed handle is
/// never zero — the zero word stays free as a C-side "no handle" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU32);

impl Handle {
    fn pack(generation: u16, index: u16) -> Self {
        let raw = (u32::from(generation) << 16) | u32::from(index);
        // Generation is never 0, so the packed value is never 0.
        Self(NonZeroU32::new(raw).expect("generation 0 is reserved"))
    }

    /// The raw packed value, suitable for passing across the C ABI.
    pub fn to_raw(self) -> u32 {
        self.0.get()
    }

    /// Rebuild a handle from its raw packed value. Zero is the sentinel for
    /// "no handle" and yields `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub(crate) fn index(self) -> u16 {
        (self.0.get() & 0xffff) as u16
    }

    pub(crate) fn generation(self) -> u16 {
        (self.0.get() >> 16) as u16
    }
}

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

/// Fixed-capacity pool of slots with generational validation.
///
/// Capacity is fixed at construction; [`HandleTable::insert`] returns `None`
/// when every slot is occupied. Validation ([`HandleTable::get`]) succeeds
/// only while the slot's current generation matches the handle's embedded
/// one.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u16>,
}

impl<T> HandleTable<T> {
    /// Create a table with `capacity` slots. A zero capacity is substituted
    /// with [`DEFAULT_CAPACITY`]; anything beyond the 16-bit index space is
    /// clamped.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity.min(1 << 16)
        };

        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Slot {
                generation: 1,
                value: None,
            });
        }

        // Seed the free list in descending index order so the first
        // allocation pops index 0.
        let free = (0..capacity as u16).rev().collect();

        Self { slots, free }
    }

    /// Number of slots in the table.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Claim a free slot for `value` and mint a handle for it. Returns `None`
    /// when the table is full. The slot's generation is unchanged by
    /// allocation; only release bumps it.
    pub fn insert(&mut self, value: T) -> Option<Handle> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[usize::from(index)];
        slot.value = Some(value);
        Some(Handle::pack(slot.generation, index))
    }

    /// Validate `handle` and return the slot value. `None` for stale or
    /// never-issued handles.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(usize::from(handle.index()))?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable variant of [`HandleTable::get`].
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(usize::from(handle.index()))?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Release the slot behind `handle`, returning its value. The generation
    /// is bumped (wrapping, skipping 0) so every previously issued handle for
    /// this slot is permanently invalidated, and the index goes back on the
    /// free list.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index();
        let slot = self.slots.get_mut(usize::from(index))?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            generation => generation,
        };
        self.free.push(index);
        Some(value)
    }

    /// Release every occupied slot, returning the values in index order.
    /// Generations are bumped as in [`HandleTable::remove`], so all
    /// outstanding handles are invalidated.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len());
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = match slot.generation.wrapping_add(1) {
                    0 => 1,
                    generation => generation,
                };
                self.free.push(index as u16);
                values.push(value);
            }
        }
        values
    }
}
