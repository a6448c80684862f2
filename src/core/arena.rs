//! Slot tables for kernel objects
//!
//! Every kernel object kind lives in a fixed-size arena. Objects are named by
//! a [`Handle`] carrying the slot index and the slot generation; destroying an
//! object bumps the generation, so a stale handle can never reach the object
//! that later reuses the slot.

use core::fmt;
use core::marker::PhantomData;

/// Raw slot index used by the kernel's internal lists
pub(crate) type Idx = u16;

/// Handle marker types
pub mod kind {
    pub enum Task {}
    pub enum Sem {}
    pub enum Mutex {}
    pub enum Flag {}
    pub enum Timer {}
    pub enum List {}
    pub enum ListElem {}
}

/// Opaque, generation-checked object handle
pub struct Handle<K> {
    index: Idx,
    gen: u16,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    #[inline]
    pub(crate) const fn new(index: Idx, gen: u16) -> Self {
        Self { index, gen, _kind: PhantomData }
    }

    /// Slot index, for diagnostics
    #[inline]
    pub fn index(&self) -> u16 {
        self.index
    }

    #[inline]
    pub(crate) fn idx(&self) -> Idx {
        self.index
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.gen == other.gen
    }
}

impl<K> Eq for Handle<K> {}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}#{})", self.index, self.gen)
    }
}

#[cfg(feature = "defmt")]
impl<K> defmt::Format for Handle<K> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Handle({=u16}#{=u16})", self.index, self.gen)
    }
}

struct Slot<T> {
    gen: u16,
    value: Option<T>,
}

/// Fixed-capacity slot table
pub(crate) struct Arena<K, T, const N: usize> {
    slots: [Slot<T>; N],
    len: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K, T, const N: usize> Arena<K, T, N> {
    pub const fn new() -> Self {
        Self {
            slots: [const { Slot { gen: 0, value: None } }; N],
            len: 0,
            _kind: PhantomData,
        }
    }

    /// Store a value in the first free slot
    pub fn insert(&mut self, value: T) -> Option<Handle<K>> {
        let index = self.slots.iter().position(|s| s.value.is_none())?;
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.len += 1;
        Some(Handle::new(index as Idx, slot.gen))
    }

    /// Remove the object and retire its handle
    pub fn remove(&mut self, h: Handle<K>) -> Option<T> {
        if !self.contains(h) {
            return None;
        }
        self.remove_at(h.index)
    }

    /// Remove by raw index
    pub fn remove_at(&mut self, index: Idx) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let value = slot.value.take()?;
        slot.gen = slot.gen.wrapping_add(1);
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn contains(&self, h: Handle<K>) -> bool {
        self.slots
            .get(h.index as usize)
            .is_some_and(|s| s.gen == h.gen && s.value.is_some())
    }

    #[inline]
    pub fn get(&self, h: Handle<K>) -> Option<&T> {
        let slot = self.slots.get(h.index as usize)?;
        if slot.gen != h.gen {
            return None;
        }
        slot.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, h: Handle<K>) -> Option<&mut T> {
        let slot = self.slots.get_mut(h.index as usize)?;
        if slot.gen != h.gen {
            return None;
        }
        slot.value.as_mut()
    }

    /// Live object at a raw index. Indices come from kernel lists, which
    /// only ever hold live objects.
    #[inline]
    pub fn at(&self, index: Idx) -> &T {
        match self.slots[index as usize].value.as_ref() {
            Some(v) => v,
            None => unreachable!("vacant slot {} referenced", index),
        }
    }

    #[inline]
    pub fn at_mut(&mut self, index: Idx) -> &mut T {
        match self.slots[index as usize].value.as_mut() {
            Some(v) => v,
            None => unreachable!("vacant slot {} referenced", index),
        }
    }

    /// Live object at a raw index, if any
    #[inline]
    pub fn try_at_mut(&mut self, index: Idx) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    /// Current handle of a live slot
    #[inline]
    pub fn handle_at(&self, index: Idx) -> Handle<K> {
        Handle::new(index, self.slots[index as usize].gen)
    }

    /// Two distinct live objects at once
    pub fn pair_mut(&mut self, a: Idx, b: Idx) -> (&mut T, &mut T) {
        assert_ne!(a, b);
        let (lo, hi, swap) = if a < b { (a, b, false) } else { (b, a, true) };
        let (left, right) = self.slots.split_at_mut(hi as usize);
        let x = left[lo as usize].value.as_mut();
        let y = right[0].value.as_mut();
        match (x, y) {
            (Some(x), Some(y)) if swap => (y, x),
            (Some(x), Some(y)) => (x, y),
            _ => unreachable!("vacant slot in pair_mut"),
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Raw indices of all live objects
    pub fn indices(&self) -> impl Iterator<Item = Idx> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.value.is_some())
            .map(|(i, _)| i as Idx)
    }
}
