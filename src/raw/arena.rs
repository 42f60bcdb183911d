use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::mem;

use super::handle::Handle;

/// Slot allocator backing every non-root node.
///
/// Slots move through a reserve/fill/free lifecycle: a slot is first reserved (its handle becomes
/// known but nothing is stored yet), then filled. Removing a node leaves its slot reserved, so the
/// caller decides whether to refill it or release it with [`Arena::free_reserved_slot`]. This lets
/// split and merge publish a node's final handle before the node itself is complete.
#[derive(Clone)]
pub(crate) struct Arena<T> {
    slots: Slots<T>,
    occupied: usize,
}

#[derive(Clone)]
enum Slots<T> {
    /// Dense slot vector; freed handles go on a free list and are handed out again.
    Reused { slots: Vec<Option<T>>, free: Vec<Handle> },
    /// Handles come from a counter and freeing drops the slot. The counter wraps once the handle
    /// space is exhausted, skipping slots still in use.
    Fresh { slots: BTreeMap<usize, Option<T>>, next: usize },
}

/// Proof that a slot is reserved and not yet filled.
///
/// Must be consumed by [`Arena::fill_reserved_slot`] or [`Arena::free_reserved_slot`].
#[must_use = "a reserved slot must be filled or freed"]
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct ReservedSlot {
    handle: Handle,
}

impl<T> Arena<T> {
    pub(crate) const fn new(reuse_slots: bool) -> Self {
        let slots = if reuse_slots {
            Slots::Reused {
                slots: Vec::new(),
                free: Vec::new(),
            }
        } else {
            Slots::Fresh {
                slots: BTreeMap::new(),
                next: 0,
            }
        };
        Self { slots, occupied: 0 }
    }

    /// Number of filled slots.
    pub(crate) const fn len(&self) -> usize {
        self.occupied
    }

    /// Number of slots holding storage, filled or reserved.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        match &self.slots {
            Slots::Reused { slots, .. } => slots.len(),
            Slots::Fresh { slots, .. } => slots.len(),
        }
    }

    /// Claims a slot, reusing a freed one when slot reuse is enabled.
    pub(crate) fn reserve_slot(&mut self) -> (Handle, ReservedSlot) {
        let index = match &mut self.slots {
            Slots::Reused { slots, free } => {
                if let Some(handle) = free.pop() {
                    return (handle, ReservedSlot { handle });
                }
                assert_capacity(slots.len());
                slots.push(None);
                slots.len() - 1
            }
            Slots::Fresh { slots, next } => {
                assert_capacity(slots.len());
                while slots.contains_key(&*next) {
                    *next = wrapping_next(*next);
                }
                let index = *next;
                slots.insert(index, None);
                *next = wrapping_next(index);
                index
            }
        };
        let handle = Handle::from_index(index);
        (handle, ReservedSlot { handle })
    }

    pub(crate) fn fill_reserved_slot(&mut self, slot: ReservedSlot, element: T) {
        let entry = self
            .slot_mut(slot.handle)
            .expect("`Arena::fill_reserved_slot()` - slot was never reserved!");
        debug_assert!(entry.is_none(), "`Arena::fill_reserved_slot()` - slot is already filled!");
        *entry = Some(element);
        self.occupied += 1;
    }

    /// Takes the element out of a slot, keeping the slot reserved.
    pub(crate) fn remove_and_reserve(&mut self, handle: Handle) -> (ReservedSlot, T) {
        let element = self
            .slot_mut(handle)
            .and_then(Option::take)
            .expect("`Arena::remove_and_reserve()` - `handle` is invalid!");
        self.occupied -= 1;
        (ReservedSlot { handle }, element)
    }

    /// Releases a reserved slot. Its handle is handed out again only when slot reuse is enabled;
    /// otherwise the slot's storage is dropped.
    pub(crate) fn free_reserved_slot(&mut self, slot: ReservedSlot) {
        let index = slot.handle.to_index();
        match &mut self.slots {
            Slots::Reused { slots, free } => {
                debug_assert!(slots[index].is_none(), "`Arena::free_reserved_slot()` - slot is still filled!");
                free.push(slot.handle);
            }
            Slots::Fresh { slots, .. } => {
                let released = slots.remove(&index);
                debug_assert!(matches!(released, Some(None)), "`Arena::free_reserved_slot()` - slot is still filled!");
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        let index = handle.to_index();
        let slot = match &self.slots {
            Slots::Reused { slots, .. } => slots.get(index),
            Slots::Fresh { slots, .. } => slots.get(&index),
        };
        slot.and_then(Option::as_ref).expect("`Arena::get()` - `handle` is invalid!")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slot_mut(handle)
            .and_then(Option::as_mut)
            .expect("`Arena::get_mut()` - `handle` is invalid!")
    }

    #[inline]
    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Option<T>> {
        let index = handle.to_index();
        match &mut self.slots {
            Slots::Reused { slots, .. } => slots.get_mut(index),
            Slots::Fresh { slots, .. } => slots.get_mut(&index),
        }
    }

    /// Drains every filled slot, in slot order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> {
        self.occupied = 0;
        let slots: Vec<Option<T>> = match &mut self.slots {
            Slots::Reused { slots, free } => {
                free.clear();
                mem::take(slots)
            }
            Slots::Fresh { slots, .. } => mem::take(slots).into_values().collect(),
        };
        slots.into_iter().flatten()
    }
}

fn assert_capacity(used: usize) {
    assert!(
        used <= Handle::MAX,
        "`Arena::reserve_slot()` - arena is at maximum capacity ({})",
        Handle::MAX
    );
}

const fn wrapping_next(index: usize) -> usize {
    if index == Handle::MAX { 0 } else { index + 1 }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn freed_slots_are_reused_only_when_enabled() {
        let mut reusing: Arena<u32> = Arena::new(true);
        let (first, slot) = reusing.reserve_slot();
        reusing.fill_reserved_slot(slot, 1);
        let (slot, value) = reusing.remove_and_reserve(first);
        assert_eq!(value, 1);
        reusing.free_reserved_slot(slot);
        let (again, slot) = reusing.reserve_slot();
        assert_eq!(again, first);
        reusing.fill_reserved_slot(slot, 2);

        let mut fresh: Arena<u32> = Arena::new(false);
        let (first, slot) = fresh.reserve_slot();
        fresh.fill_reserved_slot(slot, 1);
        let (slot, _) = fresh.remove_and_reserve(first);
        fresh.free_reserved_slot(slot);
        let (next, slot) = fresh.reserve_slot();
        assert_ne!(next, first);
        fresh.fill_reserved_slot(slot, 2);
    }

    #[test]
    fn removed_slot_can_be_refilled() {
        let mut arena: Arena<&str> = Arena::new(false);
        let (handle, slot) = arena.reserve_slot();
        arena.fill_reserved_slot(slot, "left");
        let (slot, old) = arena.remove_and_reserve(handle);
        assert_eq!(old, "left");
        assert_eq!(arena.len(), 0);
        arena.fill_reserved_slot(slot, "right");
        assert_eq!(*arena.get(handle), "right");
        assert_eq!(arena.len(), 1);
    }

    #[test]
    #[should_panic(expected = "`Arena::get()` - `handle` is invalid!")]
    fn reserved_slot_is_not_readable() {
        let mut arena: Arena<u8> = Arena::new(false);
        let (handle, _slot) = arena.reserve_slot();
        let _ = arena.get(handle);
    }

    #[test]
    fn freed_slots_release_their_storage() {
        for reuse in [false, true] {
            let mut arena: Arena<u32> = Arena::new(reuse);
            for round in 0..1_000 {
                let handles: Vec<Handle> = (0..8)
                    .map(|i| {
                        let (handle, slot) = arena.reserve_slot();
                        arena.fill_reserved_slot(slot, round + i);
                        handle
                    })
                    .collect();
                for handle in handles {
                    let (slot, _) = arena.remove_and_reserve(handle);
                    arena.free_reserved_slot(slot);
                }
                assert_eq!(arena.len(), 0);
                assert!(arena.slot_count() <= 8, "reuse={reuse}: {} slots after round {round}", arena.slot_count());
            }
        }
    }

    #[test]
    fn fresh_handles_wrap_around_live_slots() {
        let mut arena: Arena<usize> = Arena::new(false);
        let (pinned, slot) = arena.reserve_slot();
        arena.fill_reserved_slot(slot, usize::MAX);

        let mut previous = pinned;
        for i in 0..Handle::MAX + 10 {
            let (handle, slot) = arena.reserve_slot();
            assert_ne!(handle, pinned);
            assert_ne!(handle, previous);
            arena.fill_reserved_slot(slot, i);
            let (slot, value) = arena.remove_and_reserve(handle);
            assert_eq!(value, i);
            arena.free_reserved_slot(slot);
            previous = handle;
        }

        assert_eq!(*arena.get(pinned), usize::MAX);
        assert_eq!(arena.slot_count(), 1);
    }

    proptest! {
        #[test]
        fn arena_behaves_like_vec(operations in prop::collection::vec(strategy(), 0..256), reuse in any::<bool>()) {
            let mut model: Vec<(Handle, u32)> = Vec::new();
            let mut arena: Arena<u32> = Arena::new(reuse);

            for operation in operations {
                match operation {
                    Operation::Insert(value) => {
                        let (handle, slot) = arena.reserve_slot();
                        prop_assert!(model.iter().all(|&(h, _)| h != handle));
                        arena.fill_reserved_slot(slot, value);
                        model.push((handle, value));
                    }
                    Operation::GetMut(which, value) => {
                        if model.is_empty() {
                            continue;
                        }

                        let index = which % model.len();
                        let handle = model[index].0;
                        *arena.get_mut(handle) = value;
                        model[index].1 = value;
                    }
                    Operation::Replace(which, value) => {
                        if model.is_empty() {
                            continue;
                        }

                        let index = which % model.len();
                        let handle = model[index].0;
                        let (slot, old) = arena.remove_and_reserve(handle);
                        prop_assert_eq!(old, model[index].1);
                        arena.fill_reserved_slot(slot, value);
                        model[index].1 = value;
                    }
                    Operation::Free(which) => {
                        if model.is_empty() {
                            continue;
                        }

                        let index = which % model.len();
                        let handle = model[index].0;
                        let (slot, value) = arena.remove_and_reserve(handle);
                        arena.free_reserved_slot(slot);
                        let (_, expected) = model.swap_remove(index);
                        prop_assert_eq!(value, expected);
                    }
                }

                prop_assert_eq!(arena.len(), model.len());

                for &(handle, value) in &model {
                    prop_assert_eq!(*arena.get(handle), value);
                }
            }

            let mut drained: Vec<u32> = arena.drain().collect();
            let mut expected: Vec<u32> = model.iter().map(|&(_, v)| v).collect();
            drained.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(drained, expected);
        }
    }

    #[derive(Clone, Debug)]
    enum Operation {
        Insert(u32),
        GetMut(usize, u32),
        Replace(usize, u32),
        Free(usize),
    }

    fn strategy() -> impl Strategy<Value = Operation> {
        prop_oneof![
            20 => any::<u32>().prop_map(Operation::Insert),
            5 => (any::<usize>(), any::<u32>()).prop_map(|(which, value)| Operation::GetMut(which, value)),
            5 => (any::<usize>(), any::<u32>()).prop_map(|(which, value)| Operation::Replace(which, value)),
            5 => any::<usize>().prop_map(Operation::Free),
        ]
    }
}
