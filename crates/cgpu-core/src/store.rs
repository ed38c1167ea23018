use std::marker::PhantomData;

use crate::error::CoreError;
use crate::handle::{Handle, StoreHandle};

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot-based allocator mapping typed handles to resource payloads.
///
/// Freed slots go on a LIFO free list and are reused by later allocations.
/// Every free bumps the slot generation, so a handle captured before the free
/// no longer resolves once the slot is reused.
pub struct ResourceStore<H: StoreHandle, T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
    _marker: PhantomData<H>,
}

impl<H: StoreHandle, T> ResourceStore<H, T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(initial_capacity),
            free_list: Vec::new(),
            live: 0,
            _marker: PhantomData,
        }
    }

    /// Store a payload and return a fresh handle for it.
    pub fn allocate(&mut self, value: T) -> H {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return H::from_handle(Handle::new(index, slot.generation));
        }

        let index = self.slots.len() as u32;
        // Generations start at 1: a bare slot number never resolves.
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        H::from_handle(Handle::new(index, 1))
    }

    fn slot_index(&self, handle: H) -> Option<usize> {
        let raw = handle.handle();
        let index = raw.index()? as usize;
        let slot = self.slots.get(index)?;
        if slot.generation != raw.generation() || slot.value.is_none() {
            return None;
        }
        Some(index)
    }

    pub fn contains(&self, handle: H) -> bool {
        self.slot_index(handle).is_some()
    }

    pub fn get(&self, handle: H) -> Option<&T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_ref()
    }

    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_mut()
    }

    /// Resolve a handle, failing for null, out-of-range, freed or stale handles.
    pub fn resolve(&self, handle: H) -> Result<&T, CoreError> {
        self.get(handle).ok_or_else(|| invalid(handle))
    }

    pub fn resolve_mut(&mut self, handle: H) -> Result<&mut T, CoreError> {
        self.get_mut(handle).ok_or_else(|| invalid(handle))
    }

    /// Release a slot and hand its payload back to the caller, which owns any
    /// native teardown. Freeing the same handle twice fails.
    pub fn free(&mut self, handle: H) -> Result<T, CoreError> {
        let index = self.slot_index(handle).ok_or_else(|| invalid(handle))?;
        let slot = &mut self.slots[index];
        let value = slot.value.take().ok_or_else(|| invalid(handle))?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free_list.push(index as u32);
        self.live -= 1;
        Ok(value)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever created (the high-water mark).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Handles of every live slot, in slot order.
    pub fn handles(&self) -> Vec<H> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some())
            .map(|(index, slot)| H::from_handle(Handle::new(index as u32, slot.generation)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|v| (H::from_handle(Handle::new(index as u32, slot.generation)), v))
        })
    }
}

impl<H: StoreHandle, T> Default for ResourceStore<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid<H: StoreHandle>(handle: H) -> CoreError {
    CoreError::InvalidHandle {
        kind: H::KIND.name(),
        raw: handle.handle().raw(),
    }
}
