//! Path keyed registries.
//!
//! Both registries are thin wrappers around [`Registry`], a small slot table
//! with linear lookup. Route tables on a device hold a handful of entries, so
//! a scan over a contiguous vector beats hashing both in code size and in
//! memory.
//!
//! Keys are compared byte for byte. Entries are addressed either by path or
//! by the [`EntryId`] handed out on insert. Ids carry a generation, so an id
//! kept around after its entry was removed never resolves to a later entry
//! that happens to reuse the slot.

use std::mem;

use crate::error::{Error, Result};

pub mod handler;
pub mod resource;

/// Handle to a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

#[derive(Debug)]
struct Entry<T> {
    path: String,
    value: T,
}

#[derive(Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    len: usize,
}

impl<T> Registry<T> {
    pub const fn new() -> Self {
        Registry {
            slots: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `value` at `path`, or replace the value already there.
    ///
    /// A replacement keeps the slot, the key and the id, and hands back the
    /// previous value. Inserting a new path allocates the key and possibly
    /// grows the table; if either allocation fails nothing is changed.
    pub fn put(&mut self, path: &str, value: T) -> Result<(EntryId, Option<T>)> {
        if let Some(index) = self.position(path) {
            let slot = &mut self.slots[index];
            // position() only returns occupied slots.
            let entry = slot.entry.as_mut().ok_or_else(|| Error::NotFound(path.into()))?;
            let old = mem::replace(&mut entry.value, value);

            let id = EntryId {
                index,
                generation: slot.generation,
            };
            return Ok((id, Some(old)));
        }

        let mut key = String::new();
        key.try_reserve_exact(path.len())
            .map_err(|_| Error::Alloc(path.len()))?;
        key.push_str(path);

        let entry = Entry { path: key, value };

        let index = match self.slots.iter().position(|s| s.entry.is_none()) {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots
                    .try_reserve(1)
                    .map_err(|_| Error::Alloc(mem::size_of::<Slot<T>>()))?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        };

        self.len += 1;

        let id = EntryId {
            index,
            generation: self.slots[index].generation,
        };
        Ok((id, None))
    }

    pub fn get(&self, path: &str) -> Option<&T> {
        let index = self.position(path)?;
        self.slots[index].entry.as_ref().map(|e| &e.value)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut T> {
        let index = self.position(path)?;
        self.slots[index].entry.as_mut().map(|e| &mut e.value)
    }

    pub fn id_of(&self, path: &str) -> Option<EntryId> {
        let index = self.position(path)?;
        Some(EntryId {
            index,
            generation: self.slots[index].generation,
        })
    }

    pub fn get_by_id(&self, id: EntryId) -> Option<&T> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref().map(|e| &e.value)
    }

    pub fn get_by_id_mut(&mut self, id: EntryId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut().map(|e| &mut e.value)
    }

    /// Remove the entry at `path`, returning its value.
    ///
    /// The slot's generation is bumped so outstanding ids go stale.
    pub fn remove(&mut self, path: &str) -> Option<T> {
        let index = self.position(path)?;
        let slot = &mut self.slots[index];
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        Some(entry.value)
    }

    /// Drop every entry. Slots are kept so ids stay unique.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.len = 0;
    }

    /// Release spare capacity, typically once registration is done.
    pub fn shrink(&mut self) {
        self.slots.shrink_to_fit();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.slots
            .iter()
            .filter_map(|s| s.entry.as_ref())
            .map(|e| (e.path.as_str(), &e.value))
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.slots.iter().position(|s| match &s.entry {
            Some(e) => e.path == path,
            None => false,
        })
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
