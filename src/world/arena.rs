//! Generation-checked entity storage.
//!
//! Handles to destroyed entities must fail lookups instead of resolving to
//! whatever reused the slot, so every slot carries a generation counter that
//! advances on removal.

/// Handle into an [`Arena`]: slot index plus the generation the slot had when
/// the entity was inserted. Stale handles (slot removed or reused) fail lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> EntityId {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            EntityId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            EntityId {
                index,
                generation: 0,
            }
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation || slot.value.is_none() {
            return None;
        }

        slot.generation += 1;
        self.free.push(id.index);
        self.len -= 1;
        slot.value.take()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Iterate live entities in stable slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    EntityId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = Arena::new();
        let id = arena.insert("alpha");

        assert_eq!(arena.get(id), Some(&"alpha"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_stale_handle_fails_lookup() {
        let mut arena = Arena::new();
        let id = arena.insert(1);

        assert_eq!(arena.remove(id), Some(1));
        assert_eq!(arena.get(id), None);
        assert_eq!(arena.remove(id), None);

        // Slot reuse must not resurrect the old handle.
        let new_id = arena.insert(2);
        assert_eq!(arena.get(id), None);
        assert_eq!(arena.get(new_id), Some(&2));
    }

    #[test]
    fn test_iter_stable_order() {
        let mut arena = Arena::new();
        let a = arena.insert(10);
        let _b = arena.insert(20);
        let _c = arena.insert(30);
        arena.remove(a);

        let values: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![20, 30]);
    }
}
