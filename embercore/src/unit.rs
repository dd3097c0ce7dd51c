//! Entity identity. A [`UnitId`] is a 32-bit generational index: the low 16
//! bits select a slot in [`UnitManager`]'s slot table, the high 16 bits are
//! the generation stamped into that slot when it was last allocated. A unit
//! is alive iff its generation matches the slot's current generation.

use std::fmt;
use tracing::trace;

/// Sentinel that no valid [`UnitId`] ever equals.
pub const UNIT_INVALID: UnitId = UnitId(u32::MAX);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct UnitId(u32);

impl UnitId {
    const GENERATION_SHIFT: u32 = 16;
    const SLOT_MASK: u32 = 0x0000_ffff;

    fn pack(slot: u16, generation: u16) -> Self {
        UnitId(((generation as u32) << Self::GENERATION_SHIFT) | slot as u32)
    }

    pub fn slot(self) -> u16 {
        (self.0 & Self::SLOT_MASK) as u16
    }

    pub fn generation(self) -> u16 {
        (self.0 >> Self::GENERATION_SHIFT) as u16
    }

    pub fn is_invalid(self) -> bool {
        self == UNIT_INVALID
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "UnitId(INVALID)")
        } else {
            write!(f, "UnitId(slot={}, gen={})", self.slot(), self.generation())
        }
    }
}

#[derive(Copy, Clone)]
struct Slot {
    generation: u16,
    alive: bool,
}

/// Opaque handle returned by [`UnitManager::register_destroy_callback`],
/// used to unregister it later.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CallbackHandle(u64);

struct Callback {
    handle: CallbackHandle,
    f: Box<dyn FnMut(UnitId)>,
}

/// Allocates [`UnitId`]s, tracks liveness, and fans destruction out to every
/// registered subsystem destroyer in registration order.
#[derive(Default)]
pub struct UnitManager {
    slots: Vec<Slot>,
    freelist: Vec<u16>,
    callbacks: Vec<Callback>,
    next_callback_handle: u64,
}

impl UnitManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh [`UnitId`], reusing a freed slot (with an advanced
    /// generation) when one is available.
    pub fn create(&mut self) -> UnitId {
        if let Some(slot_index) = self.freelist.pop() {
            let slot = &mut self.slots[slot_index as usize];
            slot.alive = true;
            let id = UnitId::pack(slot_index, slot.generation);
            trace!(?id, "unit created (recycled slot)");
            return id;
        }

        let slot_index = self.slots.len();
        assert!(slot_index < u16::MAX as usize, "unit slot table exhausted");
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        let id = UnitId::pack(slot_index as u16, 0);
        trace!(?id, "unit created (new slot)");
        id
    }

    /// Destroys `id`. A no-op if `id` is already dead. Invokes every
    /// registered destroy callback (in registration order) before the slot
    /// is recycled, so callbacks observe a still-valid id.
    pub fn destroy(&mut self, id: UnitId) {
        if !self.alive(id) {
            return;
        }

        for cb in &mut self.callbacks {
            (cb.f)(id);
        }

        let slot = &mut self.slots[id.slot() as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.freelist.push(id.slot());
        trace!(?id, "unit destroyed");
    }

    pub fn alive(&self, id: UnitId) -> bool {
        if id.is_invalid() {
            return false;
        }
        match self.slots.get(id.slot() as usize) {
            Some(slot) => slot.alive && slot.generation == id.generation(),
            None => false,
        }
    }

    pub fn register_destroy_callback<F>(&mut self, f: F) -> CallbackHandle
    where
        F: FnMut(UnitId) + 'static,
    {
        let handle = CallbackHandle(self.next_callback_handle);
        self.next_callback_handle += 1;
        self.callbacks.push(Callback {
            handle,
            f: Box::new(f),
        });
        handle
    }

    pub fn unregister_destroy_callback(&mut self, handle: CallbackHandle) {
        self.callbacks.retain(|cb| cb.handle != handle);
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_destroy_round_trip() {
        let mut mgr = UnitManager::new();
        let id = mgr.create();
        assert!(mgr.alive(id));
        mgr.destroy(id);
        assert!(!mgr.alive(id));
    }

    #[test]
    fn destroying_dead_id_is_noop() {
        let mut mgr = UnitManager::new();
        let id = mgr.create();
        mgr.destroy(id);
        mgr.destroy(id); // must not panic
        assert!(!mgr.alive(id));
    }

    #[test]
    fn recycled_slot_gets_new_generation() {
        let mut mgr = UnitManager::new();
        let a = mgr.create();
        mgr.destroy(a);
        let b = mgr.create();
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a.generation(), b.generation());
        assert!(!mgr.alive(a));
        assert!(mgr.alive(b));
    }

    #[test]
    fn callbacks_fire_in_registration_order() {
        let mut mgr = UnitManager::new();
        let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

        let o1 = order.clone();
        mgr.register_destroy_callback(move |_| o1.borrow_mut().push(1));
        let o2 = order.clone();
        mgr.register_destroy_callback(move |_| o2.borrow_mut().push(2));

        let id = mgr.create();
        mgr.destroy(id);

        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn unregistered_callback_does_not_fire() {
        let mut mgr = UnitManager::new();
        let fired = std::rc::Rc::new(std::cell::RefCell::new(false));
        let f = fired.clone();
        let handle = mgr.register_destroy_callback(move |_| *f.borrow_mut() = true);
        mgr.unregister_destroy_callback(handle);

        let id = mgr.create();
        mgr.destroy(id);
        assert!(!*fired.borrow());
    }

    #[test]
    fn invalid_id_is_never_alive() {
        let mgr = UnitManager::new();
        assert!(!mgr.alive(UNIT_INVALID));
    }
}
