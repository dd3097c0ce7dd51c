//! Capsule character movers: kinematic bodies driven by `mover_move` rather
//! than the scene graph, with ground/ceiling/wall collision flags sampled
//! from the last `move_shape` call.

use super::CollisionFilter;
use crate::unit::UnitId;
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};
use std::collections::HashMap;

const NIL: u32 = u32::MAX;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct MoverInstance(u32);

impl MoverInstance {
    pub const INVALID: MoverInstance = MoverInstance(NIL);
    pub fn is_valid(self) -> bool {
        self.0 != NIL
    }
}

#[derive(Copy, Clone, Default, Eq, PartialEq, Debug)]
pub struct MoveResult {
    pub collides_up: bool,
    pub collides_down: bool,
    pub collides_sides: bool,
}

#[derive(Clone)]
pub(super) struct MoverEntry {
    pub unit: UnitId,
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub radius: f32,
    pub height: f32,
    pub max_slope_deg: f32,
    pub filter: CollisionFilter,
    pub last_flags: MoveResult,
}

#[derive(Default)]
pub(super) struct MoverStorage {
    entries: Vec<Option<MoverEntry>>,
    of_unit: HashMap<UnitId, u32>,
}

impl MoverStorage {
    pub fn create(
        &mut self,
        unit: UnitId,
        body: RigidBodyHandle,
        collider: ColliderHandle,
        radius: f32,
        height: f32,
        max_slope_deg: f32,
        filter: CollisionFilter,
    ) -> MoverInstance {
        let index = self.entries.len() as u32;
        self.entries.push(Some(MoverEntry {
            unit,
            body,
            collider,
            radius,
            height,
            max_slope_deg,
            filter,
            last_flags: MoveResult::default(),
        }));
        self.of_unit.insert(unit, index);
        MoverInstance(index)
    }

    pub fn destroy(&mut self, mover: MoverInstance) {
        if let Some(entry) = self.entries.get_mut(mover.0 as usize).and_then(Option::take) {
            self.of_unit.remove(&entry.unit);
        }
    }

    pub fn get(&self, mover: MoverInstance) -> Option<&MoverEntry> {
        self.entries.get(mover.0 as usize)?.as_ref()
    }

    pub fn instance_of(&self, unit: UnitId) -> MoverInstance {
        self.of_unit.get(&unit).map(|&i| MoverInstance(i)).unwrap_or(MoverInstance::INVALID)
    }

    pub fn set_last_flags(&mut self, mover: MoverInstance, flags: MoveResult) {
        if let Some(Some(entry)) = self.entries.get_mut(mover.0 as usize) {
            entry.last_flags = flags;
        }
    }

    pub fn set_filter(&mut self, mover: MoverInstance, filter: CollisionFilter) {
        if let Some(Some(entry)) = self.entries.get_mut(mover.0 as usize) {
            entry.filter = filter;
        }
    }
}
