//! Shared dense `UnitId -> instance` storage, the same swap-on-remove
//! layout as `scene_graph`'s node array, reused across every renderable
//! sub-manager.

use crate::unit::UnitId;
use std::collections::HashMap;

pub(super) struct DenseMap<T> {
    pub values: Vec<T>,
    pub unit_of: Vec<UnitId>,
    pub index_of: HashMap<UnitId, u32>,
}

impl<T> Default for DenseMap<T> {
    fn default() -> Self {
        DenseMap {
            values: Vec::new(),
            unit_of: Vec::new(),
            index_of: HashMap::new(),
        }
    }
}

impl<T> DenseMap<T> {
    pub fn insert(&mut self, unit: UnitId, value: T) -> u32 {
        assert!(!self.index_of.contains_key(&unit), "unit already owns an instance in this system");
        let index = self.values.len() as u32;
        self.values.push(value);
        self.unit_of.push(unit);
        self.index_of.insert(unit, index);
        index
    }

    pub fn remove(&mut self, index: u32) {
        let last = self.values.len() as u32 - 1;
        let removed_unit = self.unit_of[index as usize];
        self.index_of.remove(&removed_unit);

        if index != last {
            self.values.swap(index as usize, last as usize);
            self.unit_of.swap(index as usize, last as usize);
            let moved_unit = self.unit_of[index as usize];
            self.index_of.insert(moved_unit, index);
        }

        self.values.pop();
        self.unit_of.pop();
    }

    pub fn index_of(&self, unit: UnitId) -> Option<u32> {
        self.index_of.get(&unit).copied()
    }

    pub fn get_mut(&mut self, index: u32) -> &mut T {
        &mut self.values[index as usize]
    }

    pub fn get(&self, index: u32) -> &T {
        &self.values[index as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn remove_by_unit(&mut self, unit: UnitId) {
        if let Some(index) = self.index_of.remove(&unit) {
            self.remove(index);
        }
    }
}
