use super::storage::DenseMap;
use crate::unit::UnitId;
use nalgebra::{Matrix4, Vector3};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct LightInstance(u32);

impl LightInstance {
    pub const INVALID: LightInstance = LightInstance(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

struct LightEntry {
    color: Vector3<f32>,
    intensity: f32,
    range: f32,
    position: Vector3<f32>,
}

#[derive(Default)]
pub struct LightManager {
    storage: DenseMap<LightEntry>,
}

impl LightManager {
    pub fn create_instances(&mut self, units: &[UnitId], colors: &[Vector3<f32>], intensities: &[f32], ranges: &[f32]) -> Vec<LightInstance> {
        assert_eq!(units.len(), colors.len());
        assert_eq!(units.len(), intensities.len());
        assert_eq!(units.len(), ranges.len());
        units
            .iter()
            .enumerate()
            .map(|(i, &unit)| {
                let index = self.storage.insert(
                    unit,
                    LightEntry {
                        color: colors[i],
                        intensity: intensities[i],
                        range: ranges[i],
                        position: Vector3::zeros(),
                    },
                );
                LightInstance(index)
            })
            .collect()
    }

    pub fn destroy(&mut self, unit: UnitId) {
        self.storage.remove_by_unit(unit);
    }

    pub fn update_transforms(&mut self, units: &[UnitId], worlds: &[Matrix4<f32>]) {
        for (&unit, world) in units.iter().zip(worlds.iter()) {
            if let Some(index) = self.storage.index_of(unit) {
                let entry = self.storage.get_mut(index);
                entry.position = Vector3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)]);
            }
        }
    }

    pub fn submissions(&self) -> Vec<super::backend::LightSubmission> {
        self.storage
            .values
            .iter()
            .map(|e| super::backend::LightSubmission {
                position: e.position,
                color: e.color,
                intensity: e.intensity,
                range: e.range,
            })
            .collect()
    }
}
