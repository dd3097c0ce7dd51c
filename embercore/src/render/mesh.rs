use super::storage::DenseMap;
use crate::unit::UnitId;
use nalgebra::Matrix4;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct MeshInstance(u32);

impl MeshInstance {
    pub const INVALID: MeshInstance = MeshInstance(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

struct MeshEntry {
    mesh: u64,
    material: u64,
    world: Matrix4<f32>,
    visible: bool,
}

#[derive(Default)]
pub struct MeshManager {
    storage: DenseMap<MeshEntry>,
}

impl MeshManager {
    pub fn create_instances(&mut self, units: &[UnitId], meshes: &[u64], materials: &[u64]) -> Vec<MeshInstance> {
        assert_eq!(units.len(), meshes.len());
        assert_eq!(units.len(), materials.len());
        units
            .iter()
            .zip(meshes.iter().zip(materials.iter()))
            .map(|(&unit, (&mesh, &material))| {
                let index = self.storage.insert(
                    unit,
                    MeshEntry {
                        mesh,
                        material,
                        world: Matrix4::identity(),
                        visible: true,
                    },
                );
                MeshInstance(index)
            })
            .collect()
    }

    pub fn destroy(&mut self, unit: UnitId) {
        self.storage.remove_by_unit(unit);
    }

    pub fn instance(&self, unit: UnitId) -> MeshInstance {
        self.storage.index_of(unit).map(MeshInstance).unwrap_or(MeshInstance::INVALID)
    }

    pub fn set_visible(&mut self, instance: MeshInstance, visible: bool) {
        self.storage.get_mut(instance.0).visible = visible;
    }

    pub fn update_transforms(&mut self, units: &[UnitId], worlds: &[Matrix4<f32>]) {
        for (&unit, &world) in units.iter().zip(worlds.iter()) {
            if let Some(index) = self.storage.index_of(unit) {
                self.storage.get_mut(index).world = world;
            }
        }
    }

    pub fn draws(&self) -> Vec<super::backend::MeshDrawCommand> {
        self.storage
            .values
            .iter()
            .filter(|e| e.visible)
            .map(|e| super::backend::MeshDrawCommand {
                mesh: e.mesh,
                material: e.material,
                world: e.world,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
