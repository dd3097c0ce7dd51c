use super::storage::DenseMap;
use crate::unit::UnitId;
use nalgebra::Matrix4;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SpriteInstance(u32);

impl SpriteInstance {
    pub const INVALID: SpriteInstance = SpriteInstance(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

struct SpriteEntry {
    texture: u64,
    frame: u32,
    world: Matrix4<f32>,
}

#[derive(Default)]
pub struct SpriteManager {
    storage: DenseMap<SpriteEntry>,
}

impl SpriteManager {
    pub fn create_instances(&mut self, units: &[UnitId], textures: &[u64]) -> Vec<SpriteInstance> {
        assert_eq!(units.len(), textures.len());
        units
            .iter()
            .zip(textures.iter())
            .map(|(&unit, &texture)| {
                let index = self.storage.insert(
                    unit,
                    SpriteEntry {
                        texture,
                        frame: 0,
                        world: Matrix4::identity(),
                    },
                );
                SpriteInstance(index)
            })
            .collect()
    }

    pub fn destroy(&mut self, unit: UnitId) {
        self.storage.remove_by_unit(unit);
    }

    pub fn instance(&self, unit: UnitId) -> SpriteInstance {
        self.storage.index_of(unit).map(SpriteInstance).unwrap_or(SpriteInstance::INVALID)
    }

    /// Changes the UV rect used on the next submission.
    pub fn sprite_set_frame(&mut self, instance: SpriteInstance, frame_num: u32) {
        self.storage.get_mut(instance.0).frame = frame_num;
    }

    pub fn update_transforms(&mut self, units: &[UnitId], worlds: &[Matrix4<f32>]) {
        for (&unit, &world) in units.iter().zip(worlds.iter()) {
            if let Some(index) = self.storage.index_of(unit) {
                self.storage.get_mut(index).world = world;
            }
        }
    }

    pub fn draws(&self) -> Vec<super::backend::SpriteDrawCommand> {
        self.storage
            .values
            .iter()
            .map(|e| super::backend::SpriteDrawCommand {
                texture: e.texture,
                frame: e.frame,
                world: e.world,
            })
            .collect()
    }
}
