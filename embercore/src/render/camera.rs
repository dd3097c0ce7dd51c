use super::backend::ProjectionCapabilities;
use super::storage::DenseMap;
use crate::unit::UnitId;
use nalgebra::{Matrix4, Orthographic3, Perspective3};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CameraInstance(u32);

impl CameraInstance {
    pub const INVALID: CameraInstance = CameraInstance(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

#[derive(Copy, Clone, Debug)]
pub enum ProjectionType {
    Perspective { fov_y_radians: f32 },
    Orthographic { half_size: f32 },
}

#[derive(Copy, Clone, Debug)]
pub struct CameraDesc {
    pub projection: ProjectionType,
    pub near: f32,
    pub far: f32,
}

#[derive(Default)]
pub struct CameraManager {
    storage: DenseMap<CameraDesc>,
}

impl CameraManager {
    pub fn create_instances(&mut self, units: &[UnitId], descs: &[CameraDesc]) -> Vec<CameraInstance> {
        assert_eq!(units.len(), descs.len());
        units
            .iter()
            .zip(descs.iter())
            .map(|(&unit, &desc)| CameraInstance(self.storage.insert(unit, desc)))
            .collect()
    }

    pub fn destroy(&mut self, unit: UnitId) {
        self.storage.remove_by_unit(unit);
    }

    pub fn instance(&self, unit: UnitId) -> CameraInstance {
        self.storage.index_of(unit).map(CameraInstance).unwrap_or(CameraInstance::INVALID)
    }

    pub fn desc(&self, instance: CameraInstance) -> CameraDesc {
        *self.storage.get(instance.0)
    }

    /// Right-handed, near-far, homogeneous-depth-aware projection matching
    /// `caps`'s convention.
    pub fn build_projection(&self, instance: CameraInstance, aspect: f32, caps: ProjectionCapabilities) -> Matrix4<f32> {
        let desc = self.desc(instance);
        match desc.projection {
            ProjectionType::Perspective { fov_y_radians } => {
                Perspective3::new(aspect, fov_y_radians, desc.near, desc.far).into_inner()
            }
            ProjectionType::Orthographic { half_size } => {
                let half_height = half_size;
                let half_width = half_size * aspect;
                let proj = Orthographic3::new(-half_width, half_width, -half_height, half_height, desc.near, desc.far);
                if caps.depth_zero_to_one {
                    remap_depth_neg1_1_to_0_1(proj.into_inner())
                } else {
                    proj.into_inner()
                }
            }
        }
    }
}

fn remap_depth_neg1_1_to_0_1(mut m: Matrix4<f32>) -> Matrix4<f32> {
    // Row 2 maps z to [-1, 1] (OpenGL convention); rescale to [0, 1].
    let row2_2 = m[(2, 2)];
    let row2_3 = m[(2, 3)];
    let row3_3 = m[(3, 3)];
    m[(2, 2)] = 0.5 * row2_2;
    m[(2, 3)] = 0.5 * row2_3 + 0.5 * row3_3;
    m
}
