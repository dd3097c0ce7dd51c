//! Render submission. Owns the per-system renderable sub-managers and
//! composes one frame's draw work; the GPU pipeline itself sits behind
//! [`RenderBackend`] and is out of scope here.

mod backend;
mod camera;
mod debug_line;
mod light;
mod mesh;
mod sprite;
mod storage;

pub use backend::{NullRenderBackend, RenderBackend};
pub use camera::{CameraDesc, CameraInstance, CameraManager, ProjectionType};
pub use debug_line::DebugLineBuffer;
pub use light::{LightInstance, LightManager};
pub use mesh::{MeshInstance, MeshManager};
pub use sprite::{SpriteInstance, SpriteManager};

use crate::unit::UnitId;
use nalgebra::Matrix4;

/// Uniform post-process settings; these sub-managers hold configuration
/// only (no per-unit instances), matching the §4.4 sub-manager list.
#[derive(Copy, Clone, Debug)]
pub struct FogSettings {
    pub density: f32,
    pub color: nalgebra::Vector3<f32>,
}

impl Default for FogSettings {
    fn default() -> Self {
        FogSettings {
            density: 0.0,
            color: nalgebra::Vector3::new(0.5, 0.5, 0.5),
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct BloomSettings {
    pub threshold: f32,
    pub intensity: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct TonemapSettings {
    pub exposure: f32,
}

impl Default for TonemapSettings {
    fn default() -> Self {
        TonemapSettings { exposure: 1.0 }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct GlobalLightingSettings {
    pub ambient: nalgebra::Vector3<f32>,
}

/// Owns every renderable sub-manager for one `World`. Generic over
/// [`RenderBackend`] so it can run against a GPU backend in the running
/// engine or [`NullRenderBackend`] headlessly.
pub struct RenderWorld<B: RenderBackend = NullRenderBackend> {
    backend: B,
    pub mesh: MeshManager,
    pub sprite: SpriteManager,
    pub light: LightManager,
    pub camera: CameraManager,
    pub debug_lines: DebugLineBuffer,
    pub fog: FogSettings,
    pub bloom: BloomSettings,
    pub tonemap: TonemapSettings,
    pub global_lighting: GlobalLightingSettings,
}

impl Default for RenderWorld<NullRenderBackend> {
    fn default() -> Self {
        RenderWorld::with_backend(NullRenderBackend::default())
    }
}

impl<B: RenderBackend> RenderWorld<B> {
    pub fn with_backend(backend: B) -> Self {
        RenderWorld {
            backend,
            mesh: MeshManager::default(),
            sprite: SpriteManager::default(),
            light: LightManager::default(),
            camera: CameraManager::default(),
            debug_lines: DebugLineBuffer::default(),
            fog: FogSettings::default(),
            bloom: BloomSettings::default(),
            tonemap: TonemapSettings::default(),
            global_lighting: GlobalLightingSettings::default(),
        }
    }

    /// Propagates new world matrices to every renderable keyed by `units`,
    /// typically O(k) via each sub-manager's unit→instance map.
    pub fn update_transforms(&mut self, units: &[UnitId], worlds: &[Matrix4<f32>]) {
        self.mesh.update_transforms(units, worlds);
        self.sprite.update_transforms(units, worlds);
        self.light.update_transforms(units, worlds);
    }

    pub fn sprite_set_frame(&mut self, instance: SpriteInstance, frame_num: u32) {
        self.sprite.sprite_set_frame(instance, frame_num);
    }

    /// Composes one frame: culls & submits opaque meshes and sprites,
    /// submits lights, draws the skydome (if any) with a depth-neutral
    /// matrix, then composites bloom/tonemap. Debug lines are appended and
    /// submitted last.
    pub fn render(
        &mut self,
        view: Matrix4<f32>,
        proj: Matrix4<f32>,
        persp_for_skybox: Matrix4<f32>,
        skydome_mesh: Option<u64>,
    ) {
        self.backend.begin_frame(view, proj);
        self.backend.submit_meshes(&self.mesh.draws());
        self.backend.submit_sprites(&self.sprite.draws());
        self.backend.submit_lights(&self.light.submissions());
        if let Some(mesh) = skydome_mesh {
            self.backend.submit_skydome(mesh, persp_for_skybox);
        }
        self.backend.composite();
        self.backend.submit_debug_lines(self.debug_lines.submit());
        self.debug_lines.reset();
    }

    pub fn capabilities(&self) -> backend::ProjectionCapabilities {
        self.backend.capabilities()
    }

    /// Forwards a material hot-reload to the backend (§4.8 "Hot reload").
    pub fn reload_materials(&mut self, old_material: u64, new_material: u64) {
        self.backend.reload_material(old_material, new_material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitManager;
    use nalgebra::Vector3;

    #[test]
    fn mesh_instance_survives_unrelated_destroy() {
        let mut mgr = UnitManager::new();
        let mut render = RenderWorld::default();
        let a = mgr.create();
        let b = mgr.create();
        render.mesh.create_instances(&[a, b], &[1, 2], &[10, 20]);

        render.mesh.destroy(a);
        assert!(render.mesh.instance(b).is_valid());
        assert!(!render.mesh.instance(a).is_valid());
    }

    #[test]
    fn render_composes_without_a_device() {
        let mut render = RenderWorld::default();
        let mgr_unit = crate::unit::UnitManager::new().create();
        render.mesh.create_instances(&[mgr_unit], &[1], &[1]);
        render.render(Matrix4::identity(), Matrix4::identity(), Matrix4::identity(), None);
    }

    #[test]
    fn camera_projection_matches_aspect() {
        let mut camera_mgr = CameraManager::default();
        let unit = crate::unit::UnitManager::new().create();
        let instances = camera_mgr.create_instances(
            &[unit],
            &[CameraDesc {
                projection: ProjectionType::Perspective { fov_y_radians: 1.2 },
                near: 0.1,
                far: 100.0,
            }],
        );
        let caps = backend::ProjectionCapabilities { depth_zero_to_one: true };
        let proj = camera_mgr.build_projection(instances[0], 16.0 / 9.0, caps);
        assert!(proj[(1, 1)] > 0.0);
        let _ = Vector3::zeros();
    }
}
