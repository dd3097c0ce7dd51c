//! Render backend abstraction. The GPU pipeline itself (shaders, command
//! buffers, swapchain) is out of scope; `RenderWorld` submits draw work
//! through this trait so the orchestrator and tests can run against
//! [`NullRenderBackend`] when no device is present.

use nalgebra::{Matrix4, Vector3, Vector4};

#[derive(Copy, Clone, Debug)]
pub struct MeshDrawCommand {
    pub mesh: u64,
    pub material: u64,
    pub world: Matrix4<f32>,
}

#[derive(Copy, Clone, Debug)]
pub struct SpriteDrawCommand {
    pub texture: u64,
    pub frame: u32,
    pub world: Matrix4<f32>,
}

#[derive(Copy, Clone, Debug)]
pub struct LightSubmission {
    pub position: Vector3<f32>,
    pub color: Vector3<f32>,
    pub intensity: f32,
    pub range: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct DebugLineVertex {
    pub from: Vector3<f32>,
    pub to: Vector3<f32>,
    pub color: Vector4<f32>,
}

/// Right-handed, homogeneous-depth-aware projection convention the camera
/// model queries before building its projection matrix (§4.8 "Camera").
#[derive(Copy, Clone, Debug)]
pub struct ProjectionCapabilities {
    pub depth_zero_to_one: bool,
}

pub trait RenderBackend {
    fn capabilities(&self) -> ProjectionCapabilities;

    fn begin_frame(&mut self, view: Matrix4<f32>, proj: Matrix4<f32>);
    fn submit_meshes(&mut self, draws: &[MeshDrawCommand]);
    fn submit_sprites(&mut self, draws: &[SpriteDrawCommand]);
    fn submit_lights(&mut self, lights: &[LightSubmission]);
    fn submit_skydome(&mut self, mesh: u64, persp_for_skybox: Matrix4<f32>);
    fn submit_debug_lines(&mut self, lines: &[DebugLineVertex]);
    fn composite(&mut self);

    /// Swaps every reference to `old_material` for `new_material` in
    /// backend-resident draw state. Default no-op: backends that bind
    /// materials by id at submission time (rather than caching a handle)
    /// have nothing to do here.
    fn reload_material(&mut self, _old_material: u64, _new_material: u64) {}
}

/// Accepts every submission and draws nothing; used in headless tests and
/// when device initialization fails.
#[derive(Default)]
pub struct NullRenderBackend {
    pub frames_submitted: u64,
    pub last_mesh_count: usize,
    pub last_sprite_count: usize,
    pub last_light_count: usize,
}

impl RenderBackend for NullRenderBackend {
    fn capabilities(&self) -> ProjectionCapabilities {
        ProjectionCapabilities { depth_zero_to_one: true }
    }

    fn begin_frame(&mut self, _view: Matrix4<f32>, _proj: Matrix4<f32>) {
        self.frames_submitted += 1;
    }

    fn submit_meshes(&mut self, draws: &[MeshDrawCommand]) {
        self.last_mesh_count = draws.len();
    }

    fn submit_sprites(&mut self, draws: &[SpriteDrawCommand]) {
        self.last_sprite_count = draws.len();
    }

    fn submit_lights(&mut self, lights: &[LightSubmission]) {
        self.last_light_count = lights.len();
    }

    fn submit_skydome(&mut self, _mesh: u64, _persp_for_skybox: Matrix4<f32>) {}

    fn submit_debug_lines(&mut self, _lines: &[DebugLineVertex]) {}

    fn composite(&mut self) {}
}
