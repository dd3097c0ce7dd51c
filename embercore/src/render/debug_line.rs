//! Debug line submission. `add_line` is only ever called from the
//! simulation thread per §6; `submit` flushes to the backend once per
//! frame and `reset` clears for the next.

use super::backend::DebugLineVertex;
use nalgebra::{Vector3, Vector4};

#[derive(Default)]
pub struct DebugLineBuffer {
    lines: Vec<DebugLineVertex>,
}

impl DebugLineBuffer {
    pub fn add_line(&mut self, from: Vector3<f32>, to: Vector3<f32>, color: Vector4<f32>) {
        self.lines.push(DebugLineVertex { from, to, color });
    }

    pub fn submit(&self) -> &[DebugLineVertex] {
        &self.lines
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }
}
