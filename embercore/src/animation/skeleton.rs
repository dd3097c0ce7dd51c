//! Skeleton data: per-bone bind transforms, parent links and binding
//! matrices, matching the mesh-skeleton resource layout in §6.

use crate::resource::{MeshSkeletonResourceHeader, SKELETON_ROOT_PARENT};
use nalgebra::{Matrix4, UnitQuaternion, Vector3};

#[derive(Copy, Clone, Debug)]
pub struct BoneTransform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for BoneTransform {
    fn default() -> Self {
        BoneTransform {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// A loaded skeleton resource. `parents[i] == SKELETON_ROOT_PARENT` marks a
/// root bone. Bone count is hard-capped at `MAX_BONES`; exceeding it is a
/// programmer error per §7.
pub struct Skeleton {
    pub locals: Vec<BoneTransform>,
    pub parents: Vec<u32>,
    pub binding: Vec<Matrix4<f32>>,
}

impl Skeleton {
    pub fn new(locals: Vec<BoneTransform>, parents: Vec<u32>, binding: Vec<Matrix4<f32>>) -> Self {
        assert_eq!(locals.len(), parents.len(), "skeleton bone count mismatch (locals/parents)");
        assert_eq!(locals.len(), binding.len(), "skeleton bone count mismatch (locals/binding)");
        assert!(
            locals.len() as u32 <= crate::resource::MAX_BONES,
            "skeleton exceeds MAX_BONES"
        );
        Skeleton { locals, parents, binding }
    }

    pub fn bone_count(&self) -> usize {
        self.locals.len()
    }

    pub fn is_root(&self, bone: usize) -> bool {
        self.parents[bone] == SKELETON_ROOT_PARENT
    }

    pub fn validate_header(header: &MeshSkeletonResourceHeader) {
        assert!(header.is_valid(), "malformed or over-budget skeleton resource");
    }
}
