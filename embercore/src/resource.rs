//! On-disk resource layouts. These mirror the binary formats produced by the
//! (out-of-scope) resource compiler: header structs are `bytemuck`-plain so
//! a loaded byte buffer can be reinterpreted without a parsing pass.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert;

pub const RESOURCE_VERSION_SOUND: u32 = 1;
pub const RESOURCE_VERSION_MESH_ANIMATION: u32 = 1;
pub const RESOURCE_VERSION_MESH_SKELETON: u32 = 1;

/// Bone count ceiling per §4.5/§6; exceeding it is a programmer error
/// (truncated or corrupt skeleton resource), not a soft failure.
pub const MAX_BONES: u32 = 1024;

bitflags! {
    /// Spawn flags bit field (§6): which root-transform fields the spawn
    /// call overrides rather than taking verbatim from the resource. The
    /// `bitflags/bytemuck` feature gives this `Pod`/`Zeroable` for free so it
    /// can be read straight out of a resource block.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    #[repr(transparent)]
    pub struct SpawnFlags: u32 {
        const OVERRIDE_POSITION = 1 << 0;
        const OVERRIDE_ROTATION = 1 << 1;
        const OVERRIDE_SCALE    = 1 << 2;
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum StreamFormat {
    None = 0,
    Ogg = 1,
}

impl StreamFormat {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(StreamFormat::None),
            1 => Some(StreamFormat::Ogg),
            _ => None,
        }
    }
}

/// Fixed-size prefix of a sound resource; `stream_metadata` and `pcm_data`
/// follow immediately after in the backing buffer.
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
#[repr(C)]
pub struct SoundResourceHeader {
    pub version: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub bit_depth: u32,
    pub stream_format: u32,
    pub stream_metadata_size: u32,
    pub pcm_offset: u32,
    pub pcm_size: u32,
    pub _pad: u32,
}

const_assert!(std::mem::size_of::<SoundResourceHeader>() == 36);

impl SoundResourceHeader {
    pub fn is_valid(&self) -> bool {
        self.version == RESOURCE_VERSION_SOUND
            && (self.channels == 1 || self.channels == 2)
            && matches!(self.bit_depth, 8 | 16 | 32)
            && self.pcm_offset as usize == std::mem::size_of::<Self>() + self.stream_metadata_size as usize
    }
}

/// OGG stream metadata blob, present when `stream_format == Ogg`; the full
/// container follows in a separate streaming file.
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
#[repr(C)]
pub struct OggStreamMetadata {
    pub alloc_buffer_size: i32,
    pub headers_size: i32,
    pub max_frame_size: i32,
    pub num_samples_skip: i32,
}

/// `header:1 | track_id:10 | time:16`, 3 unused bits, as packed in
/// `AnimationKey.header`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct AnimationKeyHeader {
    pub is_rotation: bool,
    pub track_id: u16,
    pub time_ms: u16,
}

impl AnimationKeyHeader {
    pub fn decode(raw: u32) -> Self {
        AnimationKeyHeader {
            is_rotation: raw & 0x1 != 0,
            track_id: ((raw >> 1) & 0x3ff) as u16,
            time_ms: ((raw >> 11) & 0xffff) as u16,
        }
    }

    pub fn encode(self) -> u32 {
        (self.is_rotation as u32) | ((self.track_id as u32 & 0x3ff) << 1) | ((self.time_ms as u32) << 11)
    }
}

#[derive(Copy, Clone, Pod, Zeroable, Debug)]
#[repr(C)]
pub struct MeshAnimationResourceHeader {
    pub version: u32,
    pub num_tracks: u32,
    pub total_time: f32,
    pub num_keys: u32,
    pub keys_offset: u32,
    pub _pad: u32,
    pub target_skeleton: u64,
    pub num_bones: u32,
    pub bone_ids_offset: u32,
}

#[derive(Copy, Clone, Pod, Zeroable, Debug)]
#[repr(C)]
pub struct BoneTransformRaw {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

#[derive(Copy, Clone, Pod, Zeroable, Debug)]
#[repr(C)]
pub struct MeshSkeletonResourceHeader {
    pub version: u32,
    pub num_bones: u32,
    pub local_transforms_offset: u32,
    pub parents_offset: u32,
    pub binding_matrices_offset: u32,
}

impl MeshSkeletonResourceHeader {
    pub fn is_valid(&self) -> bool {
        self.version == RESOURCE_VERSION_MESH_SKELETON && self.num_bones <= MAX_BONES
    }
}

/// `u32::MAX >> 16` sentinel marking a bone as root in the `parents` array
/// (the format stores it as `u16`, so the wire value is `u16::MAX`).
pub const SKELETON_ROOT_PARENT: u32 = u16::MAX as u32;
