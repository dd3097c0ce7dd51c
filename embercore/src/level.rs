//! Compiled unit/level resources consumed by [`crate::world::World::spawn_unit`]
//! and `load_level`/`unload_level`. The resource *compiler* is out of scope
//! (§1); these types are the producer contract — opaque bundles the core
//! routes to the right subsystem rather than data it builds itself.

use crate::animation::AnimationClip;
use crate::physics::{ActorKind, CollisionFilter};
use crate::render::{BloomSettings, CameraDesc, FogSettings, GlobalLightingSettings, TonemapSettings};
use crate::script::ScriptDesc;
use crate::unit::UnitId;
use nalgebra::{UnitQuaternion, Vector3};
use rapier3d::prelude::SharedShape;
use std::sync::Arc;

/// Describes the skeletal/sprite players an `animation_state_machine`
/// component wires up for one unit. `bone_unit_offsets[bone_id]` is the
/// index, within the owning [`UnitResource`], of the unit whose transform
/// that bone writes to (resolved to a scene graph node at spawn time).
#[derive(Clone)]
pub struct AnimationStateMachineDesc {
    pub skeletal_clip: Option<Arc<AnimationClip>>,
    pub skeletal_looping: bool,
    pub bone_unit_offsets: Vec<usize>,
    pub sprite_frame_count: Option<u32>,
    pub sprite_frame_duration_secs: f32,
    pub sprite_looping: bool,
    pub initial_state: String,
}

/// One routed component block from a compiled unit resource (§4.8's spawn
/// pseudocode: "route block to the correct subsystem"). Joints are not
/// data-driven per §4.8 — they're created directly against two actors, so
/// they have no block here.
#[derive(Clone)]
pub enum ComponentDesc {
    Camera(CameraDesc),
    Actor {
        kind: ActorKind,
        filter: CollisionFilter,
    },
    Collider {
        shape: SharedShape,
        is_trigger: bool,
    },
    Mover {
        radius: f32,
        height: f32,
        max_slope_deg: f32,
        filter: CollisionFilter,
    },
    MeshRenderer {
        mesh: u64,
        material: u64,
    },
    SpriteRenderer {
        texture: u64,
    },
    Light {
        color: Vector3<f32>,
        intensity: f32,
        range: f32,
    },
    Fog(FogSettings),
    GlobalLighting(GlobalLightingSettings),
    Bloom(BloomSettings),
    Tonemap(TonemapSettings),
    Script(ScriptDesc),
    AnimationStateMachine(AnimationStateMachineDesc),
}

/// A compiled unit blueprint: N sub-units (transform + component blocks
/// each), with index 0 the root-most transform that spawn-flag overrides
/// apply to (§4.8).
pub struct UnitResource {
    pub id: u64,
    pub locals: Vec<(Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>)>,
    pub parents: Vec<Option<usize>>,
    pub components: Vec<Vec<ComponentDesc>>,
}

impl UnitResource {
    pub fn num_units(&self) -> usize {
        self.locals.len()
    }
}

/// A compiled level: every unit blueprint spawned together when the level is
/// loaded.
pub struct LevelResource {
    pub id: u64,
    pub unit_blueprints: Vec<Arc<UnitResource>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct LevelHandle(u32);

impl LevelHandle {
    pub const INVALID: LevelHandle = LevelHandle(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

/// One loaded level: the resource id it came from, plus the runtime root
/// unit id spawned for each of the resource's unit blueprints. Modeled as a
/// dense arena rather than the source's intrusive doubly linked list — the
/// arena-plus-handle pattern gives the same "owned list, stable identity
/// across removal" property without raw links (§9).
pub struct Level {
    pub resource_id: u64,
    pub root_units: Vec<UnitId>,
}

#[derive(Default)]
pub struct LevelList {
    levels: Vec<Option<Level>>,
    freelist: Vec<u32>,
}

impl LevelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, level: Level) -> LevelHandle {
        if let Some(index) = self.freelist.pop() {
            self.levels[index as usize] = Some(level);
            return LevelHandle(index);
        }
        let index = self.levels.len() as u32;
        self.levels.push(Some(level));
        LevelHandle(index)
    }

    pub fn remove(&mut self, handle: LevelHandle) -> Option<Level> {
        let slot = self.levels.get_mut(handle.0 as usize)?;
        let level = slot.take()?;
        self.freelist.push(handle.0);
        Some(level)
    }

    pub fn get(&self, handle: LevelHandle) -> Option<&Level> {
        self.levels.get(handle.0 as usize)?.as_ref()
    }

    pub fn handle_for_resource(&self, resource_id: u64) -> Option<LevelHandle> {
        self.levels.iter().enumerate().find_map(|(i, slot)| {
            slot.as_ref()
                .filter(|level| level.resource_id == resource_id)
                .map(|_| LevelHandle(i as u32))
        })
    }

    pub fn len(&self) -> usize {
        self.levels.iter().filter(|l| l.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
