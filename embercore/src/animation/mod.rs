//! Per-unit animation state machines driving skeletal and sprite players.
//! `update` samples every live machine and writes bone locals back into the
//! scene graph before physics reads world poses (§5 ordering rule 2).

mod clip;
mod player;
mod skeleton;

pub use clip::{AnimationClip, AnimationKey, KeyPayload};
pub use player::{SampledBone, SkeletalAnimationPlayer, SpriteAnimationPlayer, SpriteFrameChangeEvent};
pub use skeleton::{BoneTransform, Skeleton};

use crate::scene_graph::{SceneGraph, TransformInstance};
use crate::unit::UnitId;
use std::collections::HashMap;
use tracing::warn;

/// A named blend target: a transition fires when `variable` matches
/// `predicate`, then blend weight ramps linearly over `duration_secs`.
#[derive(Clone, Debug)]
pub struct TransitionPredicate {
    pub variable: String,
    pub equals: i64,
    pub target_state: String,
    pub duration_secs: f32,
}

struct StateEntry {
    skeletal: Option<SkeletalAnimationPlayer>,
    sprite: Option<SpriteAnimationPlayer>,
    /// `bone_id -> scene graph node` for this unit's skeleton instance.
    bone_nodes: Vec<TransformInstance>,
    transitions: Vec<TransitionPredicate>,
    current_state: String,
    pending_state: Option<String>,
    blend_elapsed: f32,
    blend_duration: f32,
    variables: HashMap<String, i64>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct AnimationInstance(u32);

impl AnimationInstance {
    pub const INVALID: AnimationInstance = AnimationInstance(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

/// Per-unit sprite-frame changes, drained by the world once per frame and
/// forwarded to `RenderWorld::sprite_set_frame`.
#[derive(Copy, Clone, Debug)]
pub struct SpriteFrameChanged {
    pub unit: UnitId,
    pub frame: u32,
}

#[derive(Default)]
pub struct AnimationStateMachine {
    entries: Vec<Option<StateEntry>>,
    of_unit: HashMap<UnitId, u32>,
    sprite_events: Vec<SpriteFrameChanged>,
}

impl AnimationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        unit: UnitId,
        skeletal: Option<SkeletalAnimationPlayer>,
        sprite: Option<SpriteAnimationPlayer>,
        bone_nodes: Vec<TransformInstance>,
        initial_state: impl Into<String>,
    ) -> AnimationInstance {
        let index = self.entries.len() as u32;
        self.entries.push(Some(StateEntry {
            skeletal,
            sprite,
            bone_nodes,
            transitions: Vec::new(),
            current_state: initial_state.into(),
            pending_state: None,
            blend_elapsed: 0.0,
            blend_duration: 0.0,
            variables: HashMap::new(),
        }));
        self.of_unit.insert(unit, index);
        AnimationInstance(index)
    }

    pub fn destroy(&mut self, unit: UnitId) {
        if let Some(index) = self.of_unit.remove(&unit) {
            self.entries[index as usize] = None;
        }
    }

    pub fn instance(&self, unit: UnitId) -> AnimationInstance {
        self.of_unit.get(&unit).map(|&i| AnimationInstance(i)).unwrap_or(AnimationInstance::INVALID)
    }

    pub fn add_transition(&mut self, unit: UnitId, predicate: TransitionPredicate) {
        if let Some(entry) = self.entry_mut(unit) {
            entry.transitions.push(predicate);
        }
    }

    pub fn set_variable(&mut self, unit: UnitId, name: &str, value: i64) {
        if let Some(entry) = self.entry_mut(unit) {
            entry.variables.insert(name.to_string(), value);
        }
    }

    fn entry_mut(&mut self, unit: UnitId) -> Option<&mut StateEntry> {
        let index = *self.of_unit.get(&unit)?;
        self.entries.get_mut(index as usize)?.as_mut()
    }

    /// Advances every machine's time by `dt`, samples bones and writes them
    /// back into `scene_graph` as local transforms, and evaluates pending
    /// state transitions.
    pub fn update(&mut self, dt: f32, scene_graph: &mut SceneGraph) {
        let units: Vec<UnitId> = self.of_unit.keys().copied().collect();
        for unit in units {
            let Some(entry) = self.entry_mut(unit) else {
                continue;
            };

            evaluate_transitions(entry, dt);

            if let Some(sprite) = entry.sprite.as_mut() {
                if let Some(change) = sprite.advance(dt) {
                    self.sprite_events.push(SpriteFrameChanged {
                        unit,
                        frame: change.frame,
                    });
                }
            }

            if let Some(skeletal) = entry.skeletal.as_mut() {
                let sampled = skeletal.advance(dt);
                for bone in sampled {
                    let Some(&node) = entry.bone_nodes.get(bone.bone_id as usize) else {
                        warn!(bone_id = bone.bone_id, "sampled bone has no scene graph node");
                        continue;
                    };
                    if !node.is_valid() {
                        continue;
                    }
                    if let Some(position) = bone.position {
                        scene_graph.set_local_position(node, position);
                    }
                    if let Some(rotation) = bone.rotation {
                        scene_graph.set_local_rotation(node, rotation);
                    }
                }
            }
        }
    }

    /// Drains sprite frame-change events accumulated since the last drain.
    pub fn drain_sprite_events(&mut self) -> Vec<SpriteFrameChanged> {
        std::mem::take(&mut self.sprite_events)
    }
}

fn evaluate_transitions(entry: &mut StateEntry, dt: f32) {
    if entry.pending_state.is_none() {
        for transition in &entry.transitions {
            let matches = entry.variables.get(&transition.variable).copied() == Some(transition.equals);
            if matches && transition.target_state != entry.current_state {
                entry.pending_state = Some(transition.target_state.clone());
                entry.blend_elapsed = 0.0;
                entry.blend_duration = transition.duration_secs.max(f32::EPSILON);
                break;
            }
        }
    }

    if let Some(pending) = entry.pending_state.clone() {
        entry.blend_elapsed += dt;
        if entry.blend_elapsed >= entry.blend_duration {
            entry.current_state = pending;
            entry.pending_state = None;
        }
    }
}

/// Blend weight of the pending transition in `[0, 1]`, or `1.0` if no
/// transition is in flight (fully in `current_state`).
pub fn blend_weight(elapsed: f32, duration: f32) -> f32 {
    (elapsed / duration.max(f32::EPSILON)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::AnimationKey;
    use crate::scene_graph::TransformOverride;
    use crate::unit::UnitManager;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn state_transition_fires_when_variable_matches() {
        let mut mgr = UnitManager::new();
        let mut asm = AnimationStateMachine::new();
        let unit = mgr.create();
        asm.create(unit, None, None, Vec::new(), "idle");
        asm.add_transition(
            unit,
            TransitionPredicate {
                variable: "moving".to_string(),
                equals: 1,
                target_state: "run".to_string(),
                duration_secs: 0.2,
            },
        );

        let mut graph = SceneGraph::new();
        asm.set_variable(unit, "moving", 1);
        asm.update(0.1, &mut graph);
        asm.update(0.2, &mut graph);

        let index = asm.of_unit[&unit];
        assert_eq!(asm.entries[index as usize].as_ref().unwrap().current_state, "run");
    }

    #[test]
    fn skeletal_bones_written_to_scene_graph() {
        let mut mgr = UnitManager::new();
        let mut graph = SceneGraph::new();
        let unit = mgr.create();
        let locals = [(Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0))];
        let nodes = graph.create_instances(&[unit], &locals, &[None], TransformOverride::default());
        let node = nodes[0];

        let keys = vec![
            AnimationKey::position(0, 0, Vector3::zeros()),
            AnimationKey::position(0, 1000, Vector3::new(4.0, 0.0, 0.0)),
        ];
        let clip = std::sync::Arc::new(AnimationClip::new(1.0, 1, keys, vec![0]));
        let player = SkeletalAnimationPlayer::new(clip, false);

        let mut asm = AnimationStateMachine::new();
        asm.create(unit, Some(player), None, vec![node], "default");
        asm.update(0.5, &mut graph);

        let pos = graph.local_position(node);
        assert!((pos.x - 2.0).abs() < 1e-3);
    }
}
