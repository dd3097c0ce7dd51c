//! Joints connecting two actors. Tracks break thresholds ourselves since
//! `rapier3d`'s impulse joints don't self-remove on overload; `check_breaks`
//! runs once per step after the pipeline settles forces.

use super::{ActorEntry, ActorInstance, PhysicsEvent};
use rapier3d::prelude::*;
use std::collections::HashMap;

const NIL: u32 = u32::MAX;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum JointKind {
    Fixed,
    Revolute { axis: Vector<f32> },
    Prismatic { axis: Vector<f32> },
    Spherical,
    Rope { max_distance: f32 },
}

#[derive(Copy, Clone, Debug)]
pub struct JointDesc {
    pub kind: JointKind,
    pub anchor0: Point<f32>,
    pub anchor1: Point<f32>,
    /// Maximum force magnitude before the joint is torn out of the
    /// simulation and a `JointBroken` event is emitted. `None` disables
    /// breaking.
    pub break_force: Option<f32>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct JointInstance(u32);

impl JointInstance {
    pub const INVALID: JointInstance = JointInstance(NIL);
    pub fn is_valid(self) -> bool {
        self.0 != NIL
    }
}

struct JointEntry {
    handle: ImpulseJointHandle,
    a0: ActorInstance,
    a1: ActorInstance,
    break_force: Option<f32>,
    broken: bool,
}

#[derive(Default)]
pub(super) struct JointStorage {
    entries: Vec<Option<JointEntry>>,
    by_handle: HashMap<ImpulseJointHandle, u32>,
}

impl JointStorage {
    pub fn track(&mut self, handle: ImpulseJointHandle, a0: ActorInstance, a1: ActorInstance, desc: JointDesc) -> JointInstance {
        let index = self.entries.len() as u32;
        self.entries.push(Some(JointEntry {
            handle,
            a0,
            a1,
            break_force: desc.break_force,
            broken: false,
        }));
        self.by_handle.insert(handle, index);
        JointInstance(index)
    }

    pub fn destroy(&mut self, joint: JointInstance) {
        if let Some(entry) = self.entries.get_mut(joint.0 as usize).and_then(Option::take) {
            self.by_handle.remove(&entry.handle);
        }
    }

    pub fn handle_of(&self, joint: JointInstance) -> Option<ImpulseJointHandle> {
        self.entries.get(joint.0 as usize)?.as_ref().map(|e| e.handle)
    }

    pub fn check_breaks(
        &mut self,
        joints: &ImpulseJointSet,
        _bodies: &RigidBodySet,
        events: &mut Vec<PhysicsEvent>,
        actors: &[ActorEntry],
    ) {
        let mut to_remove = Vec::new();
        for entry in self.entries.iter_mut().flatten() {
            if entry.broken {
                continue;
            }
            let Some(threshold) = entry.break_force else {
                continue;
            };
            let Some(joint) = joints.get(entry.handle) else {
                continue;
            };
            let force_magnitude = joint.data.impulses.iter().map(|i| i.abs()).sum::<f32>();
            if force_magnitude > threshold {
                entry.broken = true;
                to_remove.push(entry.handle);
                events.push(PhysicsEvent::JointBroken {
                    unit_a: actors[entry.a0.index()].unit,
                    unit_b: actors[entry.a1.index()].unit,
                });
            }
        }
        for handle in to_remove {
            if let Some(&index) = self.by_handle.get(&handle) {
                self.entries[index as usize] = None;
                self.by_handle.remove(&handle);
            }
        }
    }
}

pub(super) fn build_generic_joint(desc: &JointDesc) -> GenericJoint {
    let mut generic: GenericJoint = match desc.kind {
        JointKind::Fixed => FixedJointBuilder::new()
            .local_frame1(Isometry::from(desc.anchor0))
            .local_frame2(Isometry::from(desc.anchor1))
            .build()
            .into(),
        JointKind::Revolute { axis } => RevoluteJointBuilder::new(UnitVector::new_normalize(axis))
            .local_anchor1(desc.anchor0)
            .local_anchor2(desc.anchor1)
            .build()
            .into(),
        JointKind::Prismatic { axis } => PrismaticJointBuilder::new(UnitVector::new_normalize(axis))
            .local_anchor1(desc.anchor0)
            .local_anchor2(desc.anchor1)
            .build()
            .into(),
        JointKind::Spherical => SphericalJointBuilder::new()
            .local_anchor1(desc.anchor0)
            .local_anchor2(desc.anchor1)
            .build()
            .into(),
        JointKind::Rope { max_distance } => RopeJointBuilder::new(max_distance)
            .local_anchor1(desc.anchor0)
            .local_anchor2(desc.anchor1)
            .build()
            .into(),
    };
    generic.set_contacts_enabled(false);
    generic
}
