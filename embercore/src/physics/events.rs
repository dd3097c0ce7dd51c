//! Physics event stream. `PhysicsWorld::step` buffers these instead of
//! invoking callbacks mid-step; the orchestrator drains them once per frame
//! via `PhysicsWorld::events`.

use super::{ActorEntry, ActorInstance};
use crate::unit::UnitId;
use crossbeam_channel::{unbounded, Receiver};
use nalgebra::{Matrix4, Point3, Vector3};
use rapier3d::pipeline::ChannelEventCollector;
use rapier3d::prelude::*;
use std::collections::HashMap;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CollisionPhase {
    Started,
    Stopped,
}

/// Contact geometry delivered with `collision_begin`/`collision_stay`; not
/// computed for `collision_end` (the source contact pair is gone by then and
/// scripts don't need it per §6).
#[derive(Copy, Clone, Debug, Default)]
pub struct ContactGeometry {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub distance: f32,
}

#[derive(Clone, Debug)]
pub enum PhysicsEvent {
    /// A kinematic or dynamic actor's world pose changed this step.
    Transform { unit: UnitId, world: Matrix4<f32> },
    /// Two non-sensor colliders began or stopped touching. `contact` is
    /// `Some` only on `Started` (§6: `collision_end` carries no geometry).
    Collision {
        unit_a: UnitId,
        unit_b: UnitId,
        actor_a: ActorInstance,
        actor_b: ActorInstance,
        phase: CollisionPhase,
        contact: Option<ContactGeometry>,
    },
    /// A sensor collider began or stopped overlapping another collider.
    Trigger {
        sensor_unit: UnitId,
        other_unit: UnitId,
        phase: CollisionPhase,
    },
    /// An impulse joint exceeded its configured break threshold and was
    /// removed from the simulation.
    JointBroken { unit_a: UnitId, unit_b: UnitId },
}

/// A `ChannelEventCollector` plus the receiving end, rebuilt once per step so
/// `PhysicsWorld::step_once` can hand `rapier3d` fresh senders without
/// borrowing `self`.
pub struct CollisionCollector {
    collector: ChannelEventCollector,
    collision_rx: Receiver<CollisionEvent>,
    contact_force_rx: Receiver<ContactForceEvent>,
}

impl Default for CollisionCollector {
    fn default() -> Self {
        let (collision_tx, collision_rx) = unbounded();
        let (contact_force_tx, contact_force_rx) = unbounded();
        CollisionCollector {
            collector: ChannelEventCollector::new(collision_tx, contact_force_tx),
            collision_rx,
            contact_force_rx,
        }
    }
}

impl CollisionCollector {
    pub fn as_event_handler(&self) -> &ChannelEventCollector {
        &self.collector
    }

    pub fn drain_into(
        &self,
        collider_to_actor: &HashMap<ColliderHandle, u32>,
        actors: &[ActorEntry],
        narrow_phase: &NarrowPhase,
        colliders: &ColliderSet,
        events: &mut Vec<PhysicsEvent>,
    ) {
        while let Ok(event) = self.contact_force_rx.try_recv() {
            let _ = event; // contact-force thresholds are not part of this engine's event surface
        }

        while let Ok(event) = self.collision_rx.try_recv() {
            let (h1, h2, started, sensor) = match event {
                CollisionEvent::Started(a, b, flags) => (a, b, true, flags.contains(CollisionEventFlags::SENSOR)),
                CollisionEvent::Stopped(a, b, flags) => (a, b, false, flags.contains(CollisionEventFlags::SENSOR)),
            };
            let (Some(&i1), Some(&i2)) = (collider_to_actor.get(&h1), collider_to_actor.get(&h2)) else {
                continue;
            };
            let unit_a = actors[i1 as usize].unit;
            let unit_b = actors[i2 as usize].unit;
            let phase = if started {
                CollisionPhase::Started
            } else {
                CollisionPhase::Stopped
            };
            if sensor {
                events.push(PhysicsEvent::Trigger {
                    sensor_unit: unit_a,
                    other_unit: unit_b,
                    phase,
                });
            } else {
                let contact = started
                    .then(|| contact_geometry(narrow_phase, colliders, h1, h2))
                    .flatten();
                events.push(PhysicsEvent::Collision {
                    unit_a,
                    unit_b,
                    actor_a: ActorInstance::from_index(i1),
                    actor_b: ActorInstance::from_index(i2),
                    phase,
                    contact,
                });
            }
        }
    }
}

/// Deepest contact point of the pair's manifold, in world space, expressed
/// from collider `h1`'s side (normal points from `h1` towards `h2`).
fn contact_geometry(
    narrow_phase: &NarrowPhase,
    colliders: &ColliderSet,
    h1: ColliderHandle,
    h2: ColliderHandle,
) -> Option<ContactGeometry> {
    let pair = narrow_phase.contact_pair(h1, h2)?;
    let (manifold, contact) = pair.find_deepest_contact()?;
    let collider1 = colliders.get(h1)?;
    let world_point = collider1.position() * contact.local_p1;
    let world_normal = collider1.position() * manifold.data.normal;
    Some(ContactGeometry {
        position: world_point,
        normal: world_normal,
        distance: contact.dist,
    })
}
