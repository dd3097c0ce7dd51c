//! World-level event stream entries: lifecycle notifications and the
//! payload shapes scripts receive for collision/trigger/update callbacks.
//! Subsystems own their own event types ([`crate::physics::PhysicsEvent`],
//! [`crate::animation::SpriteFrameChangeEvent`]); this module holds the
//! ones the orchestrator itself produces or re-packages for script dispatch.

use crate::physics::ActorInstance;
use crate::script::{ScriptArg, ScriptArgs};
use crate::unit::UnitId;
use nalgebra::{Point3, Vector3};

#[derive(Copy, Clone, Debug)]
pub enum WorldEvent {
    UnitSpawned { unit: UnitId },
    UnitDestroyed { unit: UnitId },
    /// An impulse joint exceeded its break threshold. Not routed to scripts
    /// (§6's event table has no script callback for it); surfaced here for
    /// host-side observers (editors, telemetry).
    JointBroken { unit_a: UnitId, unit_b: UnitId },
}

/// Arguments scripts receive for `collision_begin`/`collision_stay`. Built
/// once per side of a collision pair; `normal` points away from `self_unit`.
#[derive(Copy, Clone, Debug)]
pub struct CollisionCallbackArgs {
    pub self_unit: UnitId,
    pub other_unit: UnitId,
    pub self_actor: ActorInstance,
    pub other_actor: ActorInstance,
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub distance: f32,
}

/// Arguments scripts receive for `collision_end`.
#[derive(Copy, Clone, Debug)]
pub struct CollisionEndArgs {
    pub self_unit: UnitId,
    pub other_unit: UnitId,
}

/// Arguments scripts receive for `trigger_enter`/`trigger_leave`.
#[derive(Copy, Clone, Debug)]
pub struct TriggerCallbackArgs {
    pub trigger_unit: UnitId,
    pub other_unit: UnitId,
}

impl CollisionCallbackArgs {
    /// `self_unit` is implicit (the instance the call targets); actor
    /// handles are engine-internal and don't cross the scripting bridge
    /// (§9: the bridge carries primitives, vectors and unit ids only).
    pub fn as_script_args(&self) -> ScriptArgs {
        ScriptArgs::from_iter([
            ScriptArg::Unit(self.other_unit),
            ScriptArg::Vector3(self.position.coords),
            ScriptArg::Vector3(self.normal),
            ScriptArg::Float(self.distance),
        ])
    }
}

impl CollisionEndArgs {
    pub fn as_script_args(&self) -> ScriptArgs {
        ScriptArgs::from_iter([ScriptArg::Unit(self.other_unit)])
    }
}

impl TriggerCallbackArgs {
    pub fn as_script_args(&self) -> ScriptArgs {
        ScriptArgs::from_iter([ScriptArg::Unit(self.other_unit)])
    }
}
