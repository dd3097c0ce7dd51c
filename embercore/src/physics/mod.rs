//! Rigid bodies, colliders, character movers, joints and queries, backed by
//! `rapier3d`. Emits [`PhysicsEvent`]s the orchestrator drains once per frame.

mod events;
mod joint;
mod mover;

pub use events::{CollisionPhase, PhysicsEvent};
pub use joint::{JointDesc, JointInstance, JointKind};
pub use mover::{MoveResult, MoverInstance};

use crate::unit::UnitId;
use nalgebra::{Isometry3, Matrix4, Point3, UnitQuaternion, Vector3};
use rapier3d::control::{CharacterCollision, KinematicCharacterController};
use rapier3d::parry::query::{DefaultQueryDispatcher, ShapeCastOptions};
use rapier3d::prelude::*;
use std::collections::HashMap;
use tracing::{trace, warn};

const NIL: u32 = u32::MAX;
const EARTH_GRAVITY: f32 = 9.81;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ActorKind {
    Static,
    Kinematic,
    Dynamic,
}

/// 32-bit group + 32-bit mask collision filter. Two bodies generate contacts
/// iff each one's mask intersects the other's group.
#[derive(Copy, Clone, Debug)]
pub struct CollisionFilter {
    pub group: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        CollisionFilter {
            group: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    pub fn interacts(a: CollisionFilter, b: CollisionFilter) -> bool {
        (a.mask & b.group) != 0 && (b.mask & a.group) != 0
    }

    fn to_rapier(self) -> InteractionGroups {
        InteractionGroups::new(Group::from_bits_truncate(self.group), Group::from_bits_truncate(self.mask))
    }
}

/// Narrows a raycast/shapecast to bodies matching a filter, optionally
/// excluding a specific unit (e.g. a mover excluding itself).
#[derive(Copy, Clone, Default)]
pub struct PhysicsQueryFilter {
    pub groups: Option<CollisionFilter>,
    pub exclude_unit: Option<UnitId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ActorInstance(u32);

impl ActorInstance {
    pub const INVALID: ActorInstance = ActorInstance(NIL);
    pub fn is_valid(self) -> bool {
        self.0 != NIL
    }
    pub(super) fn from_index(index: u32) -> Self {
        ActorInstance(index)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ColliderInstance(u32);

impl ColliderInstance {
    pub const INVALID: ColliderInstance = ColliderInstance(NIL);
    pub fn is_valid(self) -> bool {
        self.0 != NIL
    }
}

pub struct RayHit {
    pub actor: ActorInstance,
    pub unit: UnitId,
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub distance: f32,
}

struct ActorEntry {
    unit: UnitId,
    kind: ActorKind,
    body: RigidBodyHandle,
    filter: CollisionFilter,
}

/// Dynamics, collision and query backend for one [`crate::world::World`].
pub struct PhysicsWorld {
    gravity: Vector3<f32>,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    integration_params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,

    actors: Vec<ActorEntry>,
    actor_of_unit: HashMap<UnitId, u32>,
    body_to_actor: HashMap<RigidBodyHandle, u32>,
    collider_to_actor: HashMap<ColliderHandle, u32>,

    movers: mover::MoverStorage,
    joints: joint::JointStorage,

    events: Vec<PhysicsEvent>,

    step_frequency: u32,
    max_substeps: u32,
    accumulator: f32,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        PhysicsWorld::new(60, 4)
    }
}

impl PhysicsWorld {
    pub fn new(step_frequency: u32, max_substeps: u32) -> Self {
        PhysicsWorld {
            gravity: Vector3::new(0.0, -EARTH_GRAVITY, 0.0),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            integration_params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            actors: Vec::new(),
            actor_of_unit: HashMap::new(),
            body_to_actor: HashMap::new(),
            collider_to_actor: HashMap::new(),
            movers: mover::MoverStorage::default(),
            joints: joint::JointStorage::default(),
            events: Vec::new(),
            step_frequency,
            max_substeps,
            accumulator: 0.0,
        }
    }

    pub fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector3<f32>) {
        self.gravity = gravity;
    }

    // --- Actor CRUD -----------------------------------------------------

    /// Creates an actor for `unit`. Hard error (assertion) if `unit` already
    /// owns an actor, matching §4.3's "creating an actor on a unit that
    /// already has one is a hard error".
    pub fn actor_create(
        &mut self,
        unit: UnitId,
        kind: ActorKind,
        position: Point3<f32>,
        rotation: UnitQuaternion<f32>,
        filter: CollisionFilter,
    ) -> ActorInstance {
        assert!(
            !self.actor_of_unit.contains_key(&unit),
            "unit {unit:?} already has an actor"
        );

        let rb_type = match kind {
            ActorKind::Static => RigidBodyType::Fixed,
            ActorKind::Kinematic => RigidBodyType::KinematicPositionBased,
            ActorKind::Dynamic => RigidBodyType::Dynamic,
        };

        let body = RigidBodyBuilder::new(rb_type)
            .position(Isometry3::from_parts(position.coords.into(), rotation))
            .user_data(unit.as_u32() as u128)
            .build();
        let handle = self.bodies.insert(body);

        let index = self.actors.len() as u32;
        self.actors.push(ActorEntry {
            unit,
            kind,
            body: handle,
            filter,
        });
        self.actor_of_unit.insert(unit, index);
        self.body_to_actor.insert(handle, index);

        trace!(?unit, ?kind, "actor created");
        ActorInstance(index)
    }

    pub fn actor(&self, unit: UnitId) -> ActorInstance {
        self.actor_of_unit
            .get(&unit)
            .map(|&i| ActorInstance(i))
            .unwrap_or(ActorInstance::INVALID)
    }

    /// Hard error (assertion) if `actor` does not exist.
    pub fn actor_destroy(&mut self, actor: ActorInstance) {
        let entry = self.require_actor(actor);
        self.bodies.remove(
            entry.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        self.body_to_actor.remove(&entry.body);
        self.actor_of_unit.remove(&entry.unit);
        self.colliders
            .iter()
            .filter(|(h, _)| self.collider_to_actor.get(h) == Some(&actor.0))
            .map(|(h, _)| h)
            .collect::<Vec<_>>()
            .into_iter()
            .for_each(|h| {
                self.collider_to_actor.remove(&h);
            });
    }

    fn require_actor(&self, actor: ActorInstance) -> &ActorEntry {
        self.actors
            .get(actor.index())
            .expect("operating on a destroyed actor handle")
    }

    pub fn collider_create(
        &mut self,
        actor: ActorInstance,
        shape: SharedShape,
        is_trigger: bool,
    ) -> ColliderInstance {
        let entry = self.require_actor(actor);
        let mut builder = ColliderBuilder::new(shape);
        if is_trigger {
            builder = builder.sensor(true).active_events(ActiveEvents::COLLISION_EVENTS);
        } else {
            builder = builder.active_events(ActiveEvents::COLLISION_EVENTS);
        }
        builder = builder.collision_groups(entry.filter.to_rapier());

        let handle = self
            .colliders
            .insert_with_parent(builder, entry.body, &mut self.bodies);
        self.collider_to_actor.insert(handle, actor.0);
        ColliderInstance(handle.into_raw_parts().0)
    }

    // --- Teleport / kinematics -------------------------------------------

    pub fn actor_teleport_world_position(&mut self, actor: ActorInstance, position: Point3<f32>) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            let mut pos = *body.position();
            pos.translation = position.coords.into();
            body.set_next_kinematic_position(pos);
            body.set_position(pos, true);
        }
    }

    pub fn actor_teleport_world_rotation(&mut self, actor: ActorInstance, rotation: UnitQuaternion<f32>) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            let mut pos = *body.position();
            pos.rotation = rotation;
            body.set_next_kinematic_position(pos);
            body.set_position(pos, true);
        }
    }

    pub fn actor_teleport_world_pose(
        &mut self,
        actor: ActorInstance,
        position: Point3<f32>,
        rotation: UnitQuaternion<f32>,
    ) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            let pose = Isometry3::from_parts(position.coords.into(), rotation);
            body.set_next_kinematic_position(pose);
            body.set_position(pose, true);
        }
    }

    pub fn actor_world_pose(&self, actor: ActorInstance) -> Matrix4<f32> {
        let handle = self.require_actor(actor).body;
        self.bodies
            .get(handle)
            .map(|b| b.position().to_homogeneous())
            .unwrap_or_else(Matrix4::identity)
    }

    // --- Dynamics setters -------------------------------------------------

    pub fn set_linear_velocity(&mut self, actor: ActorInstance, v: Vector3<f32>) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(v, true);
        }
    }

    pub fn set_angular_velocity(&mut self, actor: ActorInstance, v: Vector3<f32>) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_angvel(v, true);
        }
    }

    pub fn set_damping(&mut self, actor: ActorInstance, linear: f32, angular: f32) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linear_damping(linear);
            body.set_angular_damping(angular);
        }
    }

    pub fn set_gravity_enabled(&mut self, actor: ActorInstance, enabled: bool) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_gravity_scale(if enabled { 1.0 } else { 0.0 }, true);
        }
    }

    pub fn set_kinematic(&mut self, actor: ActorInstance, kinematic: bool) {
        let index = actor.index();
        let handle = self.actors[index].body;
        self.actors[index].kind = if kinematic {
            ActorKind::Kinematic
        } else {
            ActorKind::Dynamic
        };
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_body_type(
                if kinematic {
                    RigidBodyType::KinematicPositionBased
                } else {
                    RigidBodyType::Dynamic
                },
                true,
            );
        }
    }

    pub fn set_collision_filter(&mut self, actor: ActorInstance, filter: CollisionFilter) {
        self.actors[actor.index()].filter = filter;
        let handle = self.actors[actor.index()].body;
        for (ch, collider) in self.colliders.iter_mut() {
            if self.collider_to_actor.get(&ch) == Some(&(actor.0)) {
                let _ = &handle;
                collider.set_collision_groups(filter.to_rapier());
            }
        }
    }

    pub fn set_sleeping(&mut self, actor: ActorInstance, sleeping: bool) {
        let handle = self.require_actor(actor).body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_sleeping(sleeping);
        }
    }

    // --- Forces: no-ops on static/kinematic actors ------------------------

    fn is_dynamic(&self, actor: ActorInstance) -> bool {
        self.actors[actor.index()].kind == ActorKind::Dynamic
    }

    pub fn add_impulse(&mut self, actor: ActorInstance, impulse: Vector3<f32>) {
        if !self.is_dynamic(actor) {
            return;
        }
        let handle = self.actors[actor.index()].body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_impulse(impulse, true);
        }
    }

    pub fn add_impulse_at(&mut self, actor: ActorInstance, impulse: Vector3<f32>, point: Point3<f32>) {
        if !self.is_dynamic(actor) {
            return;
        }
        let handle = self.actors[actor.index()].body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_impulse_at_point(impulse, point, true);
        }
    }

    pub fn add_torque_impulse(&mut self, actor: ActorInstance, torque: Vector3<f32>) {
        if !self.is_dynamic(actor) {
            return;
        }
        let handle = self.actors[actor.index()].body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_torque_impulse(torque, true);
        }
    }

    pub fn push(&mut self, actor: ActorInstance, vel: Vector3<f32>, mass: f32) {
        self.add_impulse(actor, vel * mass);
    }

    pub fn push_at(&mut self, actor: ActorInstance, vel: Vector3<f32>, mass: f32, point: Point3<f32>) {
        self.add_impulse_at(actor, vel * mass, point);
    }

    // --- Poses driven by the scene graph -----------------------------------

    /// For every kinematic/dynamic actor whose unit appears in `units` with a
    /// changed pose, forwards the new pose to the backend (teleport for
    /// kinematic, warp for dynamic).
    pub fn update_actor_world_poses(&mut self, units: &[(UnitId, Matrix4<f32>)]) {
        for &(unit, world) in units {
            let Some(&index) = self.actor_of_unit.get(&unit) else {
                continue;
            };
            let entry = &self.actors[index as usize];
            if entry.kind == ActorKind::Static {
                continue;
            }
            let iso = matrix_to_isometry(&world);
            if let Some(body) = self.bodies.get_mut(entry.body) {
                match entry.kind {
                    ActorKind::Kinematic => body.set_next_kinematic_position(iso),
                    ActorKind::Dynamic => body.set_position(iso, true),
                    ActorKind::Static => unreachable!(),
                }
            }
        }
    }

    /// Steps the backend at a fixed step count derived from
    /// `{step_frequency, max_substeps}`; excess time is dropped (hard cap),
    /// matching the non-banked boot config policy.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = 1.0 / self.step_frequency.max(1) as f32;
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= fixed_dt && substeps < self.max_substeps {
            self.step_once(fixed_dt);
            self.accumulator -= fixed_dt;
            substeps += 1;
        }
        if substeps == self.max_substeps {
            self.accumulator = 0.0; // hard cap: drop banked leftover time
        }
    }

    fn step_once(&mut self, dt: f32) {
        self.integration_params.dt = dt;

        let collector = events::CollisionCollector::default();
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            &(),
            collector.as_event_handler(),
        );
        collector.drain_into(
            &self.collider_to_actor,
            &self.actors,
            &self.narrow_phase,
            &self.colliders,
            &mut self.events,
        );

        self.joints.check_breaks(&self.impulse_joints, &self.bodies, &mut self.events, &self.actors);

        for (index, entry) in self.actors.iter().enumerate() {
            if entry.kind == ActorKind::Static {
                continue;
            }
            let Some(body) = self.bodies.get(entry.body) else {
                continue;
            };
            if !body.is_moving() && entry.kind == ActorKind::Dynamic {
                continue;
            }
            let world = body.position().to_homogeneous();
            self.events.push(PhysicsEvent::Transform {
                unit: entry.unit,
                world,
            });
            let _ = index;
        }
    }

    pub fn events(&mut self) -> Vec<PhysicsEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Queries -----------------------------------------------------------

    fn query_filter(&self, filter: PhysicsQueryFilter) -> QueryFilter<'_> {
        let mut qf = QueryFilter::default();
        if let Some(groups) = filter.groups {
            qf = qf.groups(groups.to_rapier());
        }
        if let Some(unit) = filter.exclude_unit {
            if let Some(&idx) = self.actor_of_unit.get(&unit) {
                let handle = self.actors[idx as usize].body;
                qf = qf.exclude_rigid_body(handle);
            }
        }
        qf
    }

    pub fn cast_ray(
        &self,
        origin: Point3<f32>,
        dir: Vector3<f32>,
        max_toi: f32,
        filter: PhysicsQueryFilter,
    ) -> Option<RayHit> {
        let ray = Ray::new(origin, dir);
        let qf = self.query_filter(filter);
        let qp = self.broad_phase.as_query_pipeline(
            &DefaultQueryDispatcher,
            &self.bodies,
            &self.colliders,
            qf,
        );
        let (handle, hit) = qp.cast_ray_and_get_normal(&ray, max_toi, true)?;
        self.hit_to_ray_hit(handle, &ray, hit.time_of_impact, hit.normal)
    }

    pub fn cast_ray_all(
        &self,
        origin: Point3<f32>,
        dir: Vector3<f32>,
        max_toi: f32,
        filter: PhysicsQueryFilter,
    ) -> Vec<RayHit> {
        let ray = Ray::new(origin, dir);
        let qf = self.query_filter(filter);
        let qp = self.broad_phase.as_query_pipeline(
            &DefaultQueryDispatcher,
            &self.bodies,
            &self.colliders,
            qf,
        );
        let mut out = Vec::new();
        qp.intersections_with_ray(&ray, max_toi, true, |handle, hit| {
            if let Some(h) = self.hit_to_ray_hit(handle, &ray, hit.time_of_impact, hit.normal) {
                out.push(h);
            }
            true
        });
        out
    }

    pub fn cast_sphere(
        &self,
        origin: Point3<f32>,
        dir: Vector3<f32>,
        radius: f32,
        max_toi: f32,
        filter: PhysicsQueryFilter,
    ) -> Option<RayHit> {
        self.cast_shape(origin, dir, &Ball::new(radius), max_toi, filter)
    }

    pub fn cast_box(
        &self,
        origin: Point3<f32>,
        dir: Vector3<f32>,
        half_extents: Vector3<f32>,
        max_toi: f32,
        filter: PhysicsQueryFilter,
    ) -> Option<RayHit> {
        self.cast_shape(origin, dir, &Cuboid::new(half_extents), max_toi, filter)
    }

    fn cast_shape(
        &self,
        origin: Point3<f32>,
        dir: Vector3<f32>,
        shape: &dyn Shape,
        max_toi: f32,
        filter: PhysicsQueryFilter,
    ) -> Option<RayHit> {
        let qf = self.query_filter(filter);
        let qp = self.broad_phase.as_query_pipeline(
            &DefaultQueryDispatcher,
            &self.bodies,
            &self.colliders,
            qf,
        );
        let iso = Isometry3::from_parts(origin.coords.into(), UnitQuaternion::identity());
        let options = ShapeCastOptions::with_max_time_of_impact(max_toi);
        let (handle, hit) = qp.cast_shape(&iso, &dir, shape, options)?;
        self.hit_to_ray_hit(handle, &Ray::new(origin, dir), hit.time_of_impact, hit.normal1)
    }

    fn hit_to_ray_hit(
        &self,
        collider: ColliderHandle,
        ray: &Ray,
        toi: f32,
        normal: Vector3<f32>,
    ) -> Option<RayHit> {
        let &actor_index = self.collider_to_actor.get(&collider)?;
        let entry = &self.actors[actor_index as usize];
        Some(RayHit {
            actor: ActorInstance(actor_index),
            unit: entry.unit,
            position: ray.point_at(toi),
            normal,
            distance: toi,
        })
    }

    // --- Movers --------------------------------------------------------

    pub fn mover_create(
        &mut self,
        unit: UnitId,
        radius: f32,
        height: f32,
        max_slope_deg: f32,
        filter: CollisionFilter,
        position: Point3<f32>,
    ) -> MoverInstance {
        let body = RigidBodyBuilder::kinematic_position_based()
            .position(Isometry3::from_parts(position.coords.into(), UnitQuaternion::identity()))
            .user_data(unit.as_u32() as u128)
            .build();
        let body_handle = self.bodies.insert(body);
        let shape = SharedShape::capsule_y(((height - 2.0 * radius).max(0.0)) / 2.0, radius);
        let collider = ColliderBuilder::new(shape)
            .collision_groups(filter.to_rapier())
            .build();
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, body_handle, &mut self.bodies);

        self.movers.create(
            unit,
            body_handle,
            collider_handle,
            radius,
            height,
            max_slope_deg,
            filter,
        )
    }

    pub fn mover_destroy(&mut self, mover: MoverInstance) {
        if let Some(entry) = self.movers.get(mover) {
            self.bodies.remove(
                entry.body,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
        self.movers.destroy(mover);
    }

    pub fn mover(&self, unit: UnitId) -> MoverInstance {
        self.movers.instance_of(unit)
    }

    /// Slides `delta` against contacts using rapier's kinematic character
    /// controller and updates the mover's position.
    pub fn mover_move(&mut self, mover: MoverInstance, delta: Vector3<f32>, dt: f32) -> MoveResult {
        let Some(entry) = self.movers.get(mover).cloned() else {
            warn!("mover_move on destroyed mover handle");
            return MoveResult::default();
        };

        let controller = KinematicCharacterController {
            slide: true,
            max_slope_climb_angle: entry.max_slope_deg.to_radians(),
            ..Default::default()
        };

        let character_shape = Ball::new(entry.radius);
        let current_pos = self
            .bodies
            .get(entry.body)
            .map(|b| *b.position())
            .unwrap_or_default();

        let mut collisions: Vec<CharacterCollision> = Vec::new();
        let movement = controller.move_shape(
            dt,
            &self.bodies,
            &self.colliders,
            &DefaultQueryDispatcher,
            &character_shape,
            &current_pos,
            delta,
            QueryFilter::default().exclude_rigid_body(entry.body),
            |c| collisions.push(c),
        );

        let new_translation = current_pos.translation.vector + movement.translation;
        if let Some(body) = self.bodies.get_mut(entry.body) {
            let mut pos = *body.position();
            pos.translation = new_translation.into();
            body.set_next_kinematic_position(pos);
        }

        let result = MoveResult {
            collides_up: movement.grounded && delta.y > 0.0,
            collides_down: movement.grounded,
            collides_sides: !collisions.is_empty(),
        };
        self.movers.set_last_flags(mover, result);
        result
    }

    pub fn mover_position(&self, mover: MoverInstance) -> Point3<f32> {
        self.movers
            .get(mover)
            .and_then(|e| self.bodies.get(e.body))
            .map(|b| Point3::from(b.position().translation.vector))
            .unwrap_or_default()
    }

    pub fn mover_set_position(&mut self, mover: MoverInstance, position: Point3<f32>) {
        if let Some(entry) = self.movers.get(mover) {
            if let Some(body) = self.bodies.get_mut(entry.body) {
                let mut pos = *body.position();
                pos.translation = position.coords.into();
                body.set_next_kinematic_position(pos);
                body.set_position(pos, true);
            }
        }
    }

    pub fn mover_collision_flags(&self, mover: MoverInstance) -> MoveResult {
        self.movers.get(mover).map(|e| e.last_flags).unwrap_or_default()
    }

    pub fn mover_set_collision_filter(&mut self, mover: MoverInstance, filter: CollisionFilter) {
        if let Some(entry) = self.movers.get(mover).cloned() {
            for (ch, collider) in self.colliders.iter_mut() {
                if ch == entry.collider {
                    collider.set_collision_groups(filter.to_rapier());
                }
            }
            self.movers.set_filter(mover, filter);
        }
    }

    // --- Joints ----------------------------------------------------------

    pub fn joint_create(&mut self, a0: ActorInstance, a1: ActorInstance, desc: JointDesc) -> JointInstance {
        let body0 = self.require_actor(a0).body;
        let body1 = self.require_actor(a1).body;
        let generic = joint::build_generic_joint(&desc);
        let handle = self.impulse_joints.insert(body0, body1, generic, true);
        self.joints.track(handle, a0, a1, desc)
    }

    pub fn joint_destroy(&mut self, joint: JointInstance) {
        if let Some(handle) = self.joints.handle_of(joint) {
            self.impulse_joints.remove(handle, true);
        }
        self.joints.destroy(joint);
    }
}

fn matrix_to_isometry(m: &Matrix4<f32>) -> Isometry3<f32> {
    let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let rot_mat = nalgebra::Matrix3::new(
        m[(0, 0)], m[(0, 1)], m[(0, 2)],
        m[(1, 0)], m[(1, 1)], m[(1, 2)],
        m[(2, 0)], m[(2, 1)], m[(2, 2)],
    );
    let rotation = UnitQuaternion::from_matrix(&rot_mat);
    Isometry3::from_parts(translation.into(), rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitManager;

    #[test]
    fn collision_filter_symmetry() {
        let a = CollisionFilter { group: 0b01, mask: 0b10 };
        let b = CollisionFilter { group: 0b10, mask: 0b01 };
        assert!(CollisionFilter::interacts(a, b));

        let c = CollisionFilter { group: 0b01, mask: 0b01 };
        assert!(!CollisionFilter::interacts(a, c));
    }

    #[test]
    fn forces_are_noop_on_static_actor() {
        let mut mgr = UnitManager::new();
        let mut phys = PhysicsWorld::default();
        let unit = mgr.create();
        let actor = phys.actor_create(
            unit,
            ActorKind::Static,
            Point3::origin(),
            UnitQuaternion::identity(),
            CollisionFilter::default(),
        );
        phys.add_impulse(actor, Vector3::new(100.0, 0.0, 0.0));
        let pose = phys.actor_world_pose(actor);
        assert_eq!(pose[(0, 3)], 0.0);
    }

    #[test]
    #[should_panic]
    fn duplicate_actor_on_unit_panics() {
        let mut mgr = UnitManager::new();
        let mut phys = PhysicsWorld::default();
        let unit = mgr.create();
        phys.actor_create(unit, ActorKind::Static, Point3::origin(), UnitQuaternion::identity(), CollisionFilter::default());
        phys.actor_create(unit, ActorKind::Static, Point3::origin(), UnitQuaternion::identity(), CollisionFilter::default());
    }
}
