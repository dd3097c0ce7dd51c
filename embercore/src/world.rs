//! The orchestrator: owns every component system, dispatches unit spawn and
//! destroy, drives the per-frame pipeline, and builds the camera model.
//! Nothing outside this module calls more than one subsystem in the same
//! breath — `World` is where their interactions are allowed to happen.

use crate::animation::{AnimationStateMachine, SkeletalAnimationPlayer, SpriteAnimationPlayer};
use crate::config::{BootConfig, DeltaTimeFilter};
use crate::error::{LevelAlreadyLoadedErr, LevelNotLoadedErr, WorldResult};
use crate::events::{CollisionCallbackArgs, CollisionEndArgs, TriggerCallbackArgs, WorldEvent};
use crate::level::{ComponentDesc, Level, LevelHandle, LevelList, LevelResource, UnitResource};
use crate::physics::{CollisionPhase, PhysicsEvent, PhysicsWorld};
use crate::render::{NullRenderBackend, RenderBackend, RenderWorld};
use crate::resource::SpawnFlags;
use crate::scene_graph::{SceneGraph, TransformInstance, TransformOverride};
use crate::script::{NullScriptBackend, ScriptArg, ScriptArgs, ScriptBackend, ScriptWorld};
use crate::sound::{AudioBackend, KiraBackend, NullAudioBackend, SoundWorld};
use crate::unit::{UnitId, UnitManager};
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use snafu::ensure;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Per-frame GUI draw-list placeholder. The GUI/input layer itself is out of
/// scope (§1); `update`'s ordering still resets it once per frame so a future
/// immediate-mode GUI can assume a clean buffer at frame start.
#[derive(Default)]
pub struct GuiBuffer {
    frames_reset: u64,
}

impl GuiBuffer {
    pub fn reset(&mut self) {
        self.frames_reset += 1;
    }

    pub fn frames_reset(&self) -> u64 {
        self.frames_reset
    }
}

/// Owns a live simulation instance: every component system, the flat unit
/// list, loaded levels, and the per-frame event queue. Generic over the
/// three optional-hardware backends so the same orchestrator logic runs
/// against a GPU/audio device in the running engine or fully headless in
/// tests.
pub struct World<RB: RenderBackend = NullRenderBackend, AB: AudioBackend = KiraBackend, SB: ScriptBackend = NullScriptBackend> {
    pub unit_manager: UnitManager,
    pub scene_graph: SceneGraph,
    pub physics: PhysicsWorld,
    pub render: RenderWorld<RB>,
    pub sound: SoundWorld<AB>,
    pub animation: AnimationStateMachine,
    pub scripts: ScriptWorld<SB>,
    pub gui: GuiBuffer,
    pub config: BootConfig,

    units: Vec<UnitId>,
    levels: LevelList,
    root_resource: HashMap<UnitId, Arc<UnitResource>>,
    events: Vec<WorldEvent>,
    dt_filter: DeltaTimeFilter,
    camera_unit: Option<UnitId>,
    skydome_mesh: Option<u64>,
}

impl World<NullRenderBackend, KiraBackend, NullScriptBackend> {
    /// A world with real audio (degrading to null on device failure, per
    /// §7), no GPU backend wired yet, and no scripting runtime wired yet.
    pub fn new(config: BootConfig) -> Self {
        World::with_backends(config, NullRenderBackend::default(), KiraBackend::default(), NullScriptBackend)
    }
}

impl Default for World<NullRenderBackend, KiraBackend, NullScriptBackend> {
    fn default() -> Self {
        World::new(BootConfig::from_env())
    }
}

impl World<NullRenderBackend, NullAudioBackend, NullScriptBackend> {
    /// Every optional subsystem backed by its null implementation. Used by
    /// tests and dedicated-server processes with no device or VM attached.
    pub fn headless() -> Self {
        World::with_backends(BootConfig::default(), NullRenderBackend::default(), NullAudioBackend, NullScriptBackend)
    }
}

impl<RB: RenderBackend, AB: AudioBackend, SB: ScriptBackend> World<RB, AB, SB> {
    pub fn with_backends(config: BootConfig, render_backend: RB, sound_backend: AB, script_backend: SB) -> Self {
        let mut scripts = ScriptWorld::with_backend(script_backend);
        scripts.disable_callbacks = config.disable_script_callbacks;

        World {
            unit_manager: UnitManager::new(),
            scene_graph: SceneGraph::new(),
            physics: PhysicsWorld::new(config.physics.step_frequency, config.physics.max_substeps),
            render: RenderWorld::with_backend(render_backend),
            sound: SoundWorld::with_backend(sound_backend),
            animation: AnimationStateMachine::new(),
            scripts,
            gui: GuiBuffer::default(),
            units: Vec::new(),
            levels: LevelList::new(),
            root_resource: HashMap::new(),
            events: Vec::new(),
            dt_filter: DeltaTimeFilter::new(config.max_frame_delta_secs),
            camera_unit: None,
            skydome_mesh: None,
            config,
        }
    }

    pub fn units(&self) -> &[UnitId] {
        &self.units
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_active_camera(&mut self, unit: UnitId) {
        self.camera_unit = Some(unit);
    }

    pub fn set_skydome_mesh(&mut self, mesh: Option<u64>) {
        self.skydome_mesh = mesh;
    }

    /// `tracing::info!`-based liveness dump.
    pub fn print_units(&self) {
        tracing::info!(
            slots = self.unit_manager.slot_count(),
            alive = self.unit_manager.alive_count(),
            live_units = self.units.len(),
            "unit manager snapshot"
        );
    }

    // --- Spawn / destroy --------------------------------------------------

    /// Spawns every sub-unit named by `resource`, routes each component
    /// block to its subsystem, and returns the root-most unit id (index 0).
    /// `flags` selects which of `position`/`rotation`/`scale` override the
    /// resource's root transform; subordinate transforms are always taken
    /// verbatim from the resource.
    pub fn spawn_unit(
        &mut self,
        resource: &Arc<UnitResource>,
        flags: SpawnFlags,
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        scale: Vector3<f32>,
    ) -> UnitId {
        let ids: Vec<UnitId> = (0..resource.num_units()).map(|_| self.unit_manager.create()).collect();

        let overrides = TransformOverride {
            position: flags.contains(SpawnFlags::OVERRIDE_POSITION).then_some(position),
            rotation: flags.contains(SpawnFlags::OVERRIDE_ROTATION).then_some(rotation),
            scale: flags.contains(SpawnFlags::OVERRIDE_SCALE).then_some(scale),
        };
        self.scene_graph.create_instances(&ids, &resource.locals, &resource.parents, overrides);

        for (i, &id) in ids.iter().enumerate() {
            for comp in &resource.components[i] {
                self.dispatch_component(id, &ids, comp);
            }
        }

        self.root_resource.insert(ids[0], Arc::clone(resource));
        self.units.extend(ids.iter().copied());

        for &id in &ids {
            self.events.push(WorldEvent::UnitSpawned { unit: id });
        }
        self.scripts.spawned(&ids);

        trace!(root = ?ids[0], count = ids.len(), "unit spawned");
        ids[0]
    }

    /// Destroys `root` and its whole scene-graph subtree. A no-op if `root`
    /// has no transform (already destroyed, or never spawned).
    pub fn destroy_unit(&mut self, root: UnitId) {
        let ti = self.scene_graph.instance(root);
        if !ti.is_valid() {
            return;
        }

        // The scene graph removes its whole subtree as one swap-remove pass
        // rather than per-id, since compacting one node at a time mid-loop
        // would invalidate indices the rest of the loop still needs;
        // `destroy_subtree` already orders its internal removals to do this
        // safely. It also gives us the DFS-ordered id list `destroy_unit`
        // needs.
        let ids = self.scene_graph.destroy_subtree(ti);
        self.scripts.unspawned(&ids);

        for &id in &ids {
            self.destroy_components(id);
            self.unit_manager.destroy(id);
            self.events.push(WorldEvent::UnitDestroyed { unit: id });
        }

        self.units.retain(|u| !ids.contains(u));
        self.root_resource.remove(&root);
    }

    /// Removes every non-scene-graph component instance for `id` (the scene
    /// graph node itself is handled separately by `destroy_subtree`).
    fn destroy_components(&mut self, id: UnitId) {
        let mover = self.physics.mover(id);
        if mover.is_valid() {
            self.physics.mover_destroy(mover);
        }
        let actor = self.physics.actor(id);
        if actor.is_valid() {
            self.physics.actor_destroy(actor);
        }
        self.render.mesh.destroy(id);
        self.render.sprite.destroy(id);
        self.render.light.destroy(id);
        self.render.camera.destroy(id);
        self.animation.destroy(id);
        self.scripts.destroy_unit(id);
    }

    fn dispatch_component(&mut self, id: UnitId, ids: &[UnitId], comp: &ComponentDesc) {
        match comp {
            ComponentDesc::Camera(desc) => {
                self.render.camera.create_instances(&[id], &[*desc]);
            }
            ComponentDesc::Actor { kind, filter } => {
                let ti = self.scene_graph.instance(id);
                let (pos, rot, _scale) = crate::scene_graph::decompose(&self.scene_graph.world_pose(ti));
                self.physics.actor_create(id, *kind, Point3::from(pos), rot, *filter);
            }
            ComponentDesc::Collider { shape, is_trigger } => {
                let actor = self.physics.actor(id);
                self.physics.collider_create(actor, shape.clone(), *is_trigger);
            }
            ComponentDesc::Mover {
                radius,
                height,
                max_slope_deg,
                filter,
            } => {
                let ti = self.scene_graph.instance(id);
                let (pos, _rot, _scale) = crate::scene_graph::decompose(&self.scene_graph.world_pose(ti));
                self.physics.mover_create(id, *radius, *height, *max_slope_deg, *filter, Point3::from(pos));
            }
            ComponentDesc::MeshRenderer { mesh, material } => {
                self.render.mesh.create_instances(&[id], &[*mesh], &[*material]);
            }
            ComponentDesc::SpriteRenderer { texture } => {
                self.render.sprite.create_instances(&[id], &[*texture]);
            }
            ComponentDesc::Light { color, intensity, range } => {
                self.render.light.create_instances(&[id], &[*color], &[*intensity], &[*range]);
            }
            ComponentDesc::Fog(settings) => self.render.fog = *settings,
            ComponentDesc::GlobalLighting(settings) => self.render.global_lighting = *settings,
            ComponentDesc::Bloom(settings) => self.render.bloom = *settings,
            ComponentDesc::Tonemap(settings) => self.render.tonemap = *settings,
            ComponentDesc::Script(desc) => {
                self.scripts.create(id, desc);
            }
            ComponentDesc::AnimationStateMachine(desc) => {
                let skeletal = desc
                    .skeletal_clip
                    .clone()
                    .map(|clip| SkeletalAnimationPlayer::new(clip, desc.skeletal_looping));
                let sprite = desc
                    .sprite_frame_count
                    .map(|count| SpriteAnimationPlayer::new(count, desc.sprite_frame_duration_secs, desc.sprite_looping));
                let bone_nodes: Vec<TransformInstance> = desc
                    .bone_unit_offsets
                    .iter()
                    .map(|&offset| ids.get(offset).map(|&u| self.scene_graph.instance(u)).unwrap_or(TransformInstance::INVALID))
                    .collect();
                self.animation.create(id, skeletal, sprite, bone_nodes, desc.initial_state.clone());
            }
        }
    }

    // --- Frame --------------------------------------------------------------

    /// Advances the simulation by the filtered wall-clock delta since the
    /// last call.
    pub fn tick(&mut self) {
        let dt = self.dt_filter.tick();
        self.update(dt);
    }

    /// One straight-line frame: animation before physics reads poses,
    /// physics before its events reach scripts and the scene graph, render
    /// transforms use post-physics world matrices, scripts run last (§5).
    pub fn update(&mut self, dt: f32) {
        let _span = tracing::trace_span!("update").entered();

        self.animation.update(dt, &mut self.scene_graph);
        for change in self.animation.drain_sprite_events() {
            let instance = self.render.sprite.instance(change.unit);
            if instance.is_valid() {
                self.render.sprite_set_frame(instance, change.frame);
            }
        }

        let mut pre_physics_changed = Vec::new();
        self.scene_graph.get_changed(&mut pre_physics_changed);
        self.physics.update_actor_world_poses(&pre_physics_changed);

        {
            let _span = tracing::trace_span!("physics.step").entered();
            self.physics.step(dt);
        }

        let mut deferred = Vec::new();
        for event in self.physics.events() {
            match event {
                PhysicsEvent::Transform { unit, world } => {
                    let ti = self.scene_graph.instance(unit);
                    if ti.is_valid() {
                        self.scene_graph.set_world_pose(ti, world);
                    }
                }
                PhysicsEvent::JointBroken { unit_a, unit_b } => {
                    self.events.push(WorldEvent::JointBroken { unit_a, unit_b });
                }
                other => deferred.push(other),
            }
        }

        let mut post_physics_changed = Vec::new();
        self.scene_graph.get_changed(&mut post_physics_changed);
        self.scene_graph.clear_changed();

        let units2: Vec<UnitId> = post_physics_changed.iter().map(|(u, _)| *u).collect();
        let worlds2: Vec<Matrix4<f32>> = post_physics_changed.iter().map(|(_, w)| *w).collect();
        self.render.update_transforms(&units2, &worlds2);

        {
            let _span = tracing::trace_span!("sound.update").entered();
            self.sound.update(self.listener_position());
        }

        self.gui.reset();

        for event in deferred {
            self.route_physics_event_to_scripts(event);
        }

        self.scripts.broadcast("update", &ScriptArgs::from_iter([ScriptArg::Float(dt)]));
    }

    fn listener_position(&self) -> Vector3<f32> {
        let Some(unit) = self.camera_unit else {
            return Vector3::zeros();
        };
        let ti = self.scene_graph.instance(unit);
        if !ti.is_valid() {
            return Vector3::zeros();
        }
        let world = self.scene_graph.world_pose(ti);
        Vector3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)])
    }

    /// Routes a drained collision/trigger event to the owning unit's script
    /// instance. `collision_stay` (§6) is not emitted: `rapier3d`'s collision
    /// events are edge-triggered (start/stop only), and re-deriving a
    /// per-frame "still touching" stream from the narrow phase isn't
    /// exercised by any of this crate's test scenarios, so it's left undone
    /// rather than guessed at.
    fn route_physics_event_to_scripts(&mut self, event: PhysicsEvent) {
        match event {
            PhysicsEvent::Collision {
                unit_a,
                unit_b,
                actor_a,
                actor_b,
                phase,
                contact,
            } => match phase {
                CollisionPhase::Started => {
                    let Some(contact) = contact else { return };
                    let args_a = CollisionCallbackArgs {
                        self_unit: unit_a,
                        other_unit: unit_b,
                        self_actor: actor_a,
                        other_actor: actor_b,
                        position: contact.position,
                        normal: contact.normal,
                        distance: contact.distance,
                    };
                    let args_b = CollisionCallbackArgs {
                        self_unit: unit_b,
                        other_unit: unit_a,
                        self_actor: actor_b,
                        other_actor: actor_a,
                        position: contact.position,
                        normal: -contact.normal,
                        distance: contact.distance,
                    };
                    let ia = self.scripts.instance(unit_a);
                    self.scripts.unicast("collision_begin", ia, &args_a.as_script_args());
                    let ib = self.scripts.instance(unit_b);
                    self.scripts.unicast("collision_begin", ib, &args_b.as_script_args());
                }
                CollisionPhase::Stopped => {
                    let end_a = CollisionEndArgs {
                        self_unit: unit_a,
                        other_unit: unit_b,
                    };
                    let end_b = CollisionEndArgs {
                        self_unit: unit_b,
                        other_unit: unit_a,
                    };
                    let ia = self.scripts.instance(unit_a);
                    self.scripts.unicast("collision_end", ia, &end_a.as_script_args());
                    let ib = self.scripts.instance(unit_b);
                    self.scripts.unicast("collision_end", ib, &end_b.as_script_args());
                }
            },
            PhysicsEvent::Trigger { sensor_unit, other_unit, phase } => {
                let fn_name = match phase {
                    CollisionPhase::Started => "trigger_enter",
                    CollisionPhase::Stopped => "trigger_leave",
                };
                let args = TriggerCallbackArgs {
                    trigger_unit: sensor_unit,
                    other_unit,
                };
                let instance = self.scripts.instance(sensor_unit);
                self.scripts.unicast(fn_name, instance, &args.as_script_args());
            }
            PhysicsEvent::Transform { .. } | PhysicsEvent::JointBroken { .. } => {
                crate::debug_panic!("transform/joint-broken events must be filtered out before script routing");
            }
        }
    }

    // --- Camera ------------------------------------------------------------

    /// `invert(rotate_x_90 · world_pose(camera_unit))`: the camera's forward
    /// axis is +Y in local space, so the view matrix rotates that onto -Z
    /// before inverting (§4.8 "Camera").
    pub fn camera_view_matrix(&self) -> Option<Matrix4<f32>> {
        let unit = self.camera_unit?;
        let ti = self.scene_graph.instance(unit);
        if !ti.is_valid() {
            return None;
        }
        let world = self.scene_graph.world_pose(ti);
        let rotate_x_90 = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2).to_homogeneous();
        (rotate_x_90 * world).try_inverse()
    }

    pub fn camera_projection_matrix(&self, aspect: f32) -> Option<Matrix4<f32>> {
        let unit = self.camera_unit?;
        let instance = self.render.camera.instance(unit);
        if !instance.is_valid() {
            return None;
        }
        Some(self.render.camera.build_projection(instance, aspect, self.render.capabilities()))
    }

    /// Builds the view/projection matrices for the active camera and
    /// composes one render frame. A no-op if no camera is active or the
    /// active unit has no camera component.
    pub fn render_frame(&mut self, aspect: f32) {
        let (Some(view), Some(proj)) = (self.camera_view_matrix(), self.camera_projection_matrix(aspect)) else {
            return;
        };
        self.render.render(view, proj, proj, self.skydome_mesh);
    }

    // --- Levels --------------------------------------------------------------

    /// Spawns every unit blueprint named by `resource` and links the result
    /// into the world's level list.
    pub fn load_level(&mut self, resource: &Arc<LevelResource>) -> WorldResult<LevelHandle> {
        ensure!(
            self.levels.handle_for_resource(resource.id).is_none(),
            LevelAlreadyLoadedErr { resource: resource.id }
        );

        let root_units: Vec<UnitId> = resource
            .unit_blueprints
            .iter()
            .map(|blueprint| {
                self.spawn_unit(
                    blueprint,
                    SpawnFlags::empty(),
                    Vector3::zeros(),
                    UnitQuaternion::identity(),
                    Vector3::new(1.0, 1.0, 1.0),
                )
            })
            .collect();

        Ok(self.levels.insert(Level {
            resource_id: resource.id,
            root_units,
        }))
    }

    /// Destroys every unit the level spawned and unlinks it.
    pub fn unload_level(&mut self, handle: LevelHandle) -> WorldResult<()> {
        let Some(level) = self.levels.remove(handle) else {
            return LevelNotLoadedErr { resource: 0u64 }.fail();
        };
        for root in level.root_units {
            self.destroy_unit(root);
        }
        Ok(())
    }

    pub fn loaded_level_count(&self) -> usize {
        self.levels.len()
    }

    // --- Hot reload ----------------------------------------------------------

    /// Forwards a material swap to the render backend.
    pub fn reload_materials(&mut self, old_material: u64, new_material: u64) {
        self.render.reload_materials(old_material, new_material);
    }

    /// For every live unit originally spawned from `old_resource`: snapshot
    /// its local TRS, tear down its component instances, reconcile the id
    /// count against `new_resource`, and re-dispatch component creation with
    /// the snapshot as a transform override (§4.8 "Hot reload").
    pub fn reload_units(&mut self, old_resource: &Arc<UnitResource>, new_resource: &Arc<UnitResource>) {
        let roots: Vec<UnitId> = self
            .root_resource
            .iter()
            .filter(|(_, res)| res.id == old_resource.id)
            .map(|(&root, _)| root)
            .collect();
        for root in roots {
            self.reload_one_unit(root, new_resource);
        }
    }

    fn reload_one_unit(&mut self, root: UnitId, new_resource: &Arc<UnitResource>) {
        let ti = self.scene_graph.instance(root);
        if !ti.is_valid() {
            return;
        }

        let snapshot = TransformOverride {
            position: Some(self.scene_graph.local_position(ti)),
            rotation: Some(self.scene_graph.local_rotation(ti)),
            scale: Some(self.scene_graph.local_scale(ti)),
        };
        let parent_ti = self.scene_graph.parent(ti);

        let mut ids = self.scene_graph.destroy_subtree(ti);
        for &id in &ids {
            self.destroy_components(id);
        }

        match new_resource.num_units().cmp(&ids.len()) {
            std::cmp::Ordering::Greater => {
                for _ in ids.len()..new_resource.num_units() {
                    ids.push(self.unit_manager.create());
                }
            }
            std::cmp::Ordering::Less => {
                for extra in ids.split_off(new_resource.num_units()) {
                    self.unit_manager.destroy(extra);
                }
            }
            std::cmp::Ordering::Equal => {}
        }

        let new_tis = self.scene_graph.create_instances(&ids, &new_resource.locals, &new_resource.parents, snapshot);
        if parent_ti.is_valid() {
            self.scene_graph.reparent(new_tis[0], parent_ti);
        }

        for (i, &id) in ids.iter().enumerate() {
            for comp in &new_resource.components[i] {
                self.dispatch_component(id, &ids, comp);
            }
        }

        self.units.retain(|u| self.unit_manager.alive(*u));
        for &id in &ids {
            if !self.units.contains(&id) {
                self.units.push(id);
            }
        }

        self.root_resource.remove(&root);
        self.root_resource.insert(ids[0], Arc::clone(new_resource));

        trace!(root = ?ids[0], "unit reloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{ActorKind, CollisionFilter};
    use crate::render::CameraDesc;
    use crate::render::ProjectionType;
    use crate::script::{RecordingScriptBackend, ScriptDesc};
    use nalgebra::Vector3;
    use rapier3d::prelude::SharedShape;

    fn headless_with_scripts() -> World<NullRenderBackend, NullAudioBackend, RecordingScriptBackend> {
        World::with_backends(
            BootConfig::default(),
            NullRenderBackend::default(),
            NullAudioBackend,
            RecordingScriptBackend::new(),
        )
    }

    fn single_unit_resource(mesh: u64, script: bool) -> Arc<UnitResource> {
        let mut components = vec![ComponentDesc::MeshRenderer { mesh, material: 1 }];
        if script {
            components.push(ComponentDesc::Script(ScriptDesc { resource_id: 1 }));
        }
        Arc::new(UnitResource {
            id: 1,
            locals: vec![(Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0))],
            parents: vec![None],
            components: vec![components],
        })
    }

    #[test]
    fn spawn_despawn_round_trip() {
        let mut world = headless_with_scripts();
        let resource = single_unit_resource(7, true);

        let id = world.spawn_unit(
            &resource,
            SpawnFlags::OVERRIDE_POSITION,
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
            Vector3::new(1.0, 1.0, 1.0),
        );

        assert!(world.unit_manager.alive(id));
        let ti = world.scene_graph.instance(id);
        let world_pos = world.scene_graph.world_pose(ti).column(3).xyz();
        assert_eq!(world_pos, Vector3::new(1.0, 2.0, 3.0));
        assert!(world.render.mesh.instance(id).is_valid());
        assert_eq!(world.scripts.backend().calls[0].fn_name, "spawned");

        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(e, WorldEvent::UnitSpawned { unit } if *unit == id)));

        world.destroy_unit(id);

        assert!(!world.unit_manager.alive(id));
        assert!(!world.render.mesh.instance(id).is_valid());
        assert!(world.scripts.backend().calls.iter().any(|c| c.fn_name == "unspawned"));

        let destroyed: Vec<_> = world
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, WorldEvent::UnitDestroyed { unit } if *unit == id))
            .collect();
        assert_eq!(destroyed.len(), 1);
    }

    #[test]
    fn dirty_propagation_reaches_child() {
        let mut world = World::<NullRenderBackend, NullAudioBackend, NullScriptBackend>::headless();
        let parent_resource = Arc::new(UnitResource {
            id: 2,
            locals: vec![
                (Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0)),
                (Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0)),
            ],
            parents: vec![None, Some(0)],
            components: vec![Vec::new(), Vec::new()],
        });
        let root = world.spawn_unit(
            &parent_resource,
            SpawnFlags::empty(),
            Vector3::zeros(),
            UnitQuaternion::identity(),
            Vector3::new(1.0, 1.0, 1.0),
        );
        world.scene_graph.clear_changed();

        let ti = world.scene_graph.instance(root);
        world.scene_graph.set_local_position(ti, Vector3::new(10.0, 0.0, 0.0));

        let mut changed = Vec::new();
        world.scene_graph.get_changed(&mut changed);
        assert_eq!(changed.len(), 2);
        let parent_world = changed.iter().find(|(u, _)| *u == root).unwrap().1;
        assert_eq!(parent_world.column(3).xyz(), Vector3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn physics_collision_routes_to_both_scripts() {
        let mut world = headless_with_scripts();

        let unit_a = world.unit_manager.create();
        let unit_b = world.unit_manager.create();
        world
            .scene_graph
            .create_instances(&[unit_a], &[(Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0))], &[None], TransformOverride::default());
        world.scene_graph.create_instances(
            &[unit_b],
            &[(Vector3::new(0.2, 0.0, 0.0), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0))],
            &[None],
            TransformOverride::default(),
        );

        let actor_a = world.physics.actor_create(unit_a, ActorKind::Dynamic, Point3::origin(), UnitQuaternion::identity(), CollisionFilter::default());
        let actor_b = world.physics.actor_create(
            unit_b,
            ActorKind::Dynamic,
            Point3::new(0.2, 0.0, 0.0),
            UnitQuaternion::identity(),
            CollisionFilter::default(),
        );
        world.physics.collider_create(actor_a, SharedShape::ball(0.5), false);
        world.physics.collider_create(actor_b, SharedShape::ball(0.5), false);

        world.scripts.create(unit_a, &ScriptDesc { resource_id: 10 });
        world.scripts.create(unit_b, &ScriptDesc { resource_id: 11 });

        for _ in 0..5 {
            world.update(1.0 / 60.0);
        }

        let calls = &world.scripts.backend().calls;
        assert!(calls.iter().any(|c| c.fn_name == "collision_begin"));
    }

    #[test]
    fn hot_reload_preserves_local_position() {
        let mut world = World::<NullRenderBackend, NullAudioBackend, NullScriptBackend>::headless();
        let old_resource = single_unit_resource(1, false);
        let id = world.spawn_unit(
            &old_resource,
            SpawnFlags::OVERRIDE_POSITION,
            Vector3::new(5.0, 0.0, 0.0),
            UnitQuaternion::identity(),
            Vector3::new(1.0, 1.0, 1.0),
        );

        let new_resource = single_unit_resource(99, false);
        world.reload_units(&old_resource, &new_resource);

        assert!(world.unit_manager.alive(id));
        let ti = world.scene_graph.instance(id);
        assert_eq!(world.scene_graph.local_position(ti), Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(world.render.mesh.len(), 1);
    }

    #[test]
    fn load_level_spawns_every_blueprint_and_unload_destroys_them() {
        let mut world = World::<NullRenderBackend, NullAudioBackend, NullScriptBackend>::headless();
        let resource = Arc::new(LevelResource {
            id: 1,
            unit_blueprints: vec![single_unit_resource(1, false), single_unit_resource(2, false)],
        });

        let handle = world.load_level(&resource).unwrap();
        assert_eq!(world.loaded_level_count(), 1);
        assert_eq!(world.render.mesh.len(), 2);

        world.unload_level(handle).unwrap();
        assert_eq!(world.loaded_level_count(), 0);
        assert_eq!(world.render.mesh.len(), 0);
    }

    #[test]
    fn camera_view_matrix_is_none_without_an_active_camera() {
        let world = World::<NullRenderBackend, NullAudioBackend, NullScriptBackend>::headless();
        assert!(world.camera_view_matrix().is_none());
    }

    #[test]
    fn camera_projection_uses_camera_component() {
        let mut world = World::<NullRenderBackend, NullAudioBackend, NullScriptBackend>::headless();
        let unit = world.unit_manager.create();
        world.scene_graph.create_instances(
            &[unit],
            &[(Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0))],
            &[None],
            TransformOverride::default(),
        );
        world.render.camera.create_instances(
            &[unit],
            &[CameraDesc {
                projection: ProjectionType::Perspective { fov_y_radians: 1.0 },
                near: 0.1,
                far: 100.0,
            }],
        );
        world.set_active_camera(unit);

        assert!(world.camera_view_matrix().is_some());
        assert!(world.camera_projection_matrix(16.0 / 9.0).is_some());
    }
}
