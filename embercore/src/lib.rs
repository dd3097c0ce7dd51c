//! World runtime core: owns a live simulation instance, spawns and destroys
//! units, and drives the per-frame pipeline across scene graph, physics,
//! animation, sound, scripting and render submission.
//!
//! [`World`] is the entry point; everything else in this crate is a
//! subsystem it owns and orchestrates. None of the subsystems reach into one
//! another directly — cross-subsystem effects (a physics transform updating
//! the scene graph, a collision reaching a script) only happen inside
//! `World::update`.

pub mod animation;
pub mod config;
pub mod error;
pub mod events;
pub mod level;
pub mod physics;
pub mod render;
pub mod resource;
pub mod scene_graph;
pub mod script;
pub mod sound;
pub mod unit;
pub mod world;

pub use config::{BootConfig, DeltaTimeFilter, EngineArgs};
pub use error::{WorldError, WorldResult};
pub use events::{CollisionCallbackArgs, CollisionEndArgs, TriggerCallbackArgs, WorldEvent};
pub use level::{ComponentDesc, Level, LevelHandle, LevelList, LevelResource, UnitResource};
pub use scene_graph::{SceneGraph, TransformInstance};
pub use unit::{UnitId, UnitManager};
pub use world::{GuiBuffer, World};

pub use ::tracing;
