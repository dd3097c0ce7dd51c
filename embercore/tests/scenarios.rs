//! Black-box scenarios exercised against the public API surface, covering
//! ground the in-module unit tests don't: streamed sound refill/teardown and
//! a whole-frame pipeline driven only through `World`.

use embercore::level::{ComponentDesc, UnitResource};
use embercore::render::NullRenderBackend;
use embercore::resource::SpawnFlags;
use embercore::script::{RecordingScriptBackend, ScriptDesc};
use embercore::sound::{DecodeOutcome, NullAudioBackend, SoundFlags, StreamDecoder};
use embercore::world::World;
use nalgebra::{UnitQuaternion, Vector3};
use std::sync::Arc;

/// Emits one block per call up to a fixed budget, then EOF — enough blocks
/// to straddle several `update()` calls before the stream runs dry.
struct BudgetDecoder {
    blocks_remaining: u32,
}

impl StreamDecoder for BudgetDecoder {
    fn fill_block(&mut self, out: &mut [f32]) -> DecodeOutcome {
        if self.blocks_remaining == 0 {
            return DecodeOutcome::Eof;
        }
        out.fill(0.0);
        self.blocks_remaining -= 1;
        DecodeOutcome::Filled
    }

    fn rewind_to_stream_start(&mut self) {
        self.blocks_remaining = 1;
    }
}

fn headless_world() -> World<NullRenderBackend, NullAudioBackend, RecordingScriptBackend> {
    World::with_backends(
        Default::default(),
        NullRenderBackend::default(),
        NullAudioBackend,
        RecordingScriptBackend::new(),
    )
}

#[test]
fn streamed_sound_stops_and_is_reaped_once_its_decoder_runs_dry() {
    let mut world = headless_world();
    let decoder = Box::new(BudgetDecoder { blocks_remaining: 1 });

    let id = world.sound.play(
        world.unit_manager.create(),
        None,
        Some(decoder),
        false,
        1.0,
        100.0,
        SoundFlags::STREAMED,
        Vector3::zeros(),
        "voice",
    );

    assert!(world.sound.is_playing(id));
    // One `update` drains every buffer slot the decoder can still fill, then
    // hits EOF and reaps the instance within the same call.
    world.sound.update(Vector3::zeros());
    assert!(!world.sound.is_playing(id));
}

#[test]
fn looping_streamed_sound_never_stops() {
    let mut world = headless_world();
    let decoder = Box::new(BudgetDecoder { blocks_remaining: 1 });

    let id = world.sound.play(
        world.unit_manager.create(),
        None,
        Some(decoder),
        true,
        1.0,
        100.0,
        SoundFlags::STREAMED,
        Vector3::zeros(),
        "music",
    );

    for _ in 0..50 {
        world.sound.update(Vector3::zeros());
        assert!(world.sound.is_playing(id), "looping stream must never be reaped");
    }
}

fn scripted_unit_resource(mesh: u64) -> Arc<UnitResource> {
    Arc::new(UnitResource {
        id: 42,
        locals: vec![(Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0))],
        parents: vec![None],
        components: vec![vec![
            ComponentDesc::MeshRenderer { mesh, material: 1 },
            ComponentDesc::Script(ScriptDesc { resource_id: 7 }),
        ]],
    })
}

#[test]
fn full_frame_pipeline_runs_scripts_after_render_and_sound() {
    let mut world = headless_world();
    let resource = scripted_unit_resource(3);

    let id = world.spawn_unit(
        &resource,
        SpawnFlags::empty(),
        Vector3::zeros(),
        UnitQuaternion::identity(),
        Vector3::new(1.0, 1.0, 1.0),
    );

    world.update(1.0 / 60.0);

    assert!(world.unit_manager.alive(id));
    let calls = &world.scripts.backend().calls;
    assert!(calls.iter().any(|c| c.fn_name == "spawned"));
    assert!(calls.iter().any(|c| c.fn_name == "update"));
    // `spawned` must run before the first `update` broadcast for this unit.
    let spawned_at = calls.iter().position(|c| c.fn_name == "spawned").unwrap();
    let update_at = calls.iter().position(|c| c.fn_name == "update").unwrap();
    assert!(spawned_at < update_at);
}
