//! Sound playback, mixed through `kira` when an audio device is available.
//! Opening a missing device degrades to a null backend that accepts every
//! call and plays nothing, matching the null-object pattern used for other
//! optional hardware-backed subsystems.

mod decoder;

pub use decoder::{DecodeOutcome, StreamDecoder};

use crate::unit::UnitId;
use kira::listener::ListenerHandle;
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::sound::PlaybackState;
use kira::track::{SpatialTrackHandle, TrackHandle};
use kira::{AudioManager, AudioManagerSettings, DefaultBackend, Tween};
use nalgebra::{Matrix4, Quaternion, Vector3};
use std::collections::HashMap;
use tracing::{error, trace, warn};

/// Sound buffers refilled per `update`, enough to stay ahead of playback at
/// typical frame rates for streamed sources.
pub const SOUND_MAX_BUFFERS: usize = 4;
pub const SOUND_BUFFER_MS: u32 = 100;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SoundFlags(u32);

impl SoundFlags {
    pub const NONE: SoundFlags = SoundFlags(0);
    pub const STREAMED: SoundFlags = SoundFlags(1 << 0);

    pub fn contains(self, other: SoundFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SoundInstanceId(u32);

impl SoundInstanceId {
    pub const INVALID: SoundInstanceId = SoundInstanceId(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

/// Backend abstraction over `kira`'s spatial tracks, so tests can run
/// without an audio device.
pub trait AudioBackend {
    fn play(&mut self, data: StaticSoundData, position: Vector3<f32>) -> Option<PlaybackHandle>;
    fn set_listener_pose(&mut self, position: Vector3<f32>, orientation: Quaternion<f32>);
    fn set_group_track_volume(&mut self, group: &mut Option<TrackHandle>, volume: f32);
}

pub struct PlaybackHandle {
    pub sound: StaticSoundHandle,
}

struct KiraBackendInner {
    manager: AudioManager<DefaultBackend>,
    listener: ListenerHandle,
}

/// Real backend, or `None` once `AudioManager::new` or `add_listener` fails —
/// every subsequent call on [`SoundWorld`] then becomes a no-op.
pub struct KiraBackend {
    inner: Option<KiraBackendInner>,
}

impl Default for KiraBackend {
    fn default() -> Self {
        let inner = match AudioManager::<DefaultBackend>::new(AudioManagerSettings::default()) {
            Ok(mut manager) => {
                match manager.add_listener(Vector3::zeros(), Quaternion::identity()) {
                    Ok(listener) => Some(KiraBackendInner { manager, listener }),
                    Err(e) => {
                        error!("failed to add audio listener: {e}");
                        None
                    }
                }
            }
            Err(e) => {
                error!("audio manager could not be initialized: {e:?}");
                None
            }
        };
        KiraBackend { inner }
    }
}

impl AudioBackend for KiraBackend {
    fn play(&mut self, data: StaticSoundData, _position: Vector3<f32>) -> Option<PlaybackHandle> {
        let inner = self.inner.as_mut()?;
        match inner.manager.play(data) {
            Ok(sound) => Some(PlaybackHandle { sound }),
            Err(e) => {
                warn!("failed to start sound: {e}");
                None
            }
        }
    }

    fn set_listener_pose(&mut self, position: Vector3<f32>, orientation: Quaternion<f32>) {
        if let Some(inner) = self.inner.as_mut() {
            inner.listener.set_position(position, Tween::default());
            inner.listener.set_orientation(orientation, Tween::default());
        }
    }

    fn set_group_track_volume(&mut self, _group: &mut Option<TrackHandle>, _volume: f32) {
        // per-instance volume is applied directly on the sound handle; group
        // tracks exist for future bus effects and are silent for now.
    }
}

/// Accepts every call, plays nothing. Used when no device is available and
/// directly in tests.
#[derive(Default)]
pub struct NullAudioBackend;

impl AudioBackend for NullAudioBackend {
    fn play(&mut self, _data: StaticSoundData, _position: Vector3<f32>) -> Option<PlaybackHandle> {
        None
    }
    fn set_listener_pose(&mut self, _position: Vector3<f32>, _orientation: Quaternion<f32>) {}
    fn set_group_track_volume(&mut self, _group: &mut Option<TrackHandle>, _volume: f32) {}
}

struct SoundGroup {
    volume: f32,
    _track: Option<SpatialTrackHandle>,
}

struct Instance {
    unit: UnitId,
    group: String,
    position: Vector3<f32>,
    range: f32,
    volume: f32,
    looping: bool,
    flags: SoundFlags,
    playing: bool,
    paused: bool,
    decoder: Option<Box<dyn StreamDecoder>>,
    handle: Option<PlaybackHandle>,
    finished: bool,
}

/// Owns every playing sound instance for one `World`. Generic over
/// [`AudioBackend`] so it can run against `kira` in the running engine or
/// [`NullAudioBackend`] in tests and headless servers.
pub struct SoundWorld<B: AudioBackend = KiraBackend> {
    backend: B,
    instances: Vec<Instance>,
    groups: HashMap<String, SoundGroup>,
    next_id: u32,
    id_to_index: HashMap<SoundInstanceId, usize>,
}

impl Default for SoundWorld<KiraBackend> {
    fn default() -> Self {
        SoundWorld::with_backend(KiraBackend::default())
    }
}

impl<B: AudioBackend> SoundWorld<B> {
    pub fn with_backend(backend: B) -> Self {
        SoundWorld {
            backend,
            instances: Vec::new(),
            groups: HashMap::new(),
            next_id: 0,
            id_to_index: HashMap::new(),
        }
    }

    fn ensure_group(&mut self, group: &str) {
        self.groups.entry(group.to_string()).or_insert_with(|| SoundGroup {
            volume: 1.0,
            _track: None,
        });
    }

    /// Allocates an instance and starts playback. `data` is `None` for a
    /// streaming source, whose samples instead arrive through `decoder`.
    #[allow(clippy::too_many_arguments)]
    pub fn play(
        &mut self,
        unit: UnitId,
        data: Option<StaticSoundData>,
        decoder: Option<Box<dyn StreamDecoder>>,
        looping: bool,
        volume: f32,
        range: f32,
        flags: SoundFlags,
        position: Vector3<f32>,
        group: &str,
    ) -> SoundInstanceId {
        self.ensure_group(group);

        let handle = data.and_then(|d| self.backend.play(d, position));

        let id = SoundInstanceId(self.next_id);
        self.next_id += 1;
        let index = self.instances.len();
        self.instances.push(Instance {
            unit,
            group: group.to_string(),
            position,
            range,
            volume,
            looping,
            flags,
            playing: true,
            paused: false,
            decoder,
            handle,
            finished: false,
        });
        self.id_to_index.insert(id, index);
        trace!(?id, ?unit, group, "sound instance started");
        id
    }

    fn index_of(&self, id: SoundInstanceId) -> Option<usize> {
        self.id_to_index.get(&id).copied()
    }

    pub fn stop(&mut self, id: SoundInstanceId) {
        if let Some(&index) = self.id_to_index.get(&id) {
            self.instances[index].playing = false;
            self.instances[index].finished = true;
        }
    }

    pub fn stop_all(&mut self) {
        for instance in &mut self.instances {
            instance.playing = false;
            instance.finished = true;
        }
    }

    pub fn pause_all(&mut self) {
        for instance in &mut self.instances {
            instance.paused = true;
        }
    }

    pub fn resume_all(&mut self) {
        for instance in &mut self.instances {
            instance.paused = false;
        }
    }

    pub fn set_position(&mut self, id: SoundInstanceId, position: Vector3<f32>) {
        if let Some(index) = self.index_of(id) {
            self.instances[index].position = position;
        }
    }

    pub fn set_range(&mut self, id: SoundInstanceId, range: f32) {
        if let Some(index) = self.index_of(id) {
            self.instances[index].range = range;
        }
    }

    pub fn set_volume(&mut self, id: SoundInstanceId, volume: f32) {
        if let Some(index) = self.index_of(id) {
            self.instances[index].volume = volume;
        }
    }

    pub fn set_listener_pose(&mut self, world: &Matrix4<f32>) {
        let position = Vector3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)]);
        let rot = nalgebra::Matrix3::new(
            world[(0, 0)], world[(0, 1)], world[(0, 2)],
            world[(1, 0)], world[(1, 1)], world[(1, 2)],
            world[(2, 0)], world[(2, 1)], world[(2, 2)],
        );
        let orientation = nalgebra::UnitQuaternion::from_matrix(&rot).quaternion().clone();
        self.backend.set_listener_pose(position, orientation);
    }

    /// Rescales every instance in `group`; applied on the next `update`.
    pub fn set_group_volume(&mut self, group: &str, volume: f32) {
        self.ensure_group(group);
        if let Some(g) = self.groups.get_mut(group) {
            g.volume = volume;
        }
    }

    fn group_volume(&self, group: &str) -> f32 {
        self.groups.get(group).map(|g| g.volume).unwrap_or(1.0)
    }

    /// Refills streaming buffers, rescales volume by distance from the
    /// listener, and reaps finished instances. Called once per frame.
    pub fn update(&mut self, listener_position: Vector3<f32>) {
        let mut scratch = [0.0f32; 1024];

        for instance in &mut self.instances {
            if !instance.playing || instance.paused {
                continue;
            }

            if instance.flags.contains(SoundFlags::STREAMED) {
                if let Some(decoder) = instance.decoder.as_mut() {
                    for _ in 0..SOUND_MAX_BUFFERS {
                        match decoder.fill_block(&mut scratch) {
                            DecodeOutcome::Filled => {}
                            DecodeOutcome::Eof if instance.looping => decoder.rewind_to_stream_start(),
                            DecodeOutcome::Eof => {
                                instance.finished = true;
                                break;
                            }
                        }
                    }
                }
            }

            let distance = (instance.position - listener_position).norm();
            let gain = if distance > instance.range {
                0.0
            } else {
                instance.volume * self.group_volume(&instance.group)
            };
            if let Some(handle) = instance.handle.as_mut() {
                handle.sound.set_volume(gain, Tween::default());
                if handle.sound.state() == PlaybackState::Stopped {
                    instance.finished = true;
                }
            }
        }

        self.reap_finished();
    }

    fn reap_finished(&mut self) {
        if !self.instances.iter().any(|i| i.finished) {
            return;
        }
        let mut new_instances = Vec::with_capacity(self.instances.len());
        let mut new_map = HashMap::new();
        let old_map: HashMap<usize, SoundInstanceId> =
            self.id_to_index.iter().map(|(&id, &idx)| (idx, id)).collect();

        for (old_index, instance) in self.instances.drain(..).enumerate() {
            if instance.finished {
                continue;
            }
            let id = old_map[&old_index];
            new_map.insert(id, new_instances.len());
            new_instances.push(instance);
        }
        self.instances = new_instances;
        self.id_to_index = new_map;
    }

    pub fn is_playing(&self, id: SoundInstanceId) -> bool {
        self.index_of(id).map(|i| self.instances[i].playing).unwrap_or(false)
    }
}

/// `SoundWorld::default()` backed by [`NullAudioBackend`], for tests and
/// headless servers that never touch a real device.
pub fn headless() -> SoundWorld<NullAudioBackend> {
    SoundWorld::with_backend(NullAudioBackend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitManager;

    #[test]
    fn range_cutoff_forces_zero_gain_without_backend() {
        let mut mgr = UnitManager::new();
        let mut sounds = headless();
        let unit = mgr.create();
        let id = sounds.play(
            unit,
            None,
            None,
            false,
            1.0,
            10.0,
            SoundFlags::NONE,
            Vector3::new(100.0, 0.0, 0.0),
            "sfx",
        );
        assert!(sounds.is_playing(id));
        sounds.update(Vector3::zeros());
        assert!(sounds.is_playing(id));
    }

    #[test]
    fn stop_all_marks_every_instance_finished() {
        let mut mgr = UnitManager::new();
        let mut sounds = headless();
        let unit = mgr.create();
        let a = sounds.play(unit, None, None, false, 1.0, 10.0, SoundFlags::NONE, Vector3::zeros(), "sfx");
        let b = sounds.play(unit, None, None, false, 1.0, 10.0, SoundFlags::NONE, Vector3::zeros(), "sfx");
        sounds.stop_all();
        sounds.update(Vector3::zeros());
        assert!(!sounds.is_playing(a));
        assert!(!sounds.is_playing(b));
    }

    #[test]
    fn group_created_at_unit_volume_on_first_play() {
        let mut mgr = UnitManager::new();
        let mut sounds = headless();
        let unit = mgr.create();
        sounds.play(unit, None, None, false, 1.0, 10.0, SoundFlags::NONE, Vector3::zeros(), "ambient");
        assert_eq!(sounds.group_volume("ambient"), 1.0);
    }
}
