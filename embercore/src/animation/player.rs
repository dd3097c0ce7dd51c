//! Bone and sprite samplers. Each keeps a monotonic cursor so no key is ever
//! sampled twice for the same frame's time (§8).

use super::clip::{AnimationClip, KeyPayload};
use nalgebra::{UnitQuaternion, Vector3};
use std::sync::Arc;

#[derive(Copy, Clone, Debug)]
pub struct SampledBone {
    pub bone_id: u16,
    pub position: Option<Vector3<f32>>,
    pub rotation: Option<UnitQuaternion<f32>>,
}

/// Cursor into one track's key subsequence; advances forward only.
#[derive(Default, Copy, Clone)]
struct TrackCursor {
    index: usize,
}

/// Samples bone position/rotation out of an [`AnimationClip`] as time
/// advances. One player per (unit, clip) pair; `advance` is idempotent
/// within the same call but never revisits an already-passed key.
pub struct SkeletalAnimationPlayer {
    clip: Arc<AnimationClip>,
    time_secs: f32,
    cursors: Vec<TrackCursor>,
    looping: bool,
}

impl SkeletalAnimationPlayer {
    pub fn new(clip: Arc<AnimationClip>, looping: bool) -> Self {
        let track_count = clip.num_tracks as usize;
        SkeletalAnimationPlayer {
            clip,
            time_secs: 0.0,
            cursors: vec![TrackCursor::default(); track_count],
            looping,
        }
    }

    pub fn time_secs(&self) -> f32 {
        self.time_secs
    }

    /// Advances by `dt`, wrapping (and resetting cursors) if looping and the
    /// clip wrapped past `total_time_secs`.
    pub fn advance(&mut self, dt: f32) -> Vec<SampledBone> {
        self.time_secs += dt;
        if self.time_secs > self.clip.total_time_secs {
            if self.looping {
                self.time_secs %= self.clip.total_time_secs.max(f32::EPSILON);
                for cursor in &mut self.cursors {
                    cursor.index = 0;
                }
            } else {
                self.time_secs = self.clip.total_time_secs;
            }
        }

        let time_ms = (self.time_secs * 1000.0) as u16;
        let mut sampled = Vec::new();

        for track_id in 0..self.clip.num_tracks {
            let Some(bone_id) = self.clip.bone_for_track(track_id) else {
                continue;
            };
            let keys = self.clip.track(track_id);
            if keys.len() < 2 {
                continue;
            }

            let cursor = &mut self.cursors[track_id as usize];
            while cursor.index + 1 < keys.len() && keys[cursor.index + 1].time_ms <= time_ms {
                cursor.index += 1;
            }
            let next_index = (cursor.index + 1).min(keys.len() - 1);
            let prev = keys[cursor.index];
            let next = keys[next_index];

            let t = if next.time_ms == prev.time_ms {
                0.0
            } else {
                (time_ms as f32 - prev.time_ms as f32) / (next.time_ms as f32 - prev.time_ms as f32)
            }
            .clamp(0.0, 1.0);

            let mut bone = SampledBone {
                bone_id,
                position: None,
                rotation: None,
            };
            match (prev.payload, next.payload) {
                (KeyPayload::Position(p0), KeyPayload::Position(p1)) => {
                    bone.position = Some(p0.lerp(&p1, t));
                }
                (KeyPayload::Rotation(r0), KeyPayload::Rotation(r1)) => {
                    bone.rotation = Some(r0.slerp(&r1, t));
                }
                _ => continue, // mismatched payload kinds on the same track is malformed data
            }
            sampled.push(bone);
        }

        sampled
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SpriteFrameChangeEvent {
    pub frame: u32,
}

/// Advances a fixed-rate sprite sheet animation. Emits a
/// [`SpriteFrameChangeEvent`] only when the visible frame actually changes,
/// so holding the last frame produces no duplicate events (§8/S4).
pub struct SpriteAnimationPlayer {
    frame_count: u32,
    frame_duration_secs: f32,
    looping: bool,
    time_secs: f32,
    current_frame: u32,
}

impl SpriteAnimationPlayer {
    pub fn new(frame_count: u32, frame_duration_secs: f32, looping: bool) -> Self {
        SpriteAnimationPlayer {
            frame_count: frame_count.max(1),
            frame_duration_secs: frame_duration_secs.max(f32::EPSILON),
            looping,
            time_secs: 0.0,
            current_frame: 0,
        }
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn advance(&mut self, dt: f32) -> Option<SpriteFrameChangeEvent> {
        self.time_secs += dt;
        let elapsed_frames = (self.time_secs / self.frame_duration_secs) as u32;
        let new_frame = if self.looping {
            elapsed_frames % self.frame_count
        } else {
            elapsed_frames.min(self.frame_count - 1)
        };

        if new_frame != self.current_frame {
            self.current_frame = new_frame;
            Some(SpriteFrameChangeEvent { frame: new_frame })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::AnimationKey;

    #[test]
    fn skeletal_sampling_is_monotonic_and_matches_s4() {
        let keys = vec![
            AnimationKey::position(0, 0, Vector3::zeros()),
            AnimationKey::position(0, 1000, Vector3::new(10.0, 0.0, 0.0)),
        ];
        let clip = Arc::new(AnimationClip::new(1.0, 1, keys, vec![0]));
        let mut player = SkeletalAnimationPlayer::new(clip, false);

        let mut xs = Vec::new();
        let mut last_time = -1.0;
        for _ in 0..4 {
            let sampled = player.advance(0.25);
            more_asserts::assert_gt!(player.time_secs(), last_time);
            last_time = player.time_secs();
            let bone = sampled.iter().find(|b| b.bone_id == 0).expect("bone 0 sampled");
            xs.push(bone.position.unwrap().x);
        }
        assert!((xs[0] - 2.5).abs() < 1e-4);
        assert!((xs[1] - 5.0).abs() < 1e-4);
        assert!((xs[2] - 7.5).abs() < 1e-4);
        assert!((xs[3] - 10.0).abs() < 1e-4);
    }

    #[test]
    fn sprite_player_emits_no_duplicate_event_on_held_last_frame() {
        let mut player = SpriteAnimationPlayer::new(4, 0.1, false);
        let mut events = 0;
        for _ in 0..20 {
            if player.advance(0.1).is_some() {
                events += 1;
            }
        }
        assert_eq!(events, 3); // frames 1,2,3 reached, then held
        assert_eq!(player.current_frame(), 3);
        assert!(player.advance(0.1).is_none());
    }
}
