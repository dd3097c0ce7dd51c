//! Animation clip data: a sorted key stream over per-bone tracks, matching
//! the mesh-animation resource layout in §6.

use crate::resource::AnimationKeyHeader;
use itertools::Itertools;
use nalgebra::{UnitQuaternion, Vector3};

#[derive(Copy, Clone, Debug)]
pub enum KeyPayload {
    Position(Vector3<f32>),
    Rotation(UnitQuaternion<f32>),
}

#[derive(Copy, Clone, Debug)]
pub struct AnimationKey {
    pub track_id: u16,
    pub time_ms: u16,
    pub payload: KeyPayload,
}

impl AnimationKey {
    pub fn position(track_id: u16, time_ms: u16, p: Vector3<f32>) -> Self {
        AnimationKey {
            track_id,
            time_ms,
            payload: KeyPayload::Position(p),
        }
    }

    pub fn rotation(track_id: u16, time_ms: u16, r: UnitQuaternion<f32>) -> Self {
        AnimationKey {
            track_id,
            time_ms,
            payload: KeyPayload::Rotation(r),
        }
    }

    pub fn header(&self) -> AnimationKeyHeader {
        AnimationKeyHeader {
            is_rotation: matches!(self.payload, KeyPayload::Rotation(_)),
            track_id: self.track_id,
            time_ms: self.time_ms,
        }
    }
}

/// A clip's key stream, kept sorted by `(time, track_id)` per §8's ordering
/// invariant: `K[i].time <= K[i+1].time`, ties broken by the smaller
/// `track_id` first.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub total_time_secs: f32,
    pub num_tracks: u16,
    keys: Vec<AnimationKey>,
    /// Per-track subsequence of `keys`, in the same relative order, so a
    /// player can keep one monotonic cursor per track.
    per_track: Vec<Vec<AnimationKey>>,
    /// `track_id -> bone_id`, as the resource's `bone_ids` array.
    pub bone_of_track: Vec<u16>,
}

impl AnimationClip {
    /// Builds a clip from an arbitrarily-ordered key list, sorting it to
    /// satisfy the §8 ordering invariant.
    pub fn new(total_time_secs: f32, num_tracks: u16, keys: Vec<AnimationKey>, bone_of_track: Vec<u16>) -> Self {
        let keys = keys.into_iter().sorted_by_key(|k| (k.time_ms, k.track_id)).collect_vec();

        let mut per_track = vec![Vec::new(); num_tracks as usize];
        for key in &keys {
            if let Some(track) = per_track.get_mut(key.track_id as usize) {
                track.push(*key);
            }
        }

        AnimationClip {
            total_time_secs,
            num_tracks,
            keys,
            per_track,
            bone_of_track,
        }
    }

    pub fn keys(&self) -> &[AnimationKey] {
        &self.keys
    }

    pub fn track(&self, track_id: u16) -> &[AnimationKey] {
        self.per_track.get(track_id as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bone_for_track(&self, track_id: u16) -> Option<u16> {
        self.bone_of_track.get(track_id as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sorted_by_time_then_track() {
        let keys = vec![
            AnimationKey::position(1, 500, Vector3::zeros()),
            AnimationKey::position(0, 500, Vector3::zeros()),
            AnimationKey::position(0, 0, Vector3::zeros()),
        ];
        let clip = AnimationClip::new(1.0, 2, keys, vec![0, 1]);
        let times_and_tracks: Vec<_> = clip.keys().iter().map(|k| (k.time_ms, k.track_id)).collect();
        assert_eq!(times_and_tracks, vec![(0, 0), (500, 0), (500, 1)]);
    }
}
