use std::sync::Arc;

use bevy::{reflect::Reflect, transform::components::Transform};
use serde::{Deserialize, Serialize};

use crate::{
    errors::AnimationClipError,
    interpolation::linear::InterpolateLinear,
    pose::Pose,
    skeleton::{BoneIndex, Skeleton},
    space_conversion::TransformSpaceExt,
    sync_track::SyncTrack,
};

/// An event authored on a clip's timeline, in percentages through the clip.
#[derive(Clone, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct AnimationEvent {
    pub id: String,
    pub start: f32,
    /// Zero for immediate events.
    #[serde(default)]
    pub duration: f32,
}

impl AnimationEvent {
    pub fn immediate(id: impl Into<String>, start: f32) -> Self {
        Self {
            id: id.into(),
            start,
            duration: 0.,
        }
    }

    pub fn durable(id: impl Into<String>, start: f32, duration: f32) -> Self {
        Self {
            id: id.into(),
            start,
            duration,
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.duration <= 0.
    }

    pub fn end(&self) -> f32 {
        self.start + self.duration
    }
}

/// An event found while sampling a range of a clip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipEventSample {
    pub event_index: usize,
    pub percentage_through: f32,
}

/// Sampled skeletal animation: evenly spaced frames of local bone transforms
/// plus a character-space root motion track.
#[derive(Debug)]
pub struct AnimationClip {
    name: String,
    skeleton: Arc<Skeleton>,
    duration: f32,
    frames: Vec<Vec<Transform>>,
    root_motion: Vec<Transform>,
    events: Vec<AnimationEvent>,
    sync_track: SyncTrack,
    is_additive: bool,
}

impl AnimationClip {
    pub fn new(
        name: impl Into<String>,
        skeleton: Arc<Skeleton>,
        duration: f32,
        frames: Vec<Vec<Transform>>,
    ) -> Result<Self, AnimationClipError> {
        if frames.is_empty() {
            return Err(AnimationClipError::NoFrames);
        }
        if !(duration.is_finite() && duration > 0.) {
            return Err(AnimationClipError::InvalidDuration(duration));
        }
        if let Some((frame, transforms)) = frames
            .iter()
            .enumerate()
            .find(|(_, t)| t.len() != skeleton.num_bones())
        {
            return Err(AnimationClipError::BoneCountMismatch {
                frame,
                expected: skeleton.num_bones(),
                found: transforms.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            root_motion: vec![Transform::IDENTITY; frames.len()],
            skeleton,
            duration,
            frames,
            events: Vec::new(),
            sync_track: SyncTrack::default(),
            is_additive: false,
        })
    }

    pub fn with_root_motion(
        mut self,
        root_motion: Vec<Transform>,
    ) -> Result<Self, AnimationClipError> {
        if root_motion.len() != self.frames.len() {
            return Err(AnimationClipError::RootMotionFrameMismatch {
                expected: self.frames.len(),
                found: root_motion.len(),
            });
        }
        self.root_motion = root_motion;
        Ok(self)
    }

    pub fn with_events(
        mut self,
        mut events: Vec<AnimationEvent>,
    ) -> Result<Self, AnimationClipError> {
        if let Some(event) = events
            .iter()
            .find(|e| e.start < 0. || e.end() > 1. || e.duration < 0.)
        {
            return Err(AnimationClipError::EventOutOfRange(event.id.clone()));
        }
        events.sort_by(|a, b| a.start.total_cmp(&b.start));
        self.events = events;
        Ok(self)
    }

    pub fn with_sync_track(mut self, sync_track: SyncTrack) -> Self {
        self.sync_track = sync_track;
        self
    }

    pub fn with_additive(mut self, is_additive: bool) -> Self {
        self.is_additive = is_additive;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn events(&self) -> &[AnimationEvent] {
        &self.events
    }

    pub fn sync_track(&self) -> &SyncTrack {
        &self.sync_track
    }

    pub fn is_additive(&self) -> bool {
        self.is_additive
    }

    /// Frame index and interpolation factor towards the next frame.
    fn frame_time(&self, percentage: f32) -> (usize, f32) {
        let last = self.frames.len() - 1;
        if last == 0 {
            return (0, 0.);
        }
        let position = percentage.clamp(0., 1.) * last as f32;
        let frame = (position.floor() as usize).min(last - 1);
        (frame, position - frame as f32)
    }

    pub fn get_local_transform(&self, bone: BoneIndex, percentage: f32) -> Transform {
        let (frame, t) = self.frame_time(percentage);
        let current = &self.frames[frame][bone];
        match self.frames.get(frame + 1) {
            Some(next) => current.interpolate_linear(&next[bone], t),
            None => *current,
        }
    }

    pub fn get_pose(&self, percentage: f32, pose: &mut Pose) {
        assert_eq!(
            pose.num_bones(),
            self.skeleton.num_bones(),
            "clip {:?} sampled into a pose of a different skeleton",
            self.name
        );
        let (frame, t) = self.frame_time(percentage);
        let current = &self.frames[frame];
        match self.frames.get(frame + 1) {
            Some(next) => pose.set_transforms(
                current
                    .iter()
                    .zip(next)
                    .map(|(a, b)| a.interpolate_linear(b, t)),
                self.is_additive,
            ),
            None => pose.set_transforms(current.iter().copied(), self.is_additive),
        }
    }

    pub fn get_root_transform(&self, percentage: f32) -> Transform {
        let (frame, t) = self.frame_time(percentage);
        let current = &self.root_motion[frame];
        match self.root_motion.get(frame + 1) {
            Some(next) => current.interpolate_linear(next, t),
            None => *current,
        }
    }

    /// Root motion between two points of the clip, moving forward in time and
    /// wrapping past the end when `to < from`.
    pub fn get_root_motion_delta(&self, from: f32, to: f32) -> Transform {
        if to >= from {
            self.get_root_motion_delta_no_looping(from, to)
        } else {
            let pre_loop = self.get_root_motion_delta_no_looping(from, 1.);
            let post_loop = self.get_root_motion_delta_no_looping(0., to);
            pre_loop * post_loop
        }
    }

    /// Root motion between two points of the clip, never wrapping. `to` may
    /// precede `from` when playing in reverse.
    pub fn get_root_motion_delta_no_looping(&self, from: f32, to: f32) -> Transform {
        self.get_root_transform(from)
            .delta_to(&self.get_root_transform(to))
    }

    /// Collects the events overlapping the range between `from` and `to`
    /// without wrapping. When `to < from` the range is read in reverse, and
    /// the percentage through durable events is measured at `to`.
    ///
    /// Immediate events have no extent, so they always report a percentage
    /// through of 1 once crossed, in either direction.
    pub fn get_events_for_range(&self, from: f32, to: f32, out: &mut Vec<ClipEventSample>) {
        let (low, high) = if from <= to { (from, to) } else { (to, from) };
        let reaches_end = high >= 1.;

        for (event_index, event) in self.events.iter().enumerate() {
            if event.is_immediate() {
                // Markers sitting exactly on the clip end fire once the end is reached.
                let inside = event.start >= low
                    && (event.start < high || (reaches_end && event.start <= high));
                if inside && low != high {
                    out.push(ClipEventSample {
                        event_index,
                        percentage_through: 1.,
                    });
                }
            } else if event.start < high && event.end() > low {
                out.push(ClipEventSample {
                    event_index,
                    percentage_through: ((to - event.start) / event.duration).clamp(0., 1.),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::{Quat, Vec3};

    use super::*;
    use crate::{pose::PoseType, skeleton::BoneDefinition};

    fn skeleton() -> Arc<Skeleton> {
        Arc::new(
            Skeleton::new(
                "pair",
                vec![
                    BoneDefinition::new("root", None, Transform::IDENTITY),
                    BoneDefinition::new("child", Some(0), Transform::from_xyz(0., 1., 0.)),
                ],
            )
            .unwrap(),
        )
    }

    fn walk_clip() -> AnimationClip {
        let frames = (0..5)
            .map(|i| {
                vec![
                    Transform::from_xyz(i as f32, 0., 0.),
                    Transform::from_xyz(0., 1., 0.),
                ]
            })
            .collect();
        let root_motion = (0..5)
            .map(|i| {
                Transform::from_xyz(0., 0., i as f32 * 0.5)
                    .with_rotation(Quat::from_rotation_y(i as f32 * 0.1))
            })
            .collect();
        AnimationClip::new("walk", skeleton(), 2., frames)
            .unwrap()
            .with_root_motion(root_motion)
            .unwrap()
            .with_events(vec![
                AnimationEvent::immediate("footstep_l", 0.25),
                AnimationEvent::immediate("footstep_r", 0.75),
                AnimationEvent::durable("swing", 0.4, 0.2),
            ])
            .unwrap()
    }

    #[test]
    fn test_rejects_bad_frames() {
        let result = AnimationClip::new("bad", skeleton(), 1., vec![vec![Transform::IDENTITY]]);
        assert_eq!(
            result.unwrap_err(),
            AnimationClipError::BoneCountMismatch {
                frame: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_get_pose_interpolates() {
        let clip = walk_clip();
        let mut pose = Pose::new(clip.skeleton().clone(), PoseType::ReferencePose);
        clip.get_pose(0.125, &mut pose);

        assert!(pose.transform(0).translation.abs_diff_eq(Vec3::new(0.5, 0., 0.), 1e-5));
        assert!(pose.is_pose_set());
        assert!(!pose.is_additive());
    }

    #[test]
    fn test_root_motion_composes_per_frame_deltas() {
        let clip = walk_clip();
        let whole = clip.get_root_motion_delta_no_looping(0., 1.);

        let mut composed = Transform::IDENTITY;
        for i in 0..4 {
            let from = i as f32 / 4.;
            let to = (i + 1) as f32 / 4.;
            composed = composed * clip.get_root_motion_delta_no_looping(from, to);
        }

        assert!(composed.translation.abs_diff_eq(whole.translation, 1e-4));
        assert!(composed.rotation.abs_diff_eq(whole.rotation, 1e-4));
    }

    #[test]
    fn test_looping_root_motion() {
        let clip = walk_clip();
        let looped = clip.get_root_motion_delta(0.75, 0.25);
        let expected = clip.get_root_motion_delta_no_looping(0.75, 1.)
            * clip.get_root_motion_delta_no_looping(0., 0.25);
        assert!(looped.translation.abs_diff_eq(expected.translation, 1e-5));
    }

    #[test]
    fn test_events_for_range() {
        let clip = walk_clip();
        let mut events = Vec::new();

        clip.get_events_for_range(0.2, 0.5, &mut events);
        let ids: Vec<_> = events.iter().map(|e| clip.events()[e.event_index].id.as_str()).collect();
        assert_eq!(ids, ["footstep_l", "swing"]);
        assert!((events[1].percentage_through - 0.5).abs() < 1e-5);

        events.clear();
        clip.get_events_for_range(0.5, 0.5, &mut events);
        assert_eq!(events.len(), 1, "only the durable event covers an empty range");
    }

    #[test]
    fn test_reverse_events_for_range() {
        let clip = walk_clip();
        let mut events = Vec::new();
        clip.get_events_for_range(0.8, 0.5, &mut events);

        let ids: Vec<_> = events.iter().map(|e| clip.events()[e.event_index].id.as_str()).collect();
        assert_eq!(ids, ["swing", "footstep_r"]);
        assert!((events[0].percentage_through - 0.5).abs() < 1e-5);
        assert_eq!(events[1].percentage_through, 1.);
    }
}
