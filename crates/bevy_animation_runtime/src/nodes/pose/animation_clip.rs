use std::sync::Arc;

use bevy::transform::components::Transform;
use bevy_animation_runtime_core::{
    NodeIndex,
    animation_clip::AnimationClip,
    sync_track::{SyncTrack, SyncTrackTimeRange},
    task::SampleTask,
};
use serde::{Deserialize, Serialize};

use crate::{
    context::{GraphContext, InstantiationContext, PoseNodeTime},
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

/// Plays back the clip bound to a data slot.
///
/// The node's time is the playback position. When playing in reverse the
/// clip is sampled at `1 - time`, so toggling the direction mirrors the
/// playback position to keep the sampled pose continuous.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AnimationClipNode {
    pub data_slot: u16,
    #[serde(default)]
    pub allow_looping: bool,
    /// Bool value node switching to reverse playback.
    #[serde(default)]
    pub play_in_reverse: Option<NodeIndex>,
}

#[derive(Debug)]
struct AnimationClipState {
    clip: Option<Arc<AnimationClip>>,
    is_reversed: bool,
}

/// Positions in clip space, and whether playback wrapped around in between.
#[derive(Debug, Clone, Copy)]
struct ClipSpaceRange {
    from: f32,
    to: f32,
    looped: bool,
    reversed: bool,
}

impl AnimationClipNode {
    pub fn new(data_slot: u16, allow_looping: bool) -> Self {
        Self {
            data_slot,
            allow_looping,
            play_in_reverse: None,
        }
    }

    pub fn with_play_in_reverse(mut self, play_in_reverse: NodeIndex) -> Self {
        self.play_in_reverse = Some(play_in_reverse);
        self
    }

    fn is_reversed(&self, ctx: &mut GraphContext) -> GraphResult<bool> {
        match self.play_in_reverse {
            Some(input) => ctx.value(input),
            None => Ok(false),
        }
    }

    /// Advances the playback position, returning whether it wrapped.
    fn advance(
        &self,
        clip: &AnimationClip,
        time: &mut PoseNodeTime,
        delta_time: f32,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> bool {
        match sync_range {
            Some(range) => {
                let sync_track = clip.sync_track();
                time.previous_time = sync_track.get_percentage_through(range.start);
                time.current_time = sync_track.get_percentage_through(range.end);
                let wrapped = time.current_time < time.previous_time;
                if wrapped && !self.allow_looping {
                    time.current_time = 1.;
                    return false;
                }
                wrapped
            }
            None => {
                let step = if time.duration > 0. {
                    delta_time / time.duration
                } else {
                    0.
                };
                time.previous_time = time.current_time;
                let next = time.previous_time + step;

                if self.allow_looping {
                    time.current_time = next.rem_euclid(1.);
                    !(0. ..1.).contains(&next)
                } else {
                    time.previous_time = time.previous_time.clamp(0., 1.);
                    time.current_time = next.clamp(0., 1.);
                    false
                }
            }
        }
    }

    fn root_motion_delta(clip: &AnimationClip, range: ClipSpaceRange) -> Transform {
        match (range.looped, range.reversed) {
            (false, _) => clip.get_root_motion_delta_no_looping(range.from, range.to),
            (true, false) => clip.get_root_motion_delta(range.from, range.to),
            (true, true) => {
                let pre_loop = clip.get_root_motion_delta_no_looping(range.from, 0.);
                let post_loop = clip.get_root_motion_delta_no_looping(1., range.to);
                pre_loop * post_loop
            }
        }
    }

    fn sample_events(
        ctx: &mut GraphContext,
        node: NodeIndex,
        clip: &AnimationClip,
        range: ClipSpaceRange,
    ) {
        let mut samples = Vec::new();
        if range.looped {
            let (end, start) = if range.reversed { (0., 1.) } else { (1., 0.) };
            clip.get_events_for_range(range.from, end, &mut samples);
            clip.get_events_for_range(start, range.to, &mut samples);
        } else {
            clip.get_events_for_range(range.from, range.to, &mut samples);
        }

        for sample in samples {
            let event = clip.events()[sample.event_index].clone();
            ctx.emit_animation_event(node, event, sample.percentage_through);
        }
    }
}

impl NodeLike for AnimationClipNode {
    fn display_name(&self) -> String {
        "⏵ Animation Clip".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        self.play_in_reverse
            .map(|input| (input, GraphValueType::Bool))
            .into_iter()
            .collect()
    }

    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        let clip = ctx.animation_clip(node, self.data_slot)?;
        ctx.set_state(
            node,
            AnimationClipState {
                clip,
                is_reversed: false,
            },
        );
        Ok(())
    }
}

impl PoseNode for AnimationClipNode {
    fn initialize(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        initial_time: f32,
    ) -> GraphResult<()> {
        let is_reversed = self.is_reversed(ctx)?;
        let state = ctx.state_mut::<AnimationClipState>(node)?;
        state.is_reversed = is_reversed;
        let duration = state.clip.as_ref().map_or(0., |clip| clip.duration());
        *ctx.pose_node_time_mut(node) = PoseNodeTime::at(initial_time, duration);
        Ok(())
    }

    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let is_reversed = self.is_reversed(ctx)?;
        let state = ctx.state_mut::<AnimationClipState>(node)?;
        let Some(clip) = state.clip.clone() else {
            return Ok(ctx.register_reference_pose(node));
        };
        let toggled = state.is_reversed != is_reversed;
        state.is_reversed = is_reversed;

        let delta_time = ctx.delta_time();
        let time = ctx.pose_node_time_mut(node);
        time.duration = clip.duration();
        if toggled {
            time.current_time = 1. - time.current_time;
        }
        let looped = self.advance(&clip, time, delta_time, sync_range);

        let to_clip_space = |t: f32| if is_reversed { 1. - t } else { t };
        let range = ClipSpaceRange {
            from: to_clip_space(time.previous_time),
            to: to_clip_space(time.current_time),
            looped,
            reversed: is_reversed,
        };

        let events_start = ctx.sampled_events().len();
        Self::sample_events(ctx, node, &clip, range);
        let sampled_event_range = ctx.sampled_events().range_since(events_start);

        let root_motion_delta = Self::root_motion_delta(&clip, range);
        let task_index = ctx.register_task(
            node,
            SampleTask::new(clip, self.data_slot, range.to),
            vec![],
        );

        Ok(GraphPoseNodeResult::new(task_index, sampled_event_range)
            .with_root_motion_delta(root_motion_delta))
    }

    fn sync_track(&self, ctx: &GraphContext, node: NodeIndex) -> SyncTrack {
        ctx.state::<AnimationClipState>(node)
            .ok()
            .and_then(|state| state.clip.as_ref())
            .map_or_else(SyncTrack::default, |clip| clip.sync_track().clone())
    }

    fn is_valid(&self, ctx: &GraphContext, node: NodeIndex) -> bool {
        ctx.state::<AnimationClipState>(node)
            .is_ok_and(|state| state.clip.is_some())
    }
}

#[cfg(test)]
mod tests {
    use bevy_animation_runtime_core::sync_track::SyncTrackTime;

    use super::*;
    use crate::test_utils::{leg_skeleton, slide_clip};

    fn wrapping_range() -> SyncTrackTimeRange {
        SyncTrackTimeRange {
            start: SyncTrackTime::new(0, 0.8),
            end: SyncTrackTime::new(0, 0.2),
        }
    }

    #[test]
    fn test_synchronized_wrap_clamps_without_looping() {
        let clip = slide_clip(&leg_skeleton(), 2., 4.);
        let node = AnimationClipNode::new(0, false);
        let mut time = PoseNodeTime::at(0.5, 2.);

        let looped = node.advance(&clip, &mut time, 0.25, Some(&wrapping_range()));
        assert!(!looped);
        assert_eq!(time.previous_time, 0.8);
        assert_eq!(time.current_time, 1.);
    }

    #[test]
    fn test_synchronized_wrap_loops_when_allowed() {
        let clip = slide_clip(&leg_skeleton(), 2., 4.);
        let node = AnimationClipNode::new(0, true);
        let mut time = PoseNodeTime::at(0.5, 2.);

        let looped = node.advance(&clip, &mut time, 0.25, Some(&wrapping_range()));
        assert!(looped);
        assert_eq!(time.previous_time, 0.8);
        assert_eq!(time.current_time, 0.2);
    }
}
