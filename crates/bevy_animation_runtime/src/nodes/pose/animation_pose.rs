use std::sync::Arc;

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
    nodes::{FloatRange, GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

/// Samples a clip at a time read from a float value node, e.g. a lean or
/// aim pose driven by a parameter. Without a remap range the value is used
/// as a percentage through the clip.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AnimationPoseNode {
    pub data_slot: u16,
    pub time: NodeIndex,
    #[serde(default)]
    pub remap_range: Option<FloatRange>,
}

#[derive(Debug)]
struct AnimationPoseState {
    clip: Option<Arc<AnimationClip>>,
}

impl AnimationPoseNode {
    pub fn new(data_slot: u16, time: NodeIndex) -> Self {
        Self {
            data_slot,
            time,
            remap_range: None,
        }
    }

    pub fn with_remap_range(mut self, remap_range: FloatRange) -> Self {
        self.remap_range = Some(remap_range);
        self
    }

    fn percentage_through(&self, value: f32) -> f32 {
        match &self.remap_range {
            Some(range) => range.remap(value, &FloatRange::default()),
            None => value.clamp(0., 1.),
        }
    }
}

impl NodeLike for AnimationPoseNode {
    fn display_name(&self) -> String {
        "Animation Pose".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![(self.time, GraphValueType::Float)]
    }

    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        let clip = ctx.animation_clip(node, self.data_slot)?;
        ctx.set_state(node, AnimationPoseState { clip });
        Ok(())
    }
}

impl PoseNode for AnimationPoseNode {
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        _: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let Some(clip) = ctx.state::<AnimationPoseState>(node)?.clip.clone() else {
            return Ok(ctx.register_reference_pose(node));
        };

        let time = self.percentage_through(ctx.value(self.time)?);
        *ctx.pose_node_time_mut(node) = PoseNodeTime::at(time, clip.duration());

        let task_index =
            ctx.register_task(node, SampleTask::new(clip, self.data_slot, time), vec![]);
        Ok(GraphPoseNodeResult::new(
            task_index,
            ctx.sampled_events().empty_range(),
        ))
    }

    fn sync_track(&self, ctx: &GraphContext, node: NodeIndex) -> SyncTrack {
        ctx.state::<AnimationPoseState>(node)
            .ok()
            .and_then(|state| state.clip.as_ref())
            .map_or_else(SyncTrack::default, |clip| clip.sync_track().clone())
    }

    fn is_valid(&self, ctx: &GraphContext, node: NodeIndex) -> bool {
        ctx.state::<AnimationPoseState>(node)
            .is_ok_and(|state| state.clip.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_through() {
        let node = AnimationPoseNode::new(0, 0);
        assert_eq!(node.percentage_through(1.5), 1.);
        assert_eq!(node.percentage_through(0.25), 0.25);

        let node = node.with_remap_range(FloatRange::new(-45., 45.));
        assert_eq!(node.percentage_through(0.), 0.5);
        assert_eq!(node.percentage_through(-90.), 0.);
    }

    #[test]
    fn test_degenerate_remap_range_samples_start() {
        let node = AnimationPoseNode::new(0, 0).with_remap_range(FloatRange::new(2., 2.));
        assert_eq!(node.percentage_through(2.), 0.);
        assert_eq!(node.percentage_through(7.), 0.);
    }
}
