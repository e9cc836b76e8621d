use bevy::log::warn;
use bevy_animation_runtime_core::{
    NodeIndex,
    sync_track::{SyncTrack, SyncTrackTimeRange},
};
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

/// Scales the delta time seen by its input. Registers no task of its own.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SpeedScaleNode {
    pub input: NodeIndex,
    /// Float value node.
    pub multiplier: NodeIndex,
}

impl SpeedScaleNode {
    pub fn new(input: NodeIndex, multiplier: NodeIndex) -> Self {
        Self { input, multiplier }
    }
}

impl NodeLike for SpeedScaleNode {
    fn display_name(&self) -> String {
        "Speed".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![
            (self.input, GraphValueType::Pose),
            (self.multiplier, GraphValueType::Float),
        ]
    }
}

impl PoseNode for SpeedScaleNode {
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let mut multiplier: f32 = ctx.value(self.multiplier)?;
        if multiplier < 0. {
            warn!("Node {node} has negative speed multiplier {multiplier}, clamping to 0");
            multiplier = 0.;
        }

        let delta_time = ctx.delta_time() * multiplier;
        let result = ctx.with_delta_time(delta_time, |ctx| match sync_range {
            Some(range) => ctx.update_pose_node_synchronized(self.input, range),
            None => ctx.update_pose_node(self.input),
        })?;

        let mut time = ctx.pose_node_time(self.input);
        if multiplier > 0. {
            time.duration /= multiplier;
        }
        *ctx.pose_node_time_mut(node) = time;
        Ok(result)
    }

    fn sync_track(&self, ctx: &GraphContext, _: NodeIndex) -> SyncTrack {
        ctx.sync_track(self.input)
    }
}
