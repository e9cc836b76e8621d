use bevy_animation_runtime_core::{
    NodeIndex,
    pose::PoseType,
    sync_track::SyncTrackTimeRange,
    task::DefaultPoseTask,
};
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DefaultPoseNode {
    #[serde(default)]
    pub pose_type: PoseType,
}

impl DefaultPoseNode {
    pub fn zero_pose() -> Self {
        Self {
            pose_type: PoseType::ZeroPose,
        }
    }
}

impl NodeLike for DefaultPoseNode {
    fn display_name(&self) -> String {
        match self.pose_type {
            PoseType::ReferencePose => "Reference Pose".into(),
            PoseType::ZeroPose => "Zero Pose".into(),
        }
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }
}

impl PoseNode for DefaultPoseNode {
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        _: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let task_index = ctx.register_task(node, DefaultPoseTask::new(self.pose_type), vec![]);
        Ok(GraphPoseNodeResult::new(
            task_index,
            ctx.sampled_events().empty_range(),
        ))
    }
}
