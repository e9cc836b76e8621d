use bevy_animation_runtime_core::{
    NodeIndex,
    skeleton::BoneIndex,
    sync_track::{SyncTrack, SyncTrackTimeRange},
    task::TwoBoneIkTask,
};
use serde::{Deserialize, Serialize};

use crate::{
    context::{GraphContext, InstantiationContext},
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::{GraphValueType, Target},
};

/// Bends the two bones above `effector_bone` so it reaches a world space
/// target. The solve runs after physics.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TwoBoneIkNode {
    pub input: NodeIndex,
    pub effector_bone: String,
    /// Target value node.
    pub target: NodeIndex,
}

#[derive(Debug)]
struct TwoBoneIkState {
    effector: BoneIndex,
}

impl TwoBoneIkNode {
    pub fn new(input: NodeIndex, effector_bone: impl Into<String>, target: NodeIndex) -> Self {
        Self {
            input,
            effector_bone: effector_bone.into(),
            target,
        }
    }
}

impl NodeLike for TwoBoneIkNode {
    fn display_name(&self) -> String {
        "Two Bone IK".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![
            (self.input, GraphValueType::Pose),
            (self.target, GraphValueType::Target),
        ]
    }

    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        let effector = ctx.bone_index(&self.effector_bone)?;
        ctx.set_state(node, TwoBoneIkState { effector });
        Ok(())
    }
}

impl PoseNode for TwoBoneIkNode {
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let result = match sync_range {
            Some(range) => ctx.update_pose_node_synchronized(self.input, range)?,
            None => ctx.update_pose_node(self.input)?,
        };
        *ctx.pose_node_time_mut(node) = ctx.pose_node_time(self.input);

        let target: Target = ctx.value(self.target)?;
        let effector = ctx.state::<TwoBoneIkState>(node)?.effector;
        let task_index = ctx.register_task(
            node,
            TwoBoneIkTask::new(effector, Some(target.position())),
            vec![result.task_index],
        );

        Ok(GraphPoseNodeResult {
            task_index,
            ..result
        })
    }

    fn sync_track(&self, ctx: &GraphContext, _: NodeIndex) -> SyncTrack {
        ctx.sync_track(self.input)
    }
}
