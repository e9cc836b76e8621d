use bevy_animation_runtime_core::{
    NodeIndex,
    pose_pool::CachedPoseId,
    sync_track::{SyncTrack, SyncTrackTimeRange},
    task::{CachedPoseReadTask, CachedPoseWriteTask},
};
use serde::{Deserialize, Serialize};

use crate::{
    context::{GraphContext, InstantiationContext},
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

/// Stores its input in a cached pose buffer every update. While `hold` is
/// true the input is no longer updated and the stored pose is read back
/// instead, freezing the pose across frames.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CachedPoseNode {
    pub input: NodeIndex,
    /// Bool value node.
    #[serde(default)]
    pub hold: Option<NodeIndex>,
}

#[derive(Debug)]
struct CachedPoseState {
    id: CachedPoseId,
    is_written: bool,
}

impl CachedPoseNode {
    pub fn new(input: NodeIndex, hold: Option<NodeIndex>) -> Self {
        Self { input, hold }
    }
}

impl NodeLike for CachedPoseNode {
    fn display_name(&self) -> String {
        "Cached Pose".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        let mut inputs = vec![(self.input, GraphValueType::Pose)];
        if let Some(hold) = self.hold {
            inputs.push((hold, GraphValueType::Bool));
        }
        inputs
    }

    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        let id = ctx.create_cached_pose();
        ctx.set_state(
            node,
            CachedPoseState {
                id,
                is_written: false,
            },
        );
        Ok(())
    }
}

impl PoseNode for CachedPoseNode {
    fn initialize(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        initial_time: f32,
    ) -> GraphResult<()> {
        // A stale pose must not be read back, so swap in a fresh buffer.
        let state = ctx.state::<CachedPoseState>(node)?;
        if state.is_written {
            let stale = state.id;
            let pool = ctx.pool_mut();
            pool.destroy_cached_pose_buffer(stale);
            let id = pool.create_cached_pose_buffer();
            let state = ctx.state_mut::<CachedPoseState>(node)?;
            state.id = id;
            state.is_written = false;
        }

        ctx.reset_pose_node_time(node, initial_time);
        ctx.initialize_pose_node(self.input, initial_time)
    }

    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let hold = match self.hold {
            Some(hold) => ctx.value::<bool>(hold)?,
            None => false,
        };
        let state = ctx.state::<CachedPoseState>(node)?;
        let id = state.id;

        if hold && state.is_written {
            let task_index = ctx.register_task(node, CachedPoseReadTask::new(id), vec![]);
            let time = ctx.pose_node_time_mut(node);
            time.previous_time = time.current_time;
            return Ok(GraphPoseNodeResult::new(
                task_index,
                ctx.sampled_events().empty_range(),
            ));
        }

        let result = match sync_range {
            Some(range) => ctx.update_pose_node_synchronized(self.input, range)?,
            None => ctx.update_pose_node(self.input)?,
        };
        *ctx.pose_node_time_mut(node) = ctx.pose_node_time(self.input);
        ctx.state_mut::<CachedPoseState>(node)?.is_written = true;

        let task_index =
            ctx.register_task(node, CachedPoseWriteTask::new(id), vec![result.task_index]);
        Ok(GraphPoseNodeResult {
            task_index,
            ..result
        })
    }

    fn sync_track(&self, ctx: &GraphContext, _: NodeIndex) -> SyncTrack {
        ctx.sync_track(self.input)
    }
}
