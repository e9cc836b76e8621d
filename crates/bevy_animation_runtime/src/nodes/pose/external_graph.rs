use bevy_animation_runtime_core::{
    NodeIndex,
    sync_track::SyncTrackTimeRange,
    task::ExternalGraphTask,
};
use serde::{Deserialize, Serialize};

use crate::{
    context::{GraphContext, InstantiationContext},
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

/// Relays the pose, events and root motion of a child graph instance
/// attached to a named slot. With nothing attached it produces the
/// reference pose.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalGraphNode {
    pub slot: String,
}

#[derive(Debug)]
struct ExternalGraphState {
    slot_index: usize,
}

impl ExternalGraphNode {
    pub fn new(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }
}

impl NodeLike for ExternalGraphNode {
    fn display_name(&self) -> String {
        format!("🖧 {}", self.slot)
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        let slot_index = ctx.external_graph_slot_index(&self.slot)?;
        ctx.set_state(node, ExternalGraphState { slot_index });
        Ok(())
    }
}

impl PoseNode for ExternalGraphNode {
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let slot_index = ctx.state::<ExternalGraphState>(node)?.slot_index;
        let Some(update) = ctx.update_external_graph(node, slot_index, sync_range)? else {
            ctx.reset_pose_node_time(node, 0.);
            return Ok(ctx.register_reference_pose(node));
        };

        *ctx.pose_node_time_mut(node) = update.time;
        let task_index = ctx.register_task(
            node,
            ExternalGraphTask::new(slot_index as u16, update.tasks),
            vec![],
        );
        Ok(GraphPoseNodeResult::new(task_index, update.sampled_event_range)
            .with_root_motion_delta(update.root_motion_delta))
    }

    fn is_valid(&self, ctx: &GraphContext, node: NodeIndex) -> bool {
        ctx.state::<ExternalGraphState>(node)
            .is_ok_and(|state| ctx.has_external_graph(state.slot_index))
    }
}
