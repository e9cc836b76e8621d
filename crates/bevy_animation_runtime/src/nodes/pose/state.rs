use bevy_animation_runtime_core::{
    NodeIndex,
    sync_track::{SyncTrack, SyncTrackTimeRange},
};
use serde::{Deserialize, Serialize};

use crate::{
    context::{GraphContext, InstantiationContext},
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

/// Wraps the pose of a state and emits its state events.
///
/// Entry events are emitted on the first update after the node is
/// initialized; execute events on every update.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StateNode {
    pub input: NodeIndex,
    pub id: String,
    #[serde(default)]
    pub entry_events: Vec<String>,
    #[serde(default)]
    pub execute_events: Vec<String>,
}

#[derive(Debug, Default)]
struct StateNodeState {
    entered: bool,
}

impl StateNode {
    pub fn new(input: NodeIndex, id: impl Into<String>) -> Self {
        Self {
            input,
            id: id.into(),
            entry_events: Vec::new(),
            execute_events: Vec::new(),
        }
    }

    pub fn with_entry_event(mut self, id: impl Into<String>) -> Self {
        self.entry_events.push(id.into());
        self
    }

    pub fn with_execute_event(mut self, id: impl Into<String>) -> Self {
        self.execute_events.push(id.into());
        self
    }
}

impl NodeLike for StateNode {
    fn display_name(&self) -> String {
        format!("State {}", self.id)
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![(self.input, GraphValueType::Pose)]
    }

    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        ctx.set_state(node, StateNodeState::default());
        Ok(())
    }
}

impl PoseNode for StateNode {
    fn initialize(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        initial_time: f32,
    ) -> GraphResult<()> {
        ctx.state_mut::<StateNodeState>(node)?.entered = false;
        ctx.reset_pose_node_time(node, initial_time);
        ctx.initialize_pose_node(self.input, initial_time)
    }

    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let events_start = ctx.sampled_events().len();

        let state = ctx.state_mut::<StateNodeState>(node)?;
        let entering = !state.entered;
        state.entered = true;
        if entering {
            for id in &self.entry_events {
                ctx.emit_state_event(node, id.as_str());
            }
        }
        for id in &self.execute_events {
            ctx.emit_state_event(node, id.as_str());
        }

        let result = match sync_range {
            Some(range) => ctx.update_pose_node_synchronized(self.input, range)?,
            None => ctx.update_pose_node(self.input)?,
        };
        *ctx.pose_node_time_mut(node) = ctx.pose_node_time(self.input);

        Ok(GraphPoseNodeResult {
            sampled_event_range: ctx.sampled_events().range_since(events_start),
            ..result
        })
    }

    fn sync_track(&self, ctx: &GraphContext, _: NodeIndex) -> SyncTrack {
        ctx.sync_track(self.input)
    }
}
