mod node_states;

pub use node_states::*;

use std::{any::Any, sync::Arc};

use bevy::{log::warn, transform::components::Transform};
use bevy_animation_runtime_core::{
    NodeIndex,
    animation_clip::{AnimationClip, AnimationEvent},
    pose::PoseType,
    pose_pool::{CachedPoseId, PoseBufferPool},
    sampled_events::{SampledEventRange, SampledEventsBuffer},
    skeleton::{BoneIndex, Skeleton},
    sync_track::{SyncTrack, SyncTrackTimeRange},
    task::{DefaultPoseTask, Task, TaskIndex, TaskKind, TaskSystem},
};

use crate::{
    config::RuntimeConfig,
    definition::{GraphDataSet, GraphDefinition},
    errors::{GraphError, GraphResult},
    graph_instance::GraphInstance,
    nodes::GraphPoseNodeResult,
    value::{GraphValue, GraphValueKind},
};

/// Whether the nodes being updated contribute to the final pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BranchState {
    #[default]
    Active,
    /// Updated to keep time and events flowing, but blended out.
    Inactive,
}

/// Result of relaying a child graph through an external graph node.
#[derive(Debug)]
pub struct ExternalGraphUpdate {
    pub tasks: Vec<Task>,
    pub sampled_event_range: SampledEventRange,
    pub root_motion_delta: Transform,
    pub time: PoseNodeTime,
}

/// Everything a node can read or write while the graph is being evaluated.
pub struct GraphContext<'a> {
    pub(crate) definition: &'a GraphDefinition,
    pub(crate) data_set: &'a GraphDataSet,
    pub(crate) config: &'a RuntimeConfig,
    pub(crate) node_states: &'a mut NodeStates,
    pub(crate) control_parameters: &'a [GraphValue],
    pub(crate) task_system: &'a mut TaskSystem,
    pub(crate) sampled_events: &'a mut SampledEventsBuffer,
    pub(crate) external_graphs: &'a mut [Option<Box<GraphInstance>>],
    pub(crate) physics_world: Option<&'a dyn Any>,
    pub(crate) update_id: u64,
    pub(crate) delta_time: f32,
    pub(crate) world_transform: Transform,
    pub(crate) branch_state: BranchState,
}

impl<'a> GraphContext<'a> {
    pub fn definition(&self) -> &'a GraphDefinition {
        self.definition
    }

    pub fn data_set(&self) -> &'a GraphDataSet {
        self.data_set
    }

    pub fn config(&self) -> &'a RuntimeConfig {
        self.config
    }

    pub fn update_id(&self) -> u64 {
        self.update_id
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn world_transform(&self) -> Transform {
        self.world_transform
    }

    /// The physics world of the owning character. Only passed through.
    pub fn physics_world(&self) -> Option<&'a dyn Any> {
        self.physics_world
    }

    pub fn branch_state(&self) -> BranchState {
        self.branch_state
    }

    pub fn is_in_inactive_branch(&self) -> bool {
        self.branch_state == BranchState::Inactive
    }

    /// Runs `f` in the given branch state. Once inactive, nested branches
    /// stay inactive.
    pub fn with_branch_state<R>(
        &mut self,
        state: BranchState,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = self.branch_state;
        if state == BranchState::Inactive {
            self.branch_state = BranchState::Inactive;
        }
        let result = f(self);
        self.branch_state = previous;
        result
    }

    /// Runs `f` with a different delta time.
    pub fn with_delta_time<R>(&mut self, delta_time: f32, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.delta_time;
        self.delta_time = delta_time;
        let result = f(self);
        self.delta_time = previous;
        result
    }

    pub fn control_parameter(&self, name: &str) -> GraphResult<&GraphValue> {
        self.definition
            .control_parameter_index(name)
            .and_then(|index| self.control_parameters.get(index))
            .ok_or_else(|| GraphError::UnknownControlParameter(name.to_string()))
    }

    /// Value of a value node, computed at most once per update.
    pub fn graph_value(&mut self, node: NodeIndex) -> GraphResult<GraphValue> {
        if let Some(value) = self.node_states.cached_value(node, self.update_id) {
            return Ok(value.clone());
        }
        let definition = self.definition;
        let value = definition.value_node(node)?.value(self, node)?;
        self.node_states
            .set_cached_value(node, self.update_id, value.clone());
        Ok(value)
    }

    pub fn value<T: GraphValueKind>(&mut self, node: NodeIndex) -> GraphResult<T> {
        T::from_value(self.graph_value(node)?)
    }

    pub fn was_value_updated(&self, node: NodeIndex) -> bool {
        self.node_states.was_value_updated(node, self.update_id)
    }

    pub fn update_pose_node(&mut self, node: NodeIndex) -> GraphResult<GraphPoseNodeResult> {
        self.update_pose_node_internal(node, None)
    }

    pub fn update_pose_node_synchronized(
        &mut self,
        node: NodeIndex,
        sync_range: &SyncTrackTimeRange,
    ) -> GraphResult<GraphPoseNodeResult> {
        self.update_pose_node_internal(node, Some(sync_range))
    }

    fn update_pose_node_internal(
        &mut self,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let definition = self.definition;
        let pose_node = definition.pose_node(node)?;
        if !self.node_states.is_initialized(node) {
            self.initialize_pose_node(node, 0.)?;
        }
        self.node_states.mark_active(node, self.update_id);
        pose_node.update(self, node, sync_range)
    }

    pub fn initialize_pose_node(&mut self, node: NodeIndex, initial_time: f32) -> GraphResult<()> {
        let definition = self.definition;
        definition
            .pose_node(node)?
            .initialize(self, node, initial_time)?;
        self.node_states.set_initialized(node, true);
        Ok(())
    }

    /// Sets both times of a pose node to `time`, keeping its duration.
    pub fn reset_pose_node_time(&mut self, node: NodeIndex, time: f32) {
        let pose_time = self.node_states.time_mut(node);
        *pose_time = PoseNodeTime::at(time, pose_time.duration);
    }

    pub fn pose_node_time(&self, node: NodeIndex) -> PoseNodeTime {
        self.node_states.time(node)
    }

    pub fn pose_node_time_mut(&mut self, node: NodeIndex) -> &mut PoseNodeTime {
        self.node_states.time_mut(node)
    }

    pub fn sync_track(&self, node: NodeIndex) -> SyncTrack {
        match self.definition.pose_node(node) {
            Ok(pose_node) => pose_node.sync_track(self, node),
            Err(_) => SyncTrack::default(),
        }
    }

    pub fn is_pose_node_valid(&self, node: NodeIndex) -> bool {
        self.definition
            .pose_node(node)
            .is_ok_and(|pose_node| pose_node.is_valid(self, node))
    }

    pub fn state<T: Any + Send + Sync>(&self, node: NodeIndex) -> GraphResult<&T> {
        self.node_states.state(node)
    }

    pub fn state_mut<T: Any + Send + Sync>(&mut self, node: NodeIndex) -> GraphResult<&mut T> {
        self.node_states.state_mut(node)
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        self.task_system.pool().skeleton()
    }

    pub fn pool_mut(&mut self) -> &mut PoseBufferPool {
        self.task_system.pool_mut()
    }

    pub fn register_task(
        &mut self,
        node: NodeIndex,
        kind: impl Into<TaskKind>,
        dependencies: Vec<TaskIndex>,
    ) -> TaskIndex {
        self.task_system
            .register_task(Task::new(node, kind, dependencies))
    }

    /// Registers a reference pose task, for nodes without anything to sample.
    pub fn register_reference_pose(&mut self, node: NodeIndex) -> GraphPoseNodeResult {
        let task_index =
            self.register_task(node, DefaultPoseTask::new(PoseType::ReferencePose), vec![]);
        GraphPoseNodeResult::new(task_index, self.sampled_events.empty_range())
    }

    pub fn sampled_events(&self) -> &SampledEventsBuffer {
        &*self.sampled_events
    }

    pub fn sampled_events_mut(&mut self) -> &mut SampledEventsBuffer {
        &mut *self.sampled_events
    }

    pub fn emit_animation_event(
        &mut self,
        node: NodeIndex,
        event: AnimationEvent,
        percentage_through: f32,
    ) -> usize {
        let inactive = self.is_in_inactive_branch();
        self.sampled_events
            .emit_animation_event(node, event, percentage_through, inactive)
    }

    pub fn emit_state_event(&mut self, node: NodeIndex, id: impl Into<String>) -> usize {
        let inactive = self.is_in_inactive_branch();
        self.sampled_events.emit_state_event(node, id, inactive)
    }

    pub fn has_external_graph(&self, slot: usize) -> bool {
        matches!(self.external_graphs.get(slot), Some(Some(_)))
    }

    /// Updates the child graph attached to `slot` and moves its tasks and
    /// events into this graph. Events are re-attributed to `node`.
    pub fn update_external_graph(
        &mut self,
        node: NodeIndex,
        slot: usize,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<Option<ExternalGraphUpdate>> {
        let Some(Some(child)) = self.external_graphs.get_mut(slot) else {
            return Ok(None);
        };

        let child_result = child.update_as_child(
            self.delta_time,
            self.world_transform,
            self.physics_world,
            sync_range,
        )?;
        let tasks = child.take_tasks();
        let sampled_event_range = self
            .sampled_events
            .append(child.sampled_events(), Some(node));
        if self.branch_state == BranchState::Inactive {
            self.sampled_events
                .mark_as_from_inactive_branch(sampled_event_range);
        }

        Ok(Some(ExternalGraphUpdate {
            tasks,
            sampled_event_range,
            root_motion_delta: child_result.root_motion_delta,
            time: child_result.time,
        }))
    }
}

/// Context for binding nodes to resources when a graph instance is created.
pub struct InstantiationContext<'a> {
    pub(crate) definition: &'a GraphDefinition,
    pub(crate) data_set: &'a GraphDataSet,
    pub(crate) config: &'a RuntimeConfig,
    pub(crate) pool: &'a mut PoseBufferPool,
    pub(crate) node_states: &'a mut NodeStates,
}

impl InstantiationContext<'_> {
    pub fn definition(&self) -> &GraphDefinition {
        self.definition
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        self.data_set.skeleton()
    }

    /// Clip bound to `slot`. A missing clip is not an error, the node is
    /// simply invalid.
    pub fn animation_clip(
        &self,
        node: NodeIndex,
        slot: u16,
    ) -> GraphResult<Option<Arc<AnimationClip>>> {
        let Some(clip) = self.data_set.animation_clip(slot) else {
            if self.config.warn_on_missing_resources {
                warn!("Node {node} has no animation clip bound to data slot {slot}");
            }
            return Ok(None);
        };

        let skeleton = self.skeleton();
        if clip.skeleton().name() != skeleton.name()
            || clip.skeleton().num_bones() != skeleton.num_bones()
        {
            return Err(GraphError::SkeletonMismatch {
                expected: skeleton.name().to_string(),
                found: clip.skeleton().name().to_string(),
            });
        }
        Ok(Some(clip.clone()))
    }

    pub fn bone_index(&self, name: &str) -> GraphResult<BoneIndex> {
        self.skeleton()
            .bone_index(name)
            .ok_or_else(|| GraphError::UnknownBone(name.to_string()))
    }

    pub fn bone_mask_index(&self, id: &str) -> GraphResult<usize> {
        self.skeleton()
            .bone_mask_index(id)
            .ok_or_else(|| GraphError::UnknownBoneMask(id.to_string()))
    }

    pub fn external_graph_slot_index(&self, name: &str) -> GraphResult<usize> {
        self.definition
            .external_graph_slot_index(name)
            .ok_or_else(|| GraphError::UnknownExternalGraphSlot(name.to_string()))
    }

    pub fn create_cached_pose(&mut self) -> CachedPoseId {
        self.pool.create_cached_pose_buffer()
    }

    pub fn set_state<T: Any + Send + Sync>(&mut self, node: NodeIndex, state: T) {
        self.node_states.set_state(node, state);
    }
}
