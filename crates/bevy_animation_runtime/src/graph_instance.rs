use std::{any::Any, sync::Arc};

use bevy::{log::debug, transform::components::Transform};
use bevy_animation_runtime_core::{
    NodeIndex,
    pose::Pose,
    pose_pool::{PoseBuffer, PoseBufferPool},
    sampled_events::SampledEventsBuffer,
    sync_track::SyncTrackTimeRange,
    animation_clip::AnimationClip,
    task::{Task, TaskIndex, TaskSystem, serialization::TaskResourceProvider},
};
use uuid::Uuid;

use crate::{
    config::RuntimeConfig,
    context::{BranchState, GraphContext, InstantiationContext, NodeStates, PoseNodeTime},
    definition::{GraphDataSet, GraphDefinition},
    errors::{GraphError, GraphResult},
    nodes::{GraphPoseNodeResult, NodeSettings},
    value::GraphValue,
};

/// What a parent graph needs from a child graph it relays.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildGraphUpdate {
    pub root_motion_delta: Transform,
    pub time: PoseNodeTime,
}

/// A running instance of a [`GraphDefinition`], bound to a [`GraphDataSet`].
///
/// Each frame the owner calls [`evaluate_graph`], which updates the nodes and
/// registers their tasks, then [`execute_pre_physics_pose_tasks`] before the
/// physics step and [`execute_post_physics_pose_tasks`] after it. The final
/// pose is available once both passes ran.
///
/// [`evaluate_graph`]: GraphInstance::evaluate_graph
/// [`execute_pre_physics_pose_tasks`]: GraphInstance::execute_pre_physics_pose_tasks
/// [`execute_post_physics_pose_tasks`]: GraphInstance::execute_post_physics_pose_tasks
#[derive(Debug)]
pub struct GraphInstance {
    id: Uuid,
    definition: Arc<GraphDefinition>,
    data_set: Arc<GraphDataSet>,
    config: RuntimeConfig,
    node_states: NodeStates,
    /// Values of the control parameters, in the definition's order.
    control_parameters: Vec<GraphValue>,
    task_system: TaskSystem,
    sampled_events: SampledEventsBuffer,
    /// Child graphs, indexed like the definition's external graph slots.
    external_graphs: Vec<Option<Box<GraphInstance>>>,
    update_id: u64,
    reset_requested: bool,
    delta_time: f32,
    world_transform: Transform,
    root_motion_delta: Transform,
}

impl GraphInstance {
    pub fn new(definition: Arc<GraphDefinition>, data_set: Arc<GraphDataSet>) -> GraphResult<Self> {
        Self::with_config(definition, data_set, RuntimeConfig::default())
    }

    pub fn with_config(
        definition: Arc<GraphDefinition>,
        data_set: Arc<GraphDataSet>,
        config: RuntimeConfig,
    ) -> GraphResult<Self> {
        let mut pool = PoseBufferPool::with_secondary_skeletons(
            data_set.skeleton().clone(),
            data_set.secondary_skeletons().to_vec(),
        );
        pool.set_recording_enabled(config.record_poses);

        let mut node_states = NodeStates::new(definition.num_nodes());
        let mut ctx = InstantiationContext {
            definition: &definition,
            data_set: &data_set,
            config: &config,
            pool: &mut pool,
            node_states: &mut node_states,
        };
        for (index, settings) in definition.nodes().iter().enumerate() {
            settings.as_node().instantiate(&mut ctx, index as NodeIndex)?;
        }

        let control_parameters = definition
            .control_parameters()
            .values()
            .map(|node| match definition.node(*node) {
                NodeSettings::ControlParameter(parameter) => parameter.default.clone(),
                _ => unreachable!("control parameter map points at a control parameter node"),
            })
            .collect();
        let external_graphs = (0..definition.external_graph_slots().len())
            .map(|_| None)
            .collect();

        let id = Uuid::new_v4();
        debug!(
            "Instantiated graph {id} with {} nodes on skeleton {:?}",
            definition.num_nodes(),
            data_set.skeleton().name()
        );

        Ok(Self {
            id,
            definition,
            data_set,
            config,
            node_states,
            control_parameters,
            task_system: TaskSystem::new(pool),
            sampled_events: SampledEventsBuffer::new(),
            external_graphs,
            update_id: 0,
            reset_requested: true,
            delta_time: 0.,
            world_transform: Transform::IDENTITY,
            root_motion_delta: Transform::IDENTITY,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn definition(&self) -> &Arc<GraphDefinition> {
        &self.definition
    }

    pub fn data_set(&self) -> &Arc<GraphDataSet> {
        &self.data_set
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
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

    /// Updates every node reachable from the root and registers the tasks
    /// producing this frame's pose. Events sampled during the update are
    /// available right away; the pose only once the tasks are executed.
    pub fn evaluate_graph(
        &mut self,
        delta_time: f32,
        world_transform: Transform,
        physics_world: Option<&dyn Any>,
    ) -> GraphResult<()> {
        self.update_root(delta_time, world_transform, physics_world, None)?;
        Ok(())
    }

    pub(crate) fn update_as_child(
        &mut self,
        delta_time: f32,
        world_transform: Transform,
        physics_world: Option<&dyn Any>,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<ChildGraphUpdate> {
        let result = self.update_root(delta_time, world_transform, physics_world, sync_range)?;
        Ok(ChildGraphUpdate {
            root_motion_delta: result.root_motion_delta,
            time: self.node_states.time(self.definition.root_node()),
        })
    }

    fn update_root(
        &mut self,
        delta_time: f32,
        world_transform: Transform,
        physics_world: Option<&dyn Any>,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        self.update_id += 1;
        self.delta_time = delta_time;
        self.world_transform = world_transform;
        self.task_system.reset();
        self.sampled_events.reset();
        if self.reset_requested {
            self.node_states.clear_initialized();
            self.reset_requested = false;
        }

        let root = self.definition.root_node();
        let mut ctx = self.context(physics_world);
        let result = match sync_range {
            Some(range) => ctx.update_pose_node_synchronized(root, range)?,
            None => ctx.update_pose_node(root)?,
        };

        self.root_motion_delta = result.root_motion_delta;
        Ok(result)
    }

    fn context<'a>(&'a mut self, physics_world: Option<&'a dyn Any>) -> GraphContext<'a> {
        GraphContext {
            definition: &self.definition,
            data_set: &self.data_set,
            config: &self.config,
            node_states: &mut self.node_states,
            control_parameters: &self.control_parameters,
            task_system: &mut self.task_system,
            sampled_events: &mut self.sampled_events,
            external_graphs: &mut self.external_graphs,
            physics_world,
            update_id: self.update_id,
            delta_time: self.delta_time,
            world_transform: self.world_transform,
            branch_state: BranchState::Active,
        }
    }

    /// Value of a value node as of the last evaluation. Values not read
    /// during that evaluation are computed from the current parameters.
    pub fn value(&mut self, node: NodeIndex) -> GraphResult<GraphValue> {
        self.context(None).graph_value(node)
    }

    /// Whether `node`'s value was computed during the last evaluation.
    pub fn was_value_updated(&self, node: NodeIndex) -> bool {
        self.node_states.was_value_updated(node, self.update_id)
    }

    /// Moves the registered tasks out, leaving the task system empty.
    pub(crate) fn take_tasks(&mut self) -> Vec<Task> {
        self.task_system.take_tasks()
    }

    /// Runs every task that does not need the physics step.
    pub fn execute_pre_physics_pose_tasks(&mut self, world_transform: Transform) {
        self.world_transform = world_transform;
        self.task_system
            .execute_pre_physics_tasks(self.delta_time, world_transform);
    }

    /// Runs the remaining tasks with the character's post-physics transform.
    pub fn execute_post_physics_pose_tasks(&mut self, world_transform: Transform) {
        self.world_transform = world_transform;
        self.task_system.execute_post_physics_tasks(world_transform);
    }

    /// Final pose of the last evaluation, once its tasks have run.
    pub fn pose(&self) -> Option<&Pose> {
        self.task_system.final_pose()
    }

    pub fn pose_buffer(&self) -> Option<&PoseBuffer> {
        self.task_system.final_pose_buffer()
    }

    /// Root motion of the last evaluation, in character space.
    pub fn root_motion_delta(&self) -> Transform {
        self.root_motion_delta
    }

    pub fn sampled_events(&self) -> &SampledEventsBuffer {
        &self.sampled_events
    }

    /// Re-initializes every node on the next evaluation, restarting playback.
    /// Attached child graphs are reset too.
    pub fn reset_graph_state(&mut self) {
        self.reset_requested = true;
        self.root_motion_delta = Transform::IDENTITY;
        for child in self.external_graphs.iter_mut().flatten() {
            child.reset_graph_state();
        }
    }

    pub fn control_parameters(&self) -> &[GraphValue] {
        &self.control_parameters
    }

    pub fn control_parameter(&self, name: &str) -> GraphResult<&GraphValue> {
        self.definition
            .control_parameter_index(name)
            .map(|index| &self.control_parameters[index])
            .ok_or_else(|| GraphError::UnknownControlParameter(name.to_string()))
    }

    /// Sets a control parameter. The value must have the parameter's type.
    pub fn set_control_parameter(
        &mut self,
        name: &str,
        value: impl Into<GraphValue>,
    ) -> GraphResult<()> {
        let value = value.into();
        let index = self
            .definition
            .control_parameter_index(name)
            .ok_or_else(|| GraphError::UnknownControlParameter(name.to_string()))?;
        let current = &mut self.control_parameters[index];
        if current.value_type() != value.value_type() {
            return Err(GraphError::MismatchedDataType(
                current.value_type(),
                value.value_type(),
            ));
        }
        *current = value;
        Ok(())
    }

    /// Overwrites every control parameter, e.g. when replaying a recording.
    pub fn set_control_parameters(&mut self, values: &[GraphValue]) -> GraphResult<()> {
        let names: Vec<String> = self.definition.control_parameters().keys().cloned().collect();
        for (name, value) in names.iter().zip(values) {
            self.set_control_parameter(name, value.clone())?;
        }
        Ok(())
    }

    /// Attaches `child` to an external graph slot, replacing and returning
    /// whatever was attached before.
    ///
    /// The child's tasks run against this graph's pose pool, so it must use
    /// the same skeleton and may not hold cached poses.
    pub fn connect_external_graph(
        &mut self,
        slot: &str,
        mut child: GraphInstance,
    ) -> GraphResult<Option<GraphInstance>> {
        let index = self
            .definition
            .external_graph_slot_index(slot)
            .ok_or_else(|| GraphError::UnknownExternalGraphSlot(slot.to_string()))?;

        let skeleton = self.data_set.skeleton();
        let child_skeleton = child.data_set.skeleton();
        if skeleton.name() != child_skeleton.name()
            || skeleton.num_bones() != child_skeleton.num_bones()
        {
            return Err(GraphError::SkeletonMismatch {
                expected: skeleton.name().to_string(),
                found: child_skeleton.name().to_string(),
            });
        }
        if let Some(node) = child.definition.find_cached_pose_node() {
            return Err(GraphError::ExternalGraphUsesCachedPoses(node));
        }

        debug!("Graph {} attached graph {} to slot {slot:?}", self.id, child.id);
        child.reset_graph_state();
        Ok(self.external_graphs[index]
            .replace(Box::new(child))
            .map(|previous| *previous))
    }

    pub fn disconnect_external_graph(&mut self, slot: &str) -> GraphResult<Option<GraphInstance>> {
        let index = self
            .definition
            .external_graph_slot_index(slot)
            .ok_or_else(|| GraphError::UnknownExternalGraphSlot(slot.to_string()))?;
        let child = self.external_graphs[index].take().map(|child| *child);
        if let Some(child) = &child {
            debug!("Graph {} detached graph {} from slot {slot:?}", self.id, child.id);
        }
        Ok(child)
    }

    pub fn external_graph(&self, slot: &str) -> Option<&GraphInstance> {
        let index = self.definition.external_graph_slot_index(slot)?;
        self.external_graphs[index].as_deref()
    }

    /// Whether `node` was updated during the last evaluation.
    pub fn is_node_active(&self, node: NodeIndex) -> bool {
        self.node_states.is_active(node, self.update_id)
    }

    pub fn pose_node_time(&self, node: NodeIndex) -> PoseNodeTime {
        self.node_states.time(node)
    }

    pub fn task_system(&self) -> &TaskSystem {
        &self.task_system
    }

    pub fn task_system_mut(&mut self) -> &mut TaskSystem {
        &mut self.task_system
    }

    /// Copy of a task's output pose, when pose recording is enabled.
    pub fn recorded_pose(&self, task_index: TaskIndex) -> Option<&PoseBuffer> {
        self.task_system.recorded_pose(task_index)
    }

    /// Dependency tree of this frame's tasks.
    pub fn debug_task_tree(&self) -> String {
        self.task_system.dependency_tree()
    }

    /// Table of this frame's sampled events.
    pub fn debug_events(&self) -> String {
        self.sampled_events.debug_table()
    }

    /// One line per node with its type, activity and time.
    pub fn debug_nodes(&self) -> String {
        self.definition
            .nodes()
            .iter()
            .enumerate()
            .map(|(index, settings)| {
                let node = index as NodeIndex;
                let time = self.node_states.time(node);
                format!(
                    "[{node}] {} {:?}{} {:.3} -> {:.3} / {:.3}s\n",
                    settings.as_node().display_name(),
                    settings.as_node().output_type(),
                    if self.is_node_active(node) { " *" } else { "" },
                    time.previous_time,
                    time.current_time,
                    time.duration,
                )
            })
            .collect()
    }
}

/// Resolves clips through the instance's data set, and tasks relayed from
/// external graphs through the child attached to their slot.
impl TaskResourceProvider for GraphInstance {
    fn animation_clip(&self, data_slot: u16) -> Option<Arc<AnimationClip>> {
        self.data_set.animation_clip(data_slot).cloned()
    }

    fn external_graph_resources(&self, external_slot: u16) -> Option<&dyn TaskResourceProvider> {
        self.external_graphs
            .get(external_slot as usize)?
            .as_deref()
            .map(|child| child as &dyn TaskResourceProvider)
    }
}
