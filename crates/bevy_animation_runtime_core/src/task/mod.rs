//! Deferred pose tasks.
//!
//! Graph evaluation does not produce poses directly. Instead, every pose node
//! registers a [`Task`] that will produce a pose buffer once executed, listing
//! the tasks whose buffers it consumes. Tasks can only depend on tasks
//! registered before them, so registration order is a valid execution order.

mod blend;
mod cached_pose;
mod default_pose;
mod external_graph;
mod sample;
pub mod serialization;
mod system;
mod two_bone_ik;
mod warp;

use std::fmt::Debug;

use bevy::{
    log::trace,
    reflect::{Reflect, std_traits::ReflectDefault},
    transform::components::Transform,
};
use serde::{Deserialize, Serialize};

pub use blend::*;
pub use cached_pose::*;
pub use default_pose::*;
pub use external_graph::*;
pub use sample::*;
pub use system::*;
pub use two_bone_ik::*;
pub use warp::*;

use crate::{
    NodeIndex,
    pose_pool::{PoseBufferIndex, PoseBufferPool},
    task::serialization::TaskWriter,
};

pub const MAX_TASKS: usize = 255;

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[reflect(Default)]
pub enum TaskUpdateStage {
    #[default]
    Any,
    PrePhysics,
    PostPhysics,
}

#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskIndex(u8);

impl TaskIndex {
    pub fn new(index: usize) -> Self {
        assert!(index < MAX_TASKS, "task index {index} out of range");
        Self(index as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Everything a task may touch while executing.
pub struct TaskContext<'a> {
    pub pool: &'a mut PoseBufferPool,
    pub delta_time: f32,
    pub world_transform: Transform,
    pub world_transform_inverse: Transform,
    /// The pass currently executing, either `PrePhysics` or `PostPhysics`.
    pub update_stage: TaskUpdateStage,
}

/// The dependencies of the task being executed.
pub struct TaskDependencies<'a> {
    previous: &'a mut [Task],
    indices: &'a [TaskIndex],
}

impl TaskDependencies<'_> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn task(&self, dependency: usize) -> &Task {
        let task = &self.previous[self.indices[dependency].index()];
        assert!(
            task.is_complete(),
            "dependency {} accessed before it completed",
            self.indices[dependency].index()
        );
        task
    }

    /// Index of the dependency's buffer, without taking ownership of it.
    pub fn buffer_index(&self, dependency: usize) -> PoseBufferIndex {
        match self.task(dependency).result_buffer {
            Some(buffer) => buffer,
            None => panic!(
                "buffer of dependency {} was already transferred",
                self.indices[dependency].index()
            ),
        }
    }

    /// Takes ownership of the dependency's buffer. The dependency is left
    /// without a result buffer, so a second transfer panics.
    pub fn transfer_buffer(&mut self, dependency: usize) -> PoseBufferIndex {
        let index = self.indices[dependency].index();
        let task = &mut self.previous[index];
        assert!(task.is_complete(), "dependency {index} accessed before it completed");
        match task.result_buffer.take() {
            Some(buffer) => buffer,
            None => panic!("buffer of dependency {index} was already transferred"),
        }
    }

    pub fn release_buffer(&mut self, dependency: usize, pool: &mut PoseBufferPool) {
        let buffer = self.transfer_buffer(dependency);
        pool.release_pose_buffer(buffer);
    }
}

/// Behaviour shared by every task kind.
pub trait PoseTask: Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    fn required_stage(&self) -> TaskUpdateStage {
        TaskUpdateStage::Any
    }

    /// Produces the task's result buffer, either by requesting a new buffer
    /// or by taking over a dependency's buffer.
    fn execute(
        &mut self,
        ctx: &mut TaskContext,
        dependencies: &mut TaskDependencies,
    ) -> PoseBufferIndex;

    fn serialize(&self, writer: &mut TaskWriter);

    fn debug_text(&self) -> String {
        String::new()
    }
}

#[derive(Debug)]
pub enum TaskKind {
    DefaultPose(DefaultPoseTask),
    Sample(SampleTask),
    Blend(BlendTask),
    Warp(WarpTask),
    TwoBoneIk(TwoBoneIkTask),
    CachedPoseWrite(CachedPoseWriteTask),
    CachedPoseRead(CachedPoseReadTask),
    ExternalGraph(ExternalGraphTask),
}

impl TaskKind {
    pub fn map<O, F>(&self, f: F) -> O
    where
        F: FnOnce(&dyn PoseTask) -> O,
    {
        match self {
            TaskKind::DefaultPose(t) => f(t),
            TaskKind::Sample(t) => f(t),
            TaskKind::Blend(t) => f(t),
            TaskKind::Warp(t) => f(t),
            TaskKind::TwoBoneIk(t) => f(t),
            TaskKind::CachedPoseWrite(t) => f(t),
            TaskKind::CachedPoseRead(t) => f(t),
            TaskKind::ExternalGraph(t) => f(t),
        }
    }

    pub fn map_mut<O, F>(&mut self, f: F) -> O
    where
        F: FnOnce(&mut dyn PoseTask) -> O,
    {
        match self {
            TaskKind::DefaultPose(t) => f(t),
            TaskKind::Sample(t) => f(t),
            TaskKind::Blend(t) => f(t),
            TaskKind::Warp(t) => f(t),
            TaskKind::TwoBoneIk(t) => f(t),
            TaskKind::CachedPoseWrite(t) => f(t),
            TaskKind::CachedPoseRead(t) => f(t),
            TaskKind::ExternalGraph(t) => f(t),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.map(|t| t.type_name())
    }
}

impl From<DefaultPoseTask> for TaskKind {
    fn from(value: DefaultPoseTask) -> Self {
        Self::DefaultPose(value)
    }
}

impl From<SampleTask> for TaskKind {
    fn from(value: SampleTask) -> Self {
        Self::Sample(value)
    }
}

impl From<BlendTask> for TaskKind {
    fn from(value: BlendTask) -> Self {
        Self::Blend(value)
    }
}

impl From<WarpTask> for TaskKind {
    fn from(value: WarpTask) -> Self {
        Self::Warp(value)
    }
}

impl From<TwoBoneIkTask> for TaskKind {
    fn from(value: TwoBoneIkTask) -> Self {
        Self::TwoBoneIk(value)
    }
}

impl From<CachedPoseWriteTask> for TaskKind {
    fn from(value: CachedPoseWriteTask) -> Self {
        Self::CachedPoseWrite(value)
    }
}

impl From<CachedPoseReadTask> for TaskKind {
    fn from(value: CachedPoseReadTask) -> Self {
        Self::CachedPoseRead(value)
    }
}

impl From<ExternalGraphTask> for TaskKind {
    fn from(value: ExternalGraphTask) -> Self {
        Self::ExternalGraph(value)
    }
}

#[derive(Debug)]
pub struct Task {
    source_node: NodeIndex,
    required_stage: TaskUpdateStage,
    dependencies: Vec<TaskIndex>,
    result_buffer: Option<PoseBufferIndex>,
    completed_stage: Option<TaskUpdateStage>,
    kind: TaskKind,
}

impl Task {
    pub fn new(
        source_node: NodeIndex,
        kind: impl Into<TaskKind>,
        dependencies: Vec<TaskIndex>,
    ) -> Self {
        let kind = kind.into();
        Self {
            source_node,
            required_stage: kind.map(|t| t.required_stage()),
            dependencies,
            result_buffer: None,
            completed_stage: None,
            kind,
        }
    }

    pub fn source_node(&self) -> NodeIndex {
        self.source_node
    }

    pub fn required_stage(&self) -> TaskUpdateStage {
        self.required_stage
    }

    pub fn dependencies(&self) -> &[TaskIndex] {
        &self.dependencies
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn is_complete(&self) -> bool {
        self.completed_stage.is_some()
    }

    /// The pass the task ran in, once complete.
    pub fn completed_stage(&self) -> Option<TaskUpdateStage> {
        self.completed_stage
    }

    /// The task's buffer, unless it was transferred to a dependent task.
    pub fn result_buffer(&self) -> Option<PoseBufferIndex> {
        self.result_buffer
    }

    pub fn debug_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn debug_text(&self) -> String {
        self.kind.map(|t| t.debug_text())
    }

    /// Whether the task is allowed to run during the given pass.
    pub fn can_run_in(&self, stage: TaskUpdateStage) -> bool {
        match self.required_stage {
            TaskUpdateStage::Any => true,
            required => required == stage,
        }
    }

    fn execute(&mut self, ctx: &mut TaskContext, previous: &mut [Task]) {
        let Task {
            dependencies,
            kind,
            ..
        } = self;
        let mut dependencies = TaskDependencies {
            previous,
            indices: dependencies,
        };
        let buffer = kind.map_mut(|t| t.execute(ctx, &mut dependencies));
        self.mark_complete(buffer, ctx.update_stage);
    }

    fn mark_complete(&mut self, buffer: PoseBufferIndex, stage: TaskUpdateStage) {
        assert!(!self.is_complete(), "task completed twice");
        self.result_buffer = Some(buffer);
        self.completed_stage = Some(stage);
    }
}

/// Runs every runnable task of `tasks` for the pass in `ctx.update_stage`, in
/// ascending order.
///
/// During the pre-physics pass tasks that require post-physics data, or that
/// depend on such tasks, are skipped. The post-physics pass runs everything
/// that is left.
pub(crate) fn execute_tasks(tasks: &mut [Task], ctx: &mut TaskContext, record_poses: bool) {
    let stage = ctx.update_stage;
    assert!(
        stage != TaskUpdateStage::Any,
        "tasks must be executed in a concrete update stage"
    );

    for task_index in 0..tasks.len() {
        let (previous, rest) = tasks.split_at_mut(task_index);
        let task = &mut rest[0];
        if task.is_complete() {
            continue;
        }

        let dependencies_complete = task
            .dependencies
            .iter()
            .all(|dep| previous[dep.index()].is_complete());

        if stage == TaskUpdateStage::PrePhysics {
            if !task.can_run_in(stage) || !dependencies_complete {
                continue;
            }
        } else {
            assert!(
                task.can_run_in(stage),
                "pre-physics task {task_index} could not run before physics"
            );
            assert!(
                dependencies_complete,
                "task {task_index} has incomplete dependencies"
            );
        }

        task.execute(ctx, previous);
        trace!(
            "Executed task {task_index} ({}) from node {} in {:?}",
            task.debug_name(),
            task.source_node,
            stage
        );

        if record_poses && let Some(buffer) = task.result_buffer {
            ctx.pool.record_pose(task_index, buffer);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Arc;

    use bevy::{math::Quat, transform::components::Transform};

    use crate::{
        animation_clip::{AnimationClip, AnimationEvent},
        bone_mask::{BoneMaskDefinition, BoneMaskWeights},
        skeleton::{BoneDefinition, Skeleton},
    };

    /// root -> hip -> knee -> foot, one unit apart along -Y.
    pub fn leg_skeleton() -> Arc<Skeleton> {
        Arc::new(
            Skeleton::new(
                "leg",
                vec![
                    BoneDefinition::new("root", None, Transform::IDENTITY),
                    BoneDefinition::new("hip", Some(0), Transform::from_xyz(0., 2., 0.)),
                    BoneDefinition::new("knee", Some(1), Transform::from_xyz(0., -1., 0.)),
                    BoneDefinition::new("foot", Some(2), Transform::from_xyz(0., -1., 0.)),
                ],
            )
            .unwrap()
            .with_bone_mask(BoneMaskDefinition {
                id: "lower".into(),
                weights: BoneMaskWeights::Pattern {
                    pattern: "knee|foot".into(),
                    weight: 1.,
                },
            })
            .unwrap(),
        )
    }

    /// Clip moving the root from x = 0 to x = `distance` over `duration`
    /// seconds.
    pub fn slide_clip(
        skeleton: &Arc<Skeleton>,
        duration: f32,
        distance: f32,
    ) -> Arc<AnimationClip> {
        let reference = skeleton.reference_pose().to_vec();
        let frames = (0..3)
            .map(|i| {
                let mut frame = reference.clone();
                frame[0].translation.x = distance * i as f32 / 2.;
                frame
            })
            .collect();
        let root_motion = (0..3)
            .map(|i| {
                Transform::from_xyz(0., 0., distance * i as f32 / 2.)
                    .with_rotation(Quat::IDENTITY)
            })
            .collect();
        Arc::new(
            AnimationClip::new("slide", skeleton.clone(), duration, frames)
                .unwrap()
                .with_root_motion(root_motion)
                .unwrap()
                .with_events(vec![AnimationEvent::immediate("halfway", 0.5)])
                .unwrap(),
        )
    }
}
