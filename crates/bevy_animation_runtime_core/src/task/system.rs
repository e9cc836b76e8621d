use std::fmt::Write;

use bevy::transform::components::Transform;

use crate::{
    errors::TaskSerializationError,
    pose::Pose,
    pose_pool::{PoseBuffer, PoseBufferIndex, PoseBufferPool},
    space_conversion::TransformSpaceExt,
    task::{
        MAX_TASKS, Task, TaskContext, TaskIndex, TaskKind, TaskUpdateStage, execute_tasks,
        serialization::{TaskResourceProvider, deserialize_tasks, serialize_tasks},
    },
};

/// Collects the tasks registered during graph evaluation and executes them
/// around the physics step.
#[derive(Debug)]
pub struct TaskSystem {
    pool: PoseBufferPool,
    tasks: Vec<Task>,
    has_physics_dependency: bool,
    delta_time: f32,
}

impl TaskSystem {
    pub fn new(pool: PoseBufferPool) -> Self {
        Self {
            pool,
            tasks: Vec::new(),
            has_physics_dependency: false,
            delta_time: 0.,
        }
    }

    pub fn pool(&self) -> &PoseBufferPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut PoseBufferPool {
        &mut self.pool
    }

    /// Clears the tasks of the previous frame and resets the pool.
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.has_physics_dependency = false;
        self.pool.reset();
    }

    pub fn register_task(&mut self, task: Task) -> TaskIndex {
        assert!(self.tasks.len() < MAX_TASKS, "too many tasks registered");
        let index = self.tasks.len();
        for dependency in task.dependencies() {
            assert!(
                dependency.index() < index,
                "task {index} depends on task {}, which was not registered before it",
                dependency.index()
            );
        }
        self.has_physics_dependency |= task.required_stage() == TaskUpdateStage::PostPhysics;
        self.tasks.push(task);
        TaskIndex::new(index)
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, index: TaskIndex) -> &Task {
        &self.tasks[index.index()]
    }

    /// Whether any task has to wait for the post-physics pass.
    pub fn has_physics_dependency(&self) -> bool {
        self.has_physics_dependency
    }

    /// Moves the registered tasks out, leaving the system empty. Used to relay
    /// a child graph's tasks into its parent's task system.
    pub fn take_tasks(&mut self) -> Vec<Task> {
        self.has_physics_dependency = false;
        std::mem::take(&mut self.tasks)
    }

    pub fn execute_pre_physics_tasks(&mut self, delta_time: f32, world_transform: Transform) {
        self.delta_time = delta_time;
        self.execute(world_transform, TaskUpdateStage::PrePhysics);
    }

    pub fn execute_post_physics_tasks(&mut self, world_transform: Transform) {
        self.execute(world_transform, TaskUpdateStage::PostPhysics);
    }

    fn execute(&mut self, world_transform: Transform, update_stage: TaskUpdateStage) {
        let record_poses = self.pool.is_recording();
        let mut ctx = TaskContext {
            pool: &mut self.pool,
            delta_time: self.delta_time,
            world_transform,
            world_transform_inverse: world_transform.inverse(),
            update_stage,
        };
        execute_tasks(&mut self.tasks, &mut ctx, record_poses);
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(Task::is_complete)
    }

    /// Buffer holding the result of the last registered task, once complete.
    pub fn final_pose_buffer_index(&self) -> Option<PoseBufferIndex> {
        self.tasks.last().and_then(Task::result_buffer)
    }

    pub fn final_pose_buffer(&self) -> Option<&PoseBuffer> {
        self.final_pose_buffer_index()
            .map(|index| self.pool.buffer(index))
    }

    pub fn final_pose(&self) -> Option<&Pose> {
        self.final_pose_buffer().map(PoseBuffer::primary)
    }

    pub fn set_pose_recording_enabled(&mut self, enabled: bool) {
        self.pool.set_recording_enabled(enabled);
    }

    pub fn recorded_pose(&self, index: TaskIndex) -> Option<&PoseBuffer> {
        self.pool.recorded_pose(index.index())
    }

    pub fn serialize_tasks(&self) -> Vec<u8> {
        serialize_tasks(&self.tasks, self.pool.skeleton().num_bone_masks())
    }

    /// Replaces the registered tasks with the ones decoded from `bytes`.
    pub fn deserialize_tasks(
        &mut self,
        bytes: &[u8],
        resources: &dyn TaskResourceProvider,
    ) -> Result<(), TaskSerializationError> {
        let tasks = deserialize_tasks(bytes, self.pool.skeleton(), resources)?;
        self.reset();
        for task in tasks {
            self.register_task(task);
        }
        Ok(())
    }

    fn indent(f: &mut String, level: u32) {
        if level == 0 {
            return;
        }
        for _ in 0..(level - 1) {
            f.push_str("┃ ");
        }
        f.push_str("┣━");
    }

    fn fmt_task(f: &mut String, tasks: &[Task], level: u32, index: TaskIndex) {
        let task = &tasks[index.index()];
        Self::indent(f, level);
        let _ = writeln!(
            f,
            "[{}] {} (node {}, {:?}) {}{}",
            index.index(),
            task.debug_name(),
            task.source_node(),
            task.required_stage(),
            task.debug_text(),
            if task.is_complete() { " ✓" } else { "" }
        );
        if let TaskKind::ExternalGraph(relay) = task.kind()
            && !relay.tasks().is_empty()
        {
            let root = TaskIndex::new(relay.tasks().len() - 1);
            Self::fmt_task(f, relay.tasks(), level + 1, root);
        }
        for dependency in task.dependencies() {
            Self::fmt_task(f, tasks, level + 1, *dependency);
        }
    }

    /// Dependency tree of the final task, one task per line.
    pub fn dependency_tree(&self) -> String {
        let mut tree = String::new();
        if let Some(last) = self.tasks.len().checked_sub(1) {
            Self::fmt_task(&mut tree, &self.tasks, 0, TaskIndex::new(last));
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bevy::math::Vec3;

    use super::*;
    use crate::{
        animation_clip::AnimationClip,
        pose::PoseType,
        pose_pool::PoseBufferPool,
        task::{
            BlendTask, CachedPoseReadTask, CachedPoseWriteTask, DefaultPoseTask,
            ExternalGraphTask, PoseBlendMode, SampleTask, TwoBoneIkTask, WarpTask, test_utils,
        },
    };

    fn system() -> (TaskSystem, Arc<AnimationClip>) {
        let skeleton = test_utils::leg_skeleton();
        let clip = test_utils::slide_clip(&skeleton, 1., 2.);
        (TaskSystem::new(PoseBufferPool::new(skeleton)), clip)
    }

    fn idx(index: usize) -> TaskIndex {
        TaskIndex::new(index)
    }

    #[test]
    fn test_blend_dag_completes_in_order() {
        let (mut system, clip) = system();
        system.register_task(Task::new(0, SampleTask::new(clip.clone(), 0, 0.), vec![]));
        system.register_task(Task::new(1, SampleTask::new(clip, 0, 1.), vec![]));
        system.register_task(Task::new(
            2,
            BlendTask::new(0.5, PoseBlendMode::Interpolative, None),
            vec![idx(0), idx(1)],
        ));

        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        assert!(system.is_complete());
        system.execute_post_physics_tasks(Transform::IDENTITY);

        for task in system.tasks() {
            assert_eq!(task.completed_stage(), Some(TaskUpdateStage::PrePhysics));
        }
        // Blend released both sources
        assert!(system.task(idx(0)).result_buffer().is_none());
        assert!(system.task(idx(1)).result_buffer().is_none());
        assert_eq!(system.pool().used_count(), 1);

        let pose = system.final_pose().unwrap();
        assert!(pose.transform(0).translation.abs_diff_eq(Vec3::new(1., 0., 0.), 1e-5));
    }

    #[test]
    fn test_post_physics_tasks_wait_for_physics() {
        let (mut system, clip) = system();
        system.register_task(Task::new(0, SampleTask::new(clip, 0, 0.5), vec![]));
        system.register_task(Task::new(
            1,
            TwoBoneIkTask::new(3, Some(Vec3::new(0.5, 0.5, 0.))),
            vec![idx(0)],
        ));
        system.register_task(Task::new(2, WarpTask::new(Transform::IDENTITY), vec![idx(1)]));
        assert!(system.has_physics_dependency());

        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        assert!(system.task(idx(0)).is_complete());
        assert!(!system.task(idx(1)).is_complete(), "IK must not run before physics");
        assert!(!system.task(idx(2)).is_complete());
        assert!(system.final_pose().is_none());

        system.execute_post_physics_tasks(Transform::IDENTITY);
        assert_eq!(
            system.task(idx(1)).completed_stage(),
            Some(TaskUpdateStage::PostPhysics)
        );
        assert_eq!(
            system.task(idx(2)).completed_stage(),
            Some(TaskUpdateStage::PostPhysics)
        );
        // Ownership moved along the chain
        assert!(system.task(idx(0)).result_buffer().is_none());
        assert!(system.task(idx(1)).result_buffer().is_none());
        assert!(system.final_pose().is_some());
    }

    #[test]
    fn test_post_physics_task_skipped_with_complete_dependencies() {
        let (mut system, _) = system();
        system.register_task(Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![]));
        system.register_task(Task::new(1, TwoBoneIkTask::new(3, None), vec![idx(0)]));
        assert_eq!(system.task(idx(0)).required_stage(), TaskUpdateStage::Any);

        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        assert_eq!(
            system.task(idx(0)).completed_stage(),
            Some(TaskUpdateStage::PrePhysics)
        );
        assert!(!system.task(idx(1)).is_complete());
        assert_eq!(system.task(idx(1)).completed_stage(), None);
        // The dependency keeps its buffer until the IK task takes it
        assert!(system.task(idx(0)).result_buffer().is_some());
        assert!(!system.is_complete());

        system.execute_post_physics_tasks(Transform::IDENTITY);
        assert_eq!(
            system.task(idx(1)).completed_stage(),
            Some(TaskUpdateStage::PostPhysics)
        );
    }

    #[test]
    fn test_additive_blend_scales_offset_past_one() {
        let (mut system, clip) = system();
        system.register_task(Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![]));
        system.register_task(Task::new(1, SampleTask::new(clip, 0, 1.), vec![]));
        system.register_task(Task::new(
            2,
            BlendTask::new(2., PoseBlendMode::Additive, None),
            vec![idx(0), idx(1)],
        ));
        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);

        // The sampled root sits at x = 2, applied twice
        let pose = system.final_pose().unwrap();
        assert!(pose.transform(0).translation.abs_diff_eq(Vec3::new(4., 0., 0.), 1e-5));
    }

    #[test]
    fn test_ik_uses_post_physics_transform() {
        let (mut system, _) = system();
        system.register_task(Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![]));
        let world_target = Vec3::new(10.5, 0.5, 0.);
        system.register_task(Task::new(1, TwoBoneIkTask::new(3, Some(world_target)), vec![idx(0)]));

        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        // Physics moved the character
        let world = Transform::from_xyz(10., 0., 0.);
        system.execute_post_physics_tasks(world);

        let pose = system.final_pose().unwrap();
        let foot = world * pose.model_space_transform(3);
        assert!(foot.translation.abs_diff_eq(world_target, 1e-3));
    }

    #[test]
    #[should_panic(expected = "was not registered before it")]
    fn test_forward_dependency_panics() {
        let (mut system, _) = system();
        system.register_task(Task::new(0, WarpTask::new(Transform::IDENTITY), vec![idx(0)]));
    }

    #[test]
    #[should_panic(expected = "already transferred")]
    fn test_double_transfer_panics() {
        let (mut system, _) = system();
        system.register_task(Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![]));
        system.register_task(Task::new(1, WarpTask::new(Transform::IDENTITY), vec![idx(0)]));
        system.register_task(Task::new(2, WarpTask::new(Transform::IDENTITY), vec![idx(0)]));
        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
    }

    #[test]
    fn test_cached_pose_holds_across_frames() {
        let (mut system, clip) = system();
        let id = system.pool_mut().create_cached_pose_buffer();

        system.register_task(Task::new(0, SampleTask::new(clip, 0, 1.), vec![]));
        system.register_task(Task::new(0, CachedPoseWriteTask::new(id), vec![idx(0)]));
        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        system.execute_post_physics_tasks(Transform::IDENTITY);

        system.reset();
        system.register_task(Task::new(0, CachedPoseReadTask::new(id), vec![]));
        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);

        let pose = system.final_pose().unwrap();
        assert!(pose.transform(0).translation.abs_diff_eq(Vec3::new(2., 0., 0.), 1e-5));
    }

    #[test]
    fn test_external_graph_relay() {
        let (mut child, clip) = system();
        child.register_task(Task::new(0, SampleTask::new(clip.clone(), 0, 0.), vec![]));
        child.register_task(Task::new(1, SampleTask::new(clip, 0, 1.), vec![]));
        child.register_task(Task::new(
            2,
            BlendTask::new(1., PoseBlendMode::Interpolative, Some(0)),
            vec![idx(0), idx(1)],
        ));

        let (mut parent, _) = system();
        parent.register_task(Task::new(7, ExternalGraphTask::new(0, child.take_tasks()), vec![]));
        assert!(!child.has_tasks());

        parent.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        assert!(parent.is_complete());
        assert_eq!(parent.pool().used_count(), 1);

        // Only the masked bones follow the second source
        let pose = parent.final_pose().unwrap();
        assert_eq!(pose.transform(0).translation.x, 0.);
    }

    #[test]
    fn test_recording_and_tree() {
        let (mut system, clip) = system();
        system.set_pose_recording_enabled(true);
        system.register_task(Task::new(0, SampleTask::new(clip, 0, 1.), vec![]));
        system.register_task(Task::new(1, DefaultPoseTask::new(PoseType::ZeroPose), vec![]));
        system.register_task(Task::new(
            2,
            BlendTask::new(0., PoseBlendMode::Interpolative, None),
            vec![idx(0), idx(1)],
        ));
        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);

        let recorded = system.recorded_pose(idx(0)).unwrap();
        assert!(
            recorded
                .primary()
                .transform(0)
                .translation
                .abs_diff_eq(Vec3::new(2., 0., 0.), 1e-5)
        );
        assert!(system.recorded_pose(idx(1)).unwrap().primary().is_zero_pose());

        let tree = system.dependency_tree();
        assert!(tree.starts_with("[2] Blend (node 2, Any)"));
        assert!(tree.contains("┣━[0] Sample (node 0, Any) slide @ 1.000 ✓"));
    }

    #[test]
    fn test_replay_from_serialized_tasks() {
        struct Clips(Arc<AnimationClip>);
        impl TaskResourceProvider for Clips {
            fn animation_clip(&self, _: u16) -> Option<Arc<AnimationClip>> {
                Some(self.0.clone())
            }
        }

        let (mut system, clip) = system();
        system.register_task(Task::new(0, SampleTask::new(clip.clone(), 0, 0.5), vec![]));
        system.register_task(Task::new(
            1,
            WarpTask::new(Transform::from_xyz(0., 1., 0.)),
            vec![idx(0)],
        ));
        let bytes = system.serialize_tasks();
        system.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        let expected = system.final_pose().unwrap().transform(0);

        let mut replay = TaskSystem::new(PoseBufferPool::new(test_utils::leg_skeleton()));
        replay.deserialize_tasks(&bytes, &Clips(clip)).unwrap();
        assert_eq!(replay.num_tasks(), 2);
        replay.execute_pre_physics_tasks(0.1, Transform::IDENTITY);
        assert_eq!(replay.final_pose().unwrap().transform(0), expected);
    }
}
