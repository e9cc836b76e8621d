use crate::{
    errors::TaskSerializationError,
    pose::PoseType,
    pose_pool::PoseBufferIndex,
    task::{
        PoseTask, Task, TaskContext, TaskDependencies, TaskUpdateStage, execute_tasks,
        serialization::{DeserializableTask, TaskReader, TaskWriter, serialize_task_list},
    },
};

/// Relays the task list of a child graph instance.
///
/// The child's tasks are executed against the parent's pool, and the child's
/// final buffer becomes this task's result.
#[derive(Debug)]
pub struct ExternalGraphTask {
    /// External graph slot of the parent the child is attached to.
    external_slot: u16,
    tasks: Vec<Task>,
    required_stage: TaskUpdateStage,
}

impl ExternalGraphTask {
    pub const TYPE_NAME: &'static str = "ExternalGraph";

    pub fn new(external_slot: u16, tasks: Vec<Task>) -> Self {
        let Some(required_stage) = combined_stage(&tasks) else {
            panic!("an external graph cannot mix pre-physics and post-physics tasks");
        };
        Self {
            external_slot,
            tasks,
            required_stage,
        }
    }

    pub fn external_slot(&self) -> u16 {
        self.external_slot
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

/// The stage a relay of `tasks` has to run in, or `None` if the tasks need
/// both passes.
fn combined_stage(tasks: &[Task]) -> Option<TaskUpdateStage> {
    let has_stage = |stage| tasks.iter().any(|t| t.required_stage() == stage);
    match (
        has_stage(TaskUpdateStage::PrePhysics),
        has_stage(TaskUpdateStage::PostPhysics),
    ) {
        (true, true) => None,
        (true, false) => Some(TaskUpdateStage::PrePhysics),
        (false, true) => Some(TaskUpdateStage::PostPhysics),
        (false, false) => Some(TaskUpdateStage::Any),
    }
}

impl PoseTask for ExternalGraphTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn required_stage(&self) -> TaskUpdateStage {
        self.required_stage
    }

    fn execute(&mut self, ctx: &mut TaskContext, _: &mut TaskDependencies) -> PoseBufferIndex {
        execute_tasks(&mut self.tasks, ctx, false);
        assert!(
            self.tasks.iter().all(Task::is_complete),
            "external graph tasks did not complete"
        );

        match self.tasks.last_mut() {
            Some(last) => {
                match last.result_buffer.take() {
                    Some(buffer) => buffer,
                    None => panic!("external graph result buffer was transferred"),
                }
            }
            None => {
                let buffer = ctx.pool.request_pose_buffer();
                ctx.pool
                    .buffer_mut(buffer)
                    .reset_poses(PoseType::ReferencePose);
                buffer
            }
        }
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_u16(self.external_slot);
        serialize_task_list(&self.tasks, writer);
    }

    fn debug_text(&self) -> String {
        format!("{} child tasks", self.tasks.len())
    }
}

impl DeserializableTask for ExternalGraphTask {
    const NUM_DEPENDENCIES: usize = 0;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        let external_slot = reader.read_u16()?;
        let tasks = reader.read_external_task_list(external_slot)?;
        if combined_stage(&tasks).is_none() {
            return Err(TaskSerializationError::MixedTaskStages);
        }
        Ok(Self::new(external_slot, tasks))
    }
}
