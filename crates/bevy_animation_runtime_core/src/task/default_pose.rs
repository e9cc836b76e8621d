use crate::{
    pose::PoseType,
    pose_pool::PoseBufferIndex,
    task::{
        PoseTask, TaskContext, TaskDependencies,
        serialization::{DeserializableTask, TaskReader, TaskWriter},
    },
    errors::TaskSerializationError,
};

/// Produces a reference or zero pose.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultPoseTask {
    pub pose_type: PoseType,
}

impl DefaultPoseTask {
    pub const TYPE_NAME: &'static str = "DefaultPose";

    pub fn new(pose_type: PoseType) -> Self {
        Self { pose_type }
    }
}

impl PoseTask for DefaultPoseTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn execute(&mut self, ctx: &mut TaskContext, _: &mut TaskDependencies) -> PoseBufferIndex {
        let buffer = ctx.pool.request_pose_buffer();
        ctx.pool.buffer_mut(buffer).reset_poses(self.pose_type);
        buffer
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_bool(self.pose_type == PoseType::ZeroPose);
    }

    fn debug_text(&self) -> String {
        format!("{:?}", self.pose_type)
    }
}

impl DeserializableTask for DefaultPoseTask {
    const NUM_DEPENDENCIES: usize = 0;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        let pose_type = if reader.read_bool()? {
            PoseType::ZeroPose
        } else {
            PoseType::ReferencePose
        };
        Ok(Self::new(pose_type))
    }
}
