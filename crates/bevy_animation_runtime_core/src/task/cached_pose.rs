use crate::{
    errors::TaskSerializationError,
    pose_pool::{CachedPoseId, PoseBufferIndex},
    task::{
        PoseTask, TaskContext, TaskDependencies,
        serialization::{DeserializableTask, TaskReader, TaskWriter},
    },
};

/// Passes its dependency's buffer through, storing a copy in a cached buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPoseWriteTask {
    pub cached_pose: CachedPoseId,
}

impl CachedPoseWriteTask {
    pub const TYPE_NAME: &'static str = "CachedPoseWrite";

    pub fn new(cached_pose: CachedPoseId) -> Self {
        Self { cached_pose }
    }
}

impl PoseTask for CachedPoseWriteTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn execute(
        &mut self,
        ctx: &mut TaskContext,
        dependencies: &mut TaskDependencies,
    ) -> PoseBufferIndex {
        let buffer = dependencies.transfer_buffer(0);
        ctx.pool.get_or_create_cached_pose_buffer(self.cached_pose);
        ctx.pool.copy_to_cached(self.cached_pose, buffer);
        buffer
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_cached_pose_id(self.cached_pose);
    }

    fn debug_text(&self) -> String {
        format!("-> cached {}", self.cached_pose.id())
    }
}

impl DeserializableTask for CachedPoseWriteTask {
    const NUM_DEPENDENCIES: usize = 1;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        Ok(Self::new(reader.read_cached_pose_id()?))
    }
}

/// Produces a copy of a cached pose.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPoseReadTask {
    pub cached_pose: CachedPoseId,
}

impl CachedPoseReadTask {
    pub const TYPE_NAME: &'static str = "CachedPoseRead";

    pub fn new(cached_pose: CachedPoseId) -> Self {
        Self { cached_pose }
    }
}

impl PoseTask for CachedPoseReadTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn execute(&mut self, ctx: &mut TaskContext, _: &mut TaskDependencies) -> PoseBufferIndex {
        let buffer = ctx.pool.request_pose_buffer();
        ctx.pool.copy_from_cached(self.cached_pose, buffer);
        buffer
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_cached_pose_id(self.cached_pose);
    }

    fn debug_text(&self) -> String {
        format!("<- cached {}", self.cached_pose.id())
    }
}

impl DeserializableTask for CachedPoseReadTask {
    const NUM_DEPENDENCIES: usize = 0;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        Ok(Self::new(reader.read_cached_pose_id()?))
    }
}
