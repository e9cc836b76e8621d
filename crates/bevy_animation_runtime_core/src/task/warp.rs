use bevy::transform::components::Transform;

use crate::{
    errors::TaskSerializationError,
    pose_pool::PoseBufferIndex,
    task::{
        PoseTask, TaskContext, TaskDependencies,
        serialization::{DeserializableTask, TaskReader, TaskWriter},
    },
};

/// Applies an offset to the root bone of its dependency's pose.
///
/// Warping nodes compute the offset; the task only applies it.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpTask {
    pub root_offset: Transform,
}

impl WarpTask {
    pub const TYPE_NAME: &'static str = "Warp";

    pub fn new(root_offset: Transform) -> Self {
        Self { root_offset }
    }
}

impl PoseTask for WarpTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn execute(
        &mut self,
        ctx: &mut TaskContext,
        dependencies: &mut TaskDependencies,
    ) -> PoseBufferIndex {
        let buffer = dependencies.transfer_buffer(0);
        let pose = ctx.pool.buffer_mut(buffer).primary_mut();
        let root = pose.transform(0);
        pose.set_transform(0, self.root_offset * root);
        buffer
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_transform(&self.root_offset);
    }

    fn debug_text(&self) -> String {
        format!(
            "offset {:?} / {:?}",
            self.root_offset.translation, self.root_offset.rotation
        )
    }
}

impl DeserializableTask for WarpTask {
    const NUM_DEPENDENCIES: usize = 1;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        Ok(Self::new(reader.read_transform()?))
    }
}
