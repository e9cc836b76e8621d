use std::sync::Arc;

use crate::{
    animation_clip::AnimationClip,
    errors::TaskSerializationError,
    pose::PoseType,
    pose_pool::PoseBufferIndex,
    task::{
        PoseTask, TaskContext, TaskDependencies,
        serialization::{DeserializableTask, TaskReader, TaskWriter},
    },
};

/// Samples an animation clip at a percentage through it.
#[derive(Debug, Clone)]
pub struct SampleTask {
    pub clip: Arc<AnimationClip>,
    /// Data slot the clip was resolved from, used to resolve it again when
    /// the task is deserialized.
    pub data_slot: u16,
    pub time: f32,
}

impl SampleTask {
    pub const TYPE_NAME: &'static str = "Sample";

    pub fn new(clip: Arc<AnimationClip>, data_slot: u16, time: f32) -> Self {
        Self {
            clip,
            data_slot,
            time,
        }
    }
}

impl PoseTask for SampleTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn execute(&mut self, ctx: &mut TaskContext, _: &mut TaskDependencies) -> PoseBufferIndex {
        let buffer_index = ctx.pool.request_pose_buffer();
        let buffer = ctx.pool.buffer_mut(buffer_index);
        self.clip.get_pose(self.time, buffer.primary_mut());
        for pose in buffer.poses_mut().iter_mut().skip(1) {
            pose.reset(PoseType::ReferencePose);
        }
        buffer_index
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_u16(self.data_slot);
        writer.write_f32(self.time);
    }

    fn debug_text(&self) -> String {
        format!("{} @ {:.3}", self.clip.name(), self.time)
    }
}

impl DeserializableTask for SampleTask {
    const NUM_DEPENDENCIES: usize = 0;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        let data_slot = reader.read_u16()?;
        let time = reader.read_f32()?;
        let clip = reader.animation_clip(data_slot)?;
        Ok(Self::new(clip, data_slot, time))
    }
}
