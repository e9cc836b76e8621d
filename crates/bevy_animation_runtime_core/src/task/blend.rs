use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use serde::{Deserialize, Serialize};

use crate::{
    errors::TaskSerializationError,
    interpolation::{additive::AdditiveInterpolator, linear::LinearInterpolator},
    pose_pool::PoseBufferIndex,
    task::{
        PoseTask, TaskContext, TaskDependencies,
        serialization::{DeserializableTask, TaskReader, TaskWriter},
    },
};

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum PoseBlendMode {
    /// Interpolate from the first source towards the second.
    #[default]
    Interpolative,
    /// Layer the second source, an additive pose, on top of the first.
    Additive,
}

impl PoseBlendMode {
    /// Interpolative weights live in `[0, 1]`, additive weights only need to
    /// be non-negative.
    pub fn clamp_weight(self, weight: f32) -> f32 {
        match self {
            PoseBlendMode::Interpolative => weight.clamp(0., 1.),
            PoseBlendMode::Additive => weight.max(0.),
        }
    }

    pub fn is_valid_weight(self, weight: f32) -> bool {
        weight.is_finite() && self.clamp_weight(weight) == weight
    }
}

/// Blends the buffers of its two dependencies into a new buffer, releasing
/// both sources.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendTask {
    pub weight: f32,
    pub mode: PoseBlendMode,
    pub bone_mask: Option<usize>,
}

impl BlendTask {
    pub const TYPE_NAME: &'static str = "Blend";

    pub fn new(weight: f32, mode: PoseBlendMode, bone_mask: Option<usize>) -> Self {
        Self {
            weight: mode.clamp_weight(weight),
            mode,
            bone_mask,
        }
    }
}

impl PoseTask for BlendTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn execute(
        &mut self,
        ctx: &mut TaskContext,
        dependencies: &mut TaskDependencies,
    ) -> PoseBufferIndex {
        let source_0 = dependencies.buffer_index(0);
        let source_1 = dependencies.buffer_index(1);
        let target = ctx.pool.request_pose_buffer();

        let skeleton = ctx.pool.skeleton().clone();
        let bone_mask = self.bone_mask.and_then(|index| skeleton.bone_mask(index));
        let (target_buffer, source_0_buffer, source_1_buffer) =
            ctx.pool.buffers_for_blend(target, source_0, source_1);

        for (pose_index, target_pose) in target_buffer.poses_mut().iter_mut().enumerate() {
            let a = &source_0_buffer.poses()[pose_index];
            let b = &source_1_buffer.poses()[pose_index];
            // Bone masks index the primary skeleton only
            let mask = if pose_index == 0 { bone_mask } else { None };
            match self.mode {
                PoseBlendMode::Interpolative => {
                    LinearInterpolator { bone_mask: mask }
                        .interpolate_pose(a, b, self.weight, target_pose)
                }
                PoseBlendMode::Additive => {
                    AdditiveInterpolator { bone_mask: mask }
                        .interpolate_pose(a, b, self.weight, target_pose)
                }
            }
        }

        dependencies.release_buffer(0, ctx.pool);
        dependencies.release_buffer(1, ctx.pool);
        target
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_f32(self.weight);
        writer.write_bool(self.mode == PoseBlendMode::Additive);
        writer.write_bone_mask(self.bone_mask);
    }

    fn debug_text(&self) -> String {
        format!("{:?} {:.3}", self.mode, self.weight)
    }
}

impl DeserializableTask for BlendTask {
    const NUM_DEPENDENCIES: usize = 2;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        let weight = reader.read_f32()?;
        let mode = if reader.read_bool()? {
            PoseBlendMode::Additive
        } else {
            PoseBlendMode::Interpolative
        };
        if !mode.is_valid_weight(weight) {
            return Err(TaskSerializationError::InvalidBlendWeight(weight));
        }
        let bone_mask = reader.read_bone_mask()?;
        Ok(Self::new(weight, mode, bone_mask))
    }
}
