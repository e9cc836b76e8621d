use bevy::{
    math::{Quat, Vec3},
    transform::components::Transform,
};

use crate::{
    errors::TaskSerializationError,
    pose_pool::PoseBufferIndex,
    skeleton::BoneIndex,
    space_conversion::TransformSpaceExt,
    task::{
        PoseTask, TaskContext, TaskDependencies, TaskUpdateStage,
        serialization::{DeserializableTask, TaskReader, TaskWriter},
    },
};

/// Bends the two bones above `effector` so the effector reaches a world
/// space target. Needs the post-physics character transform, so it only runs
/// after physics.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoBoneIkTask {
    pub effector: BoneIndex,
    /// `None` passes the pose through untouched.
    pub world_target: Option<Vec3>,
}

impl TwoBoneIkTask {
    pub const TYPE_NAME: &'static str = "TwoBoneIk";

    pub fn new(effector: BoneIndex, world_target: Option<Vec3>) -> Self {
        Self {
            effector,
            world_target,
        }
    }
}

impl PoseTask for TwoBoneIkTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn required_stage(&self) -> TaskUpdateStage {
        TaskUpdateStage::PostPhysics
    }

    fn execute(
        &mut self,
        ctx: &mut TaskContext,
        dependencies: &mut TaskDependencies,
    ) -> PoseBufferIndex {
        let buffer = dependencies.transfer_buffer(0);
        let Some(world_target) = self.world_target else {
            return buffer;
        };

        let pose = ctx.pool.buffer_mut(buffer).primary_mut();
        let skeleton = pose.skeleton().clone();
        let Some(mid) = skeleton.parent_index(self.effector) else {
            return buffer;
        };
        let Some(root) = skeleton.parent_index(mid) else {
            return buffer;
        };

        let target = ctx.world_transform_inverse.transform_point(world_target);
        let model = pose.model_space_transforms();
        let Some((out_end, out_mid, out_root)) =
            solve_two_bone_ik(model[self.effector], model[mid], model[root], target)
        else {
            return buffer;
        };

        let local_root = match skeleton.parent_index(root) {
            Some(parent) => model[parent].inverse() * out_root,
            None => out_root,
        };
        let local_mid = out_root.inverse() * out_mid;
        let local_end = out_mid.inverse() * out_end;

        pose.set_rotation(root, local_root.rotation);
        pose.set_rotation(mid, local_mid.rotation);
        pose.set_rotation(self.effector, local_end.rotation);

        buffer
    }

    fn serialize(&self, writer: &mut TaskWriter) {
        writer.write_u16(self.effector as u16);
        writer.write_bool(self.world_target.is_some());
        if let Some(target) = self.world_target {
            writer.write_vec3(target);
        }
    }

    fn debug_text(&self) -> String {
        format!("bone {} -> {:?}", self.effector, self.world_target)
    }
}

impl DeserializableTask for TwoBoneIkTask {
    const NUM_DEPENDENCIES: usize = 1;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError> {
        let effector = reader.read_bone_index()?;
        let world_target = if reader.read_bool()? {
            Some(reader.read_vec3()?)
        } else {
            None
        };
        Ok(Self::new(effector, world_target))
    }
}

/// Analytic two bone IK in model space. Returns the new end, mid and root
/// transforms, or `None` when the chain is degenerate.
pub fn solve_two_bone_ik(
    end: Transform,
    mid: Transform,
    root: Transform,
    target: Vec3,
) -> Option<(Transform, Transform, Transform)> {
    const MAX_LEN_OFFSET: f32 = 0.01;

    let in_end_loc = end.translation;
    let in_mid_loc = mid.translation;
    let in_root_loc = root.translation;

    let upper_len = in_root_loc.distance(in_mid_loc);
    let lower_len = in_mid_loc.distance(in_end_loc);
    let max_len = upper_len + lower_len - MAX_LEN_OFFSET;

    let to_end = (in_end_loc - in_root_loc).try_normalize()?;
    // A fully straight chain has no bend plane, so pick one.
    let in_pole_vec = (in_mid_loc - in_root_loc)
        .reject_from(to_end)
        .try_normalize()
        .unwrap_or_else(|| to_end.any_orthonormal_vector());

    let to_target_offset = (target - in_root_loc).clamp_length_max(max_len);
    let to_target_dist = to_target_offset.length();
    let to_target = to_target_offset.try_normalize()?;

    let to_target_swing = Quat::from_rotation_arc(to_end, to_target);
    let out_pole_vec = to_target_swing * in_pole_vec;

    // Law of cosines for the angle at the root
    let denom = 2. * upper_len * to_target_dist;
    let cos_angle = if denom > f32::EPSILON {
        ((to_target_dist * to_target_dist + upper_len * upper_len - lower_len * lower_len) / denom)
            .clamp(-1., 1.)
    } else {
        0.
    };
    let angle = cos_angle.acos();

    let pole_dist = upper_len * angle.sin();
    let eff_dist = upper_len * cos_angle;
    let out_end_loc = in_root_loc + to_target_offset;
    let out_mid_loc = in_root_loc + eff_dist * to_target + pole_dist * out_pole_vec;

    let in_to_mid = (in_mid_loc - in_root_loc).try_normalize()?;
    let out_to_mid = (out_mid_loc - in_root_loc).try_normalize()?;
    let root_swing = Quat::from_rotation_arc(in_to_mid, out_to_mid);
    let in_end_loc_with_root_swing = in_root_loc + root_swing * (in_end_loc - in_root_loc);
    let to_in_end = (in_end_loc_with_root_swing - out_mid_loc).try_normalize()?;
    let to_out_end = (out_end_loc - out_mid_loc).try_normalize()?;
    let mid_swing = Quat::from_rotation_arc(to_in_end, to_out_end) * root_swing;

    let out_root = Transform {
        rotation: root_swing * root.rotation,
        ..root
    };
    let out_mid = Transform {
        translation: out_mid_loc,
        rotation: mid_swing * mid.rotation,
        ..mid
    };
    let out_end = Transform {
        translation: out_end_loc,
        rotation: mid_swing * end.rotation,
        ..end
    };

    Some((out_end, out_mid, out_root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachable_target_is_reached() {
        let root = Transform::from_xyz(0., 2., 0.);
        let mid = Transform::from_xyz(0.1, 1., 0.);
        let end = Transform::from_xyz(0., 0., 0.);
        let target = Vec3::new(0.6, 0.8, 0.3);

        let (out_end, out_mid, out_root) = solve_two_bone_ik(end, mid, root, target).unwrap();

        assert!(out_end.translation.abs_diff_eq(target, 1e-4));
        assert_eq!(out_root.translation, root.translation);
        let upper = root.translation.distance(mid.translation);
        assert!((out_root.translation.distance(out_mid.translation) - upper).abs() < 1e-4);
    }

    #[test]
    fn test_unreachable_target_stretches_towards_it() {
        let root = Transform::from_xyz(0., 2., 0.);
        let mid = Transform::from_xyz(0., 1., 0.);
        let end = Transform::from_xyz(0., 0., 0.);
        let target = Vec3::new(10., 2., 0.);

        let (out_end, _, _) = solve_two_bone_ik(end, mid, root, target).unwrap();
        let direction = (out_end.translation - root.translation).normalize();
        assert!(direction.abs_diff_eq(Vec3::X, 1e-3));
    }

    #[test]
    fn test_degenerate_chain_is_rejected() {
        let t = Transform::from_xyz(1., 1., 1.);
        assert!(solve_two_bone_ik(t, t, t, Vec3::ZERO).is_none());
    }
}
