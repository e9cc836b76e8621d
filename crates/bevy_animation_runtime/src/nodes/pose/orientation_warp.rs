use bevy::{
    math::{Quat, Vec3},
    transform::components::Transform,
};
use bevy_animation_runtime_core::{
    NodeIndex,
    sync_track::{SyncTrack, SyncTrackTimeRange},
    task::WarpTask,
};
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

const MIN_DIRECTION_LENGTH_SQUARED: f32 = 1e-6;

/// Turns the direction of travel of its input towards a character space
/// direction, rotating the root bone and the root motion to match.
///
/// The character keeps its facing. When either the target direction or the
/// input's horizontal root motion is too short, the input passes through.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OrientationWarpNode {
    pub input: NodeIndex,
    /// Vector value node.
    pub target_direction: NodeIndex,
}

impl OrientationWarpNode {
    pub fn new(input: NodeIndex, target_direction: NodeIndex) -> Self {
        Self {
            input,
            target_direction,
        }
    }

    /// Rotation around +Y taking the direction of `motion` onto `target`.
    pub fn warp_rotation(motion: Vec3, target: Vec3) -> Option<Quat> {
        let motion = motion.with_y(0.);
        let target = target.with_y(0.);
        if motion.length_squared() < MIN_DIRECTION_LENGTH_SQUARED
            || target.length_squared() < MIN_DIRECTION_LENGTH_SQUARED
        {
            return None;
        }
        Some(Quat::from_rotation_arc(motion.normalize(), target.normalize()))
    }
}

impl NodeLike for OrientationWarpNode {
    fn display_name(&self) -> String {
        "Orientation Warp".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![
            (self.input, GraphValueType::Pose),
            (self.target_direction, GraphValueType::Vector),
        ]
    }
}

impl PoseNode for OrientationWarpNode {
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let result = match sync_range {
            Some(range) => ctx.update_pose_node_synchronized(self.input, range)?,
            None => ctx.update_pose_node(self.input)?,
        };
        *ctx.pose_node_time_mut(node) = ctx.pose_node_time(self.input);

        let target: Vec3 = ctx.value(self.target_direction)?;
        let Some(rotation) = Self::warp_rotation(result.root_motion_delta.translation, target)
        else {
            return Ok(result);
        };

        let task_index = ctx.register_task(
            node,
            WarpTask::new(Transform::from_rotation(rotation)),
            vec![result.task_index],
        );
        let root_motion_delta = Transform {
            translation: rotation * result.root_motion_delta.translation,
            ..result.root_motion_delta
        };

        Ok(GraphPoseNodeResult::new(task_index, result.sampled_event_range)
            .with_root_motion_delta(root_motion_delta))
    }

    fn sync_track(&self, ctx: &GraphContext, _: NodeIndex) -> SyncTrack {
        ctx.sync_track(self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warp_rotation() {
        let rotation = OrientationWarpNode::warp_rotation(Vec3::Z, Vec3::X).unwrap();
        assert!((rotation * Vec3::Z).abs_diff_eq(Vec3::X, 1e-5));

        // Vertical components are ignored.
        let rotation =
            OrientationWarpNode::warp_rotation(Vec3::new(0., 5., 1.), Vec3::new(-1., -3., 0.))
                .unwrap();
        assert!((rotation * Vec3::Z).abs_diff_eq(Vec3::NEG_X, 1e-5));
    }

    #[test]
    fn test_no_warp_without_direction() {
        assert!(OrientationWarpNode::warp_rotation(Vec3::Z, Vec3::ZERO).is_none());
        assert!(OrientationWarpNode::warp_rotation(Vec3::Y, Vec3::X).is_none());
    }
}
