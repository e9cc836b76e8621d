use bevy_animation_runtime_core::{
    NodeIndex,
    interpolation::{additive::InterpolateAdditive, linear::InterpolateLinear},
    sync_track::{SyncTrack, SyncTrackTimeRange},
    task::{BlendTask, PoseBlendMode},
};
use serde::{Deserialize, Serialize};

use crate::{
    context::{BranchState, GraphContext, InstantiationContext, PoseNodeTime},
    errors::GraphResult,
    nodes::{GraphPoseNodeResult, NodeLike, PoseNode},
    value::GraphValueType,
};

/// Blends two poses, either interpolating from `source_0` towards
/// `source_1` or layering the additive `source_1` on top of `source_0`.
///
/// With `synchronize` set, `source_1` is driven by `source_0`'s sync track
/// instead of by the delta time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BlendNode {
    pub source_0: NodeIndex,
    pub source_1: NodeIndex,
    pub weight: NodeIndex,
    #[serde(default)]
    pub mode: PoseBlendMode,
    #[serde(default)]
    pub bone_mask: Option<String>,
    #[serde(default)]
    pub synchronize: bool,
}

#[derive(Debug)]
struct BlendState {
    bone_mask: Option<usize>,
}

impl BlendNode {
    pub fn new(
        source_0: NodeIndex,
        source_1: NodeIndex,
        weight: NodeIndex,
        mode: PoseBlendMode,
    ) -> Self {
        Self {
            source_0,
            source_1,
            weight,
            mode,
            bone_mask: None,
            synchronize: false,
        }
    }

    pub fn with_bone_mask(mut self, bone_mask: impl Into<String>) -> Self {
        self.bone_mask = Some(bone_mask.into());
        self
    }

    pub fn synchronized(mut self) -> Self {
        self.synchronize = true;
        self
    }

    fn update_source(
        ctx: &mut GraphContext,
        source: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        match sync_range {
            Some(range) => ctx.update_pose_node_synchronized(source, range),
            None => ctx.update_pose_node(source),
        }
    }

    /// Updates a single source in place of the blend.
    fn pass_through(
        ctx: &mut GraphContext,
        node: NodeIndex,
        source: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        let result = Self::update_source(ctx, source, sync_range)?;
        *ctx.pose_node_time_mut(node) = ctx.pose_node_time(source);
        Ok(result)
    }
}

impl NodeLike for BlendNode {
    fn display_name(&self) -> String {
        match self.mode {
            PoseBlendMode::Interpolative => "∑ Blend".into(),
            PoseBlendMode::Additive => "∑ Additive Blend".into(),
        }
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Pose
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![
            (self.source_0, GraphValueType::Pose),
            (self.source_1, GraphValueType::Pose),
            (self.weight, GraphValueType::Float),
        ]
    }

    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        let bone_mask = self
            .bone_mask
            .as_deref()
            .map(|id| ctx.bone_mask_index(id))
            .transpose()?;
        ctx.set_state(node, BlendState { bone_mask });
        Ok(())
    }
}

impl PoseNode for BlendNode {
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult> {
        if !ctx.is_pose_node_valid(self.source_1) {
            return Self::pass_through(ctx, node, self.source_0, sync_range);
        }
        if self.mode == PoseBlendMode::Interpolative && !ctx.is_pose_node_valid(self.source_0) {
            return Self::pass_through(ctx, node, self.source_1, sync_range);
        }

        let weight = self.mode.clamp_weight(ctx.value::<f32>(self.weight)?);
        let branch_state = |inactive: bool| {
            if inactive {
                BranchState::Inactive
            } else {
                BranchState::Active
            }
        };
        let state_0 = branch_state(self.mode == PoseBlendMode::Interpolative && weight >= 1.);
        let state_1 = branch_state(weight <= 0.);

        let result_0 = ctx.with_branch_state(state_0, |ctx| {
            Self::update_source(ctx, self.source_0, sync_range)
        })?;
        let time_0 = ctx.pose_node_time(self.source_0);

        let result_1 = if self.synchronize {
            let sync_track = ctx.sync_track(self.source_0);
            let range = SyncTrackTimeRange {
                start: sync_track.get_time(time_0.previous_time),
                end: sync_track.get_time(time_0.current_time),
            };
            ctx.with_branch_state(state_1, |ctx| {
                ctx.update_pose_node_synchronized(self.source_1, &range)
            })?
        } else {
            ctx.with_branch_state(state_1, |ctx| {
                Self::update_source(ctx, self.source_1, sync_range)
            })?
        };
        let time_1 = ctx.pose_node_time(self.source_1);

        let root_motion_delta = match self.mode {
            PoseBlendMode::Interpolative => {
                ctx.sampled_events_mut().blend_weights(
                    result_0.sampled_event_range,
                    result_1.sampled_event_range,
                    weight,
                );
                result_0
                    .root_motion_delta
                    .interpolate_linear(&result_1.root_motion_delta, weight)
            }
            PoseBlendMode::Additive => {
                ctx.sampled_events_mut()
                    .update_weights(result_1.sampled_event_range, weight);
                result_0
                    .root_motion_delta
                    .interpolate_additive(&result_1.root_motion_delta, weight)
            }
        };

        let duration = match self.mode {
            PoseBlendMode::Interpolative => {
                time_0.duration.interpolate_linear(&time_1.duration, weight)
            }
            PoseBlendMode::Additive => time_0.duration,
        };
        *ctx.pose_node_time_mut(node) = PoseNodeTime {
            duration,
            ..time_0
        };

        let bone_mask = ctx.state::<BlendState>(node)?.bone_mask;
        let task_index = ctx.register_task(
            node,
            BlendTask::new(weight, self.mode, bone_mask),
            vec![result_0.task_index, result_1.task_index],
        );

        Ok(GraphPoseNodeResult::new(
            task_index,
            result_0
                .sampled_event_range
                .combine(&result_1.sampled_event_range),
        )
        .with_root_motion_delta(root_motion_delta))
    }

    fn sync_track(&self, ctx: &GraphContext, _: NodeIndex) -> SyncTrack {
        ctx.sync_track(self.source_0)
    }

    fn is_valid(&self, ctx: &GraphContext, _: NodeIndex) -> bool {
        ctx.is_pose_node_valid(self.source_0) || ctx.is_pose_node_valid(self.source_1)
    }
}
