//! Graph node runtime.
//!
//! Nodes come in two flavours. Value nodes compute a [`GraphValue`] on
//! demand and are memoized per update by the [`GraphContext`]. Pose nodes
//! advance their time, sample events and register the [`Task`] that will
//! produce their pose once the task system runs.
//!
//! [`Task`]: bevy_animation_runtime_core::task::Task

pub mod pose;
pub mod value;

use std::fmt::Debug;

use bevy::transform::components::Transform;
use bevy_animation_runtime_core::{
    NodeIndex,
    sampled_events::SampledEventRange,
    sync_track::{SyncTrack, SyncTrackTimeRange},
    task::TaskIndex,
};
use serde::{Deserialize, Serialize};

pub use pose::*;
pub use value::*;

use crate::{
    context::{GraphContext, InstantiationContext},
    errors::GraphResult,
    value::{GraphValue, GraphValueType},
};

pub trait NodeLike: Send + Sync + Debug {
    /// The name of this node.
    fn display_name(&self) -> String;

    fn output_type(&self) -> GraphValueType;

    /// Nodes read by this node, each with the type it expects.
    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        Vec::new()
    }

    /// Resolves resources and creates the node's runtime state. Called once
    /// per graph instance.
    #[allow(unused_variables)]
    fn instantiate(&self, ctx: &mut InstantiationContext, node: NodeIndex) -> GraphResult<()> {
        Ok(())
    }
}

pub trait ValueNode: NodeLike {
    /// Computes the node's value. Only called on a cache miss, use
    /// [`GraphContext::value`] to read other nodes.
    fn value(&self, ctx: &mut GraphContext, node: NodeIndex) -> GraphResult<GraphValue>;
}

/// Result of updating a pose node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphPoseNodeResult {
    /// Task producing the node's pose.
    pub task_index: TaskIndex,
    pub sampled_event_range: SampledEventRange,
    pub root_motion_delta: Transform,
}

impl GraphPoseNodeResult {
    pub fn new(task_index: TaskIndex, sampled_event_range: SampledEventRange) -> Self {
        Self {
            task_index,
            sampled_event_range,
            root_motion_delta: Transform::IDENTITY,
        }
    }

    pub fn with_root_motion_delta(mut self, root_motion_delta: Transform) -> Self {
        self.root_motion_delta = root_motion_delta;
        self
    }
}

pub trait PoseNode: NodeLike {
    /// Resets the node's time to `initial_time` and initializes its pose
    /// inputs the same way.
    fn initialize(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        initial_time: f32,
    ) -> GraphResult<()> {
        ctx.reset_pose_node_time(node, initial_time);
        for (input, value_type) in self.inputs() {
            if value_type == GraphValueType::Pose {
                ctx.initialize_pose_node(input, initial_time)?;
            }
        }
        Ok(())
    }

    /// Advances the node and registers its task. A `sync_range` drives the
    /// node's time from a parent instead of from the delta time.
    ///
    /// Nodes that leave the pose untouched (time scaling, state events, or a
    /// warp or blend that degenerates to one input) register no task and
    /// return their input's task index instead, so a frame can hold fewer
    /// tasks than updated pose nodes.
    fn update(
        &self,
        ctx: &mut GraphContext,
        node: NodeIndex,
        sync_range: Option<&SyncTrackTimeRange>,
    ) -> GraphResult<GraphPoseNodeResult>;

    #[allow(unused_variables)]
    fn sync_track(&self, ctx: &GraphContext, node: NodeIndex) -> SyncTrack {
        SyncTrack::default()
    }

    /// Whether the node can produce a meaningful pose. Invalid nodes still
    /// produce the reference pose when updated.
    fn is_valid(&self, ctx: &GraphContext, _node: NodeIndex) -> bool {
        self.inputs()
            .into_iter()
            .filter(|(_, value_type)| *value_type == GraphValueType::Pose)
            .all(|(input, _)| ctx.is_pose_node_valid(input))
    }
}

macro_rules! node_settings {
    (
        values { $($value_variant:ident($value_ty:ty)),* $(,)? }
        poses { $($pose_variant:ident($pose_ty:ty)),* $(,)? }
    ) => {
        /// Settings of one node of a compiled graph.
        #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
        pub enum NodeSettings {
            $($value_variant($value_ty),)*
            $($pose_variant($pose_ty),)*
        }

        impl NodeSettings {
            pub fn as_node(&self) -> &dyn NodeLike {
                match self {
                    $(NodeSettings::$value_variant(n) => n,)*
                    $(NodeSettings::$pose_variant(n) => n,)*
                }
            }

            pub fn as_value_node(&self) -> Option<&dyn ValueNode> {
                match self {
                    $(NodeSettings::$value_variant(n) => Some(n),)*
                    _ => None,
                }
            }

            pub fn as_pose_node(&self) -> Option<&dyn PoseNode> {
                match self {
                    $(NodeSettings::$pose_variant(n) => Some(n),)*
                    _ => None,
                }
            }
        }

        $(
            impl From<$value_ty> for NodeSettings {
                fn from(value: $value_ty) -> Self {
                    NodeSettings::$value_variant(value)
                }
            }
        )*
        $(
            impl From<$pose_ty> for NodeSettings {
                fn from(value: $pose_ty) -> Self {
                    NodeSettings::$pose_variant(value)
                }
            }
        )*
    };
}

node_settings! {
    values {
        ControlParameter(ControlParameterNode),
        Const(ConstNode),
        FloatMath(FloatMathNode),
        FloatClamp(FloatClampNode),
        FloatRemap(FloatRemapNode),
        FloatCompare(FloatCompareNode),
        BoolLogic(BoolLogicNode),
        IdCompare(IdCompareNode),
        VectorCreate(VectorCreateNode),
        VectorInfo(VectorInfoNode),
        VectorToTarget(VectorToTargetNode),
    }
    poses {
        DefaultPose(DefaultPoseNode),
        AnimationClip(AnimationClipNode),
        AnimationPose(AnimationPoseNode),
        Blend(BlendNode),
        SpeedScale(SpeedScaleNode),
        State(StateNode),
        OrientationWarp(OrientationWarpNode),
        TwoBoneIk(TwoBoneIkNode),
        CachedPose(CachedPoseNode),
        ExternalGraph(ExternalGraphNode),
    }
}

impl NodeSettings {
    pub fn is_pose_node(&self) -> bool {
        self.as_pose_node().is_some()
    }

    pub fn is_value_node(&self) -> bool {
        self.as_value_node().is_some()
    }
}
