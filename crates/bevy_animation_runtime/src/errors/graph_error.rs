use bevy_animation_runtime_core::NodeIndex;
use thiserror::Error;

use crate::value::GraphValueType;

/// Possible errors that can be produced by graph instantiation and evaluation
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {0} is not a value node")]
    ExpectedValueNode(NodeIndex),
    #[error("Node {0} is not a pose node")]
    ExpectedPoseNode(NodeIndex),
    #[error("Tried to convert to incorrect data type: expected {0:?}, got {1:?}")]
    MismatchedDataType(GraphValueType, GraphValueType),
    #[error("Node {0} has no runtime state")]
    MissingStateValue(NodeIndex),
    #[error("Runtime state of node {0} has an unexpected type")]
    MismatchedStateType(NodeIndex),
    #[error("Unknown control parameter {0:?}")]
    UnknownControlParameter(String),
    #[error("Unknown external graph slot {0:?}")]
    UnknownExternalGraphSlot(String),
    #[error("External graph uses skeleton {found:?}, but the graph uses {expected:?}")]
    SkeletonMismatch { expected: String, found: String },
    #[error("External graphs cannot hold cached poses, node {0} is a cached pose node")]
    ExternalGraphUsesCachedPoses(NodeIndex),
    #[error("Bone {0:?} does not exist in the skeleton")]
    UnknownBone(String),
    #[error("Bone mask {0:?} does not exist in the skeleton")]
    UnknownBoneMask(String),
    #[error("Node {node} expected an animation clip in data slot {slot}")]
    MissingAnimationClip { node: NodeIndex, slot: u16 },
}

pub type GraphResult<T> = Result<T, GraphError>;
