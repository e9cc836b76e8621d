use bevy_animation_runtime_core::NodeIndex;
use thiserror::Error;

use crate::value::GraphValueType;

/// Structural problems of a graph definition.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphValidationError {
    #[error("Graph has no nodes")]
    EmptyGraph,
    #[error("Graph has {0} nodes, more than a node index can address")]
    TooManyNodes(usize),
    #[error("Root node {0} does not exist")]
    MissingRootNode(NodeIndex),
    #[error("Root node {0} is not a pose node")]
    RootNodeNotPose(NodeIndex),
    #[error("Node {node} reads node {input}, which does not precede it")]
    InputNotTopologicallyOrdered { node: NodeIndex, input: NodeIndex },
    #[error("Node {node} expects a {expected:?} from node {input}, which outputs {found:?}")]
    InconsistentInputType {
        node: NodeIndex,
        input: NodeIndex,
        expected: GraphValueType,
        found: GraphValueType,
    },
    #[error("Control parameter {0:?} is declared twice")]
    DuplicateControlParameter(String),
    #[error("External graph slot {0:?} is declared twice")]
    DuplicateExternalGraphSlot(String),
    #[error("Node {0} declares a control parameter without a name")]
    UnnamedControlParameter(NodeIndex),
}
