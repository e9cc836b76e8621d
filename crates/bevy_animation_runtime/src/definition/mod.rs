mod data_set;
mod serial;

pub use data_set::*;
pub use serial::*;

use bevy_animation_runtime_core::NodeIndex;
use indexmap::IndexMap;

use crate::{
    errors::{GraphError, GraphResult, GraphValidationError},
    nodes::{NodeSettings, PoseNode, ValueNode},
    value::GraphValueType,
};

/// A compiled animation graph: the flattened node settings plus the root
/// pose node.
///
/// Nodes may only read nodes that precede them, so the settings array is in
/// topological order. Definitions are immutable and shared by every
/// [`GraphInstance`] created from them.
///
/// [`GraphInstance`]: crate::graph_instance::GraphInstance
#[derive(Debug, Clone, PartialEq)]
pub struct GraphDefinition {
    nodes: Vec<NodeSettings>,
    root_node: NodeIndex,
    /// Control parameter name to node, in authoring order.
    control_parameters: IndexMap<String, NodeIndex>,
    /// External graph slot name to node, in authoring order.
    external_graph_slots: IndexMap<String, NodeIndex>,
}

impl GraphDefinition {
    pub fn new(
        nodes: Vec<NodeSettings>,
        root_node: NodeIndex,
    ) -> Result<Self, GraphValidationError> {
        let mut definition = Self {
            nodes,
            root_node,
            control_parameters: IndexMap::new(),
            external_graph_slots: IndexMap::new(),
        };
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&mut self) -> Result<(), GraphValidationError> {
        if self.nodes.is_empty() {
            return Err(GraphValidationError::EmptyGraph);
        }
        if self.nodes.len() > NodeIndex::MAX as usize {
            return Err(GraphValidationError::TooManyNodes(self.nodes.len()));
        }
        match self.nodes.get(self.root_node as usize) {
            None => return Err(GraphValidationError::MissingRootNode(self.root_node)),
            Some(root) if !root.is_pose_node() => {
                return Err(GraphValidationError::RootNodeNotPose(self.root_node));
            }
            Some(_) => {}
        }

        for (index, settings) in self.nodes.iter().enumerate() {
            let node = index as NodeIndex;
            for (input, expected) in settings.as_node().inputs() {
                if input >= node {
                    return Err(GraphValidationError::InputNotTopologicallyOrdered { node, input });
                }
                let found = self.nodes[input as usize].as_node().output_type();
                if found != expected {
                    return Err(GraphValidationError::InconsistentInputType {
                        node,
                        input,
                        expected,
                        found,
                    });
                }
            }

            match settings {
                NodeSettings::ControlParameter(parameter) => {
                    if parameter.name.is_empty() {
                        return Err(GraphValidationError::UnnamedControlParameter(node));
                    }
                    if self
                        .control_parameters
                        .insert(parameter.name.clone(), node)
                        .is_some()
                    {
                        return Err(GraphValidationError::DuplicateControlParameter(
                            parameter.name.clone(),
                        ));
                    }
                }
                NodeSettings::ExternalGraph(external) => {
                    if self
                        .external_graph_slots
                        .insert(external.slot.clone(), node)
                        .is_some()
                    {
                        return Err(GraphValidationError::DuplicateExternalGraphSlot(
                            external.slot.clone(),
                        ));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn nodes(&self) -> &[NodeSettings] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, node: NodeIndex) -> &NodeSettings {
        &self.nodes[node as usize]
    }

    pub fn root_node(&self) -> NodeIndex {
        self.root_node
    }

    pub fn value_node(&self, node: NodeIndex) -> GraphResult<&dyn ValueNode> {
        self.node(node)
            .as_value_node()
            .ok_or(GraphError::ExpectedValueNode(node))
    }

    pub fn pose_node(&self, node: NodeIndex) -> GraphResult<&dyn PoseNode> {
        self.node(node)
            .as_pose_node()
            .ok_or(GraphError::ExpectedPoseNode(node))
    }

    pub fn output_type(&self, node: NodeIndex) -> GraphValueType {
        self.node(node).as_node().output_type()
    }

    pub fn control_parameters(&self) -> &IndexMap<String, NodeIndex> {
        &self.control_parameters
    }

    /// Position of a control parameter in authoring order.
    pub fn control_parameter_index(&self, name: &str) -> Option<usize> {
        self.control_parameters.get_index_of(name)
    }

    pub fn external_graph_slots(&self) -> &IndexMap<String, NodeIndex> {
        &self.external_graph_slots
    }

    pub fn external_graph_slot_index(&self, name: &str) -> Option<usize> {
        self.external_graph_slots.get_index_of(name)
    }

    /// First cached pose node of the graph, if any.
    pub fn find_cached_pose_node(&self) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .position(|n| matches!(n, NodeSettings::CachedPose(_)))
            .map(|index| index as NodeIndex)
    }
}

#[cfg(test)]
mod tests {
    use bevy_animation_runtime_core::task::PoseBlendMode;

    use super::*;
    use crate::{
        nodes::{
            BlendNode, ConstNode, ControlParameterNode, DefaultPoseNode, ExternalGraphNode,
            FloatMathNode, FloatMathOperator,
        },
        value::GraphValue,
    };

    fn blend_graph() -> Vec<NodeSettings> {
        vec![
            DefaultPoseNode::default().into(),
            DefaultPoseNode::zero_pose().into(),
            ControlParameterNode::new("weight", GraphValue::Float(0.5)).into(),
            BlendNode::new(0, 1, 2, PoseBlendMode::Interpolative).into(),
        ]
    }

    #[test]
    fn test_valid_graph() {
        let definition = GraphDefinition::new(blend_graph(), 3).unwrap();
        assert_eq!(definition.num_nodes(), 4);
        assert_eq!(definition.control_parameter_index("weight"), Some(0));
        assert!(definition.pose_node(3).is_ok());
        assert_eq!(
            definition.value_node(3).err(),
            Some(GraphError::ExpectedValueNode(3))
        );
    }

    #[test]
    fn test_rejects_bad_root() {
        assert_eq!(
            GraphDefinition::new(vec![], 0),
            Err(GraphValidationError::EmptyGraph)
        );
        assert_eq!(
            GraphDefinition::new(blend_graph(), 9),
            Err(GraphValidationError::MissingRootNode(9))
        );
        assert_eq!(
            GraphDefinition::new(blend_graph(), 2),
            Err(GraphValidationError::RootNodeNotPose(2))
        );
    }

    #[test]
    fn test_rejects_out_of_order_input() {
        let nodes = vec![
            BlendNode::new(1, 2, 3, PoseBlendMode::Interpolative).into(),
            DefaultPoseNode::default().into(),
            DefaultPoseNode::default().into(),
            ConstNode::new(GraphValue::Float(1.)).into(),
        ];
        assert_eq!(
            GraphDefinition::new(nodes, 0),
            Err(GraphValidationError::InputNotTopologicallyOrdered { node: 0, input: 1 })
        );
    }

    #[test]
    fn test_rejects_type_mismatch() {
        let nodes = vec![
            DefaultPoseNode::default().into(),
            ConstNode::new(GraphValue::Bool(true)).into(),
            BlendNode::new(0, 0, 1, PoseBlendMode::Interpolative).into(),
        ];
        assert_eq!(
            GraphDefinition::new(nodes, 2),
            Err(GraphValidationError::InconsistentInputType {
                node: 2,
                input: 1,
                expected: GraphValueType::Float,
                found: GraphValueType::Bool,
            })
        );

        let nodes = vec![
            DefaultPoseNode::default().into(),
            FloatMathNode::new(0, None, 1., FloatMathOperator::Add).into(),
        ];
        assert_eq!(
            GraphDefinition::new(nodes, 0),
            Err(GraphValidationError::InconsistentInputType {
                node: 1,
                input: 0,
                expected: GraphValueType::Float,
                found: GraphValueType::Pose,
            })
        );
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut nodes = blend_graph();
        nodes.push(ControlParameterNode::new("weight", GraphValue::Float(0.)).into());
        assert_eq!(
            GraphDefinition::new(nodes, 3),
            Err(GraphValidationError::DuplicateControlParameter("weight".into()))
        );

        let nodes = vec![
            ExternalGraphNode::new("layer").into(),
            ExternalGraphNode::new("layer").into(),
        ];
        assert_eq!(
            GraphDefinition::new(nodes, 0),
            Err(GraphValidationError::DuplicateExternalGraphSlot("layer".into()))
        );
    }
}
