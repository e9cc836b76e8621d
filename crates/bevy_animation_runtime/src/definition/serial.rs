use bevy_animation_runtime_core::NodeIndex;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use super::GraphDefinition;
use crate::{errors::GraphLoaderError, nodes::NodeSettings};

/// On-disk form of a [`GraphDefinition`]. The name maps are rebuilt from the
/// nodes when loading, so only the nodes and the root are stored.
#[derive(Serialize, Deserialize)]
pub struct GraphDefinitionSerial {
    pub root_node: NodeIndex,
    pub nodes: Vec<NodeSettings>,
}

impl From<&GraphDefinition> for GraphDefinitionSerial {
    fn from(definition: &GraphDefinition) -> Self {
        Self {
            root_node: definition.root_node(),
            nodes: definition.nodes().to_vec(),
        }
    }
}

impl GraphDefinition {
    pub fn from_ron(source: &str) -> Result<Self, GraphLoaderError> {
        let serial: GraphDefinitionSerial = ron::de::from_str(source)?;
        Ok(GraphDefinition::new(serial.nodes, serial.root_node)?)
    }

    pub fn to_ron(&self) -> Result<String, GraphLoaderError> {
        let serial = GraphDefinitionSerial::from(self);
        Ok(ron::ser::to_string_pretty(&serial, PrettyConfig::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GraphValidationError;

    const WALK_GRAPH: &str = r#"(
        root_node: 3,
        nodes: [
            ControlParameter((name: "speed", default: Float(1.0))),
            AnimationClip((data_slot: 0, allow_looping: true)),
            Const((value: Float(0.5))),
            SpeedScale((input: 1, multiplier: 0)),
        ],
    )"#;

    #[test]
    fn test_load_from_ron() {
        let definition = GraphDefinition::from_ron(WALK_GRAPH).unwrap();
        assert_eq!(definition.num_nodes(), 4);
        assert_eq!(definition.root_node(), 3);
        assert_eq!(definition.control_parameter_index("speed"), Some(0));
        assert!(matches!(
            definition.node(1),
            NodeSettings::AnimationClip(clip) if clip.allow_looping && clip.play_in_reverse.is_none()
        ));
    }

    #[test]
    fn test_ron_round_trip() {
        let definition = GraphDefinition::from_ron(WALK_GRAPH).unwrap();
        let ron = definition.to_ron().unwrap();
        assert_eq!(GraphDefinition::from_ron(&ron).unwrap(), definition);
    }

    #[test]
    fn test_load_reports_validation_errors() {
        let source = r#"(root_node: 0, nodes: [Const((value: Bool(true)))])"#;
        assert!(matches!(
            GraphDefinition::from_ron(source),
            Err(GraphLoaderError::InconsistentGraphError(
                GraphValidationError::RootNodeNotPose(0)
            ))
        ));
        assert!(matches!(
            GraphDefinition::from_ron("(root_node: 0"),
            Err(GraphLoaderError::RonSpannedError(_))
        ));
    }
}
