use bevy_animation_runtime_core::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{NodeLike, ValueNode},
    value::{GraphValue, GraphValueType},
};

/// A value set from outside the graph, through
/// [`GraphInstance::set_control_parameter`].
///
/// [`GraphInstance::set_control_parameter`]: crate::graph_instance::GraphInstance::set_control_parameter
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ControlParameterNode {
    pub name: String,
    /// Initial value, which also fixes the parameter's type.
    pub default: GraphValue,
}

impl ControlParameterNode {
    pub fn new(name: impl Into<String>, default: GraphValue) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }
}

impl NodeLike for ControlParameterNode {
    fn display_name(&self) -> String {
        format!("⚙ {}", self.name)
    }

    fn output_type(&self) -> GraphValueType {
        self.default.value_type()
    }
}

impl ValueNode for ControlParameterNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        ctx.control_parameter(&self.name).cloned()
    }
}
