use bevy_animation_runtime_core::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{NodeLike, ValueNode},
    value::{GraphValue, GraphValueType},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ConstNode {
    pub value: GraphValue,
}

impl ConstNode {
    pub fn new(value: GraphValue) -> Self {
        Self { value }
    }
}

impl NodeLike for ConstNode {
    fn display_name(&self) -> String {
        format!("{:?}", self.value.value_type())
    }

    fn output_type(&self) -> GraphValueType {
        self.value.value_type()
    }
}

impl ValueNode for ConstNode {
    fn value(&self, _: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        Ok(self.value.clone())
    }
}
