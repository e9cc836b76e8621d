use bevy_animation_runtime_core::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{NodeLike, ValueNode},
    value::{GraphValue, GraphValueType},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IdCompareNode {
    pub input: NodeIndex,
    pub comparand: String,
    #[serde(default)]
    pub negate: bool,
}

impl IdCompareNode {
    pub fn new(input: NodeIndex, comparand: impl Into<String>) -> Self {
        Self {
            input,
            comparand: comparand.into(),
            negate: false,
        }
    }
}

impl NodeLike for IdCompareNode {
    fn display_name(&self) -> String {
        let op = if self.negate { "≠" } else { "=" };
        format!("{op} {}", self.comparand)
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Bool
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![(self.input, GraphValueType::Id)]
    }
}

impl ValueNode for IdCompareNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        let id: String = ctx.value(self.input)?;
        Ok(GraphValue::Bool((id == self.comparand) != self.negate))
    }
}
