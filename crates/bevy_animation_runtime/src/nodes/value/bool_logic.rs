use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use bevy_animation_runtime_core::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{NodeLike, ValueNode},
    value::{GraphValue, GraphValueType},
};

#[derive(Reflect, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[reflect(Default)]
pub enum BoolLogicOperator {
    #[default]
    And,
    Or,
    /// Negates the first input.
    Not,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BoolLogicNode {
    pub operator: BoolLogicOperator,
    pub inputs: Vec<NodeIndex>,
}

impl BoolLogicNode {
    pub fn new(operator: BoolLogicOperator, inputs: Vec<NodeIndex>) -> Self {
        Self { operator, inputs }
    }
}

impl NodeLike for BoolLogicNode {
    fn display_name(&self) -> String {
        format!("{:?}", self.operator)
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Bool
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        self.inputs
            .iter()
            .map(|input| (*input, GraphValueType::Bool))
            .collect()
    }
}

impl ValueNode for BoolLogicNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        // Every input is evaluated so their caches stay warm for other readers.
        let mut values = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            values.push(ctx.value::<bool>(*input)?);
        }

        let result = match self.operator {
            BoolLogicOperator::And => values.iter().all(|v| *v),
            BoolLogicOperator::Or => values.iter().any(|v| *v),
            BoolLogicOperator::Not => !values.first().copied().unwrap_or(false),
        };
        Ok(GraphValue::Bool(result))
    }
}
