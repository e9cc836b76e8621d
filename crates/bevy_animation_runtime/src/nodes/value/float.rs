use bevy::{
    log::warn,
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_runtime_core::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{NodeLike, ValueNode},
    value::{GraphValue, GraphValueType},
};

#[derive(Reflect, Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[reflect(Default)]
pub struct FloatRange {
    pub begin: f32,
    pub end: f32,
}

impl Default for FloatRange {
    fn default() -> Self {
        Self { begin: 0., end: 1. }
    }
}

impl FloatRange {
    pub fn new(begin: f32, end: f32) -> Self {
        Self { begin, end }
    }

    pub fn length(&self) -> f32 {
        self.end - self.begin
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.begin.min(self.end), self.begin.max(self.end))
    }

    /// Maps `value` from this range into `to`. A zero-length source range
    /// maps everything to the start of `to`.
    pub fn remap(&self, value: f32, to: &FloatRange) -> f32 {
        let length = self.length();
        if length.abs() <= f32::EPSILON {
            return to.begin;
        }
        let t = ((value - self.begin) / length).clamp(0., 1.);
        to.begin + t * to.length()
    }
}

#[derive(Reflect, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[reflect(Default)]
pub enum FloatMathOperator {
    #[default]
    Add,
    Sub,
    Mul,
    Div,
}

impl FloatMathOperator {
    fn symbol(&self) -> &'static str {
        match self {
            FloatMathOperator::Add => "+ Add",
            FloatMathOperator::Sub => "- Subtract",
            FloatMathOperator::Mul => "× Multiply",
            FloatMathOperator::Div => "÷ Divide",
        }
    }
}

/// Binary float arithmetic. The second operand is read from `input_b` when
/// set, and is the constant `value_b` otherwise.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FloatMathNode {
    pub input_a: NodeIndex,
    #[serde(default)]
    pub input_b: Option<NodeIndex>,
    #[serde(default)]
    pub value_b: f32,
    #[serde(default)]
    pub operator: FloatMathOperator,
    #[serde(default)]
    pub return_absolute: bool,
}

impl FloatMathNode {
    pub fn new(
        input_a: NodeIndex,
        input_b: Option<NodeIndex>,
        value_b: f32,
        operator: FloatMathOperator,
    ) -> Self {
        Self {
            input_a,
            input_b,
            value_b,
            operator,
            return_absolute: false,
        }
    }
}

impl NodeLike for FloatMathNode {
    fn display_name(&self) -> String {
        self.operator.symbol().into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Float
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        let mut inputs = vec![(self.input_a, GraphValueType::Float)];
        if let Some(input_b) = self.input_b {
            inputs.push((input_b, GraphValueType::Float));
        }
        inputs
    }
}

impl ValueNode for FloatMathNode {
    fn value(&self, ctx: &mut GraphContext, node: NodeIndex) -> GraphResult<GraphValue> {
        let a: f32 = ctx.value(self.input_a)?;
        let b = match self.input_b {
            Some(input_b) => ctx.value(input_b)?,
            None => self.value_b,
        };

        let result = match self.operator {
            FloatMathOperator::Add => a + b,
            FloatMathOperator::Sub => a - b,
            FloatMathOperator::Mul => a * b,
            FloatMathOperator::Div => {
                if b.abs() <= f32::EPSILON {
                    warn!("Node {node} divided {a} by zero, saturating");
                    f32::MAX
                } else {
                    a / b
                }
            }
        };

        Ok(GraphValue::Float(if self.return_absolute {
            result.abs()
        } else {
            result
        }))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FloatClampNode {
    pub input: NodeIndex,
    pub range: FloatRange,
}

impl NodeLike for FloatClampNode {
    fn display_name(&self) -> String {
        "Clamp".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Float
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![(self.input, GraphValueType::Float)]
    }
}

impl ValueNode for FloatClampNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        let value: f32 = ctx.value(self.input)?;
        Ok(GraphValue::Float(self.range.clamp(value)))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FloatRemapNode {
    pub input: NodeIndex,
    pub input_range: FloatRange,
    pub output_range: FloatRange,
}

impl NodeLike for FloatRemapNode {
    fn display_name(&self) -> String {
        "Remap".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Float
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![(self.input, GraphValueType::Float)]
    }
}

impl ValueNode for FloatRemapNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        let value: f32 = ctx.value(self.input)?;
        Ok(GraphValue::Float(
            self.input_range.remap(value, &self.output_range),
        ))
    }
}

#[derive(Reflect, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[reflect(Default)]
pub enum FloatComparison {
    #[default]
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FloatCompareNode {
    pub input_a: NodeIndex,
    #[serde(default)]
    pub input_b: Option<NodeIndex>,
    #[serde(default)]
    pub value_b: f32,
    #[serde(default)]
    pub comparison: FloatComparison,
    /// Tolerance for the equality checks.
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

fn default_epsilon() -> f32 {
    1e-5
}

impl Default for FloatCompareNode {
    fn default() -> Self {
        Self {
            input_a: 0,
            input_b: None,
            value_b: 0.,
            comparison: FloatComparison::default(),
            epsilon: default_epsilon(),
        }
    }
}

impl FloatCompareNode {
    pub fn new(input_a: NodeIndex, value_b: f32, comparison: FloatComparison) -> Self {
        Self {
            input_a,
            value_b,
            comparison,
            ..Default::default()
        }
    }
}

impl NodeLike for FloatCompareNode {
    fn display_name(&self) -> String {
        format!("{:?}", self.comparison)
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Bool
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        let mut inputs = vec![(self.input_a, GraphValueType::Float)];
        if let Some(input_b) = self.input_b {
            inputs.push((input_b, GraphValueType::Float));
        }
        inputs
    }
}

impl ValueNode for FloatCompareNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        let a: f32 = ctx.value(self.input_a)?;
        let b = match self.input_b {
            Some(input_b) => ctx.value(input_b)?,
            None => self.value_b,
        };

        let equal = (a - b).abs() <= self.epsilon;
        let result = match self.comparison {
            FloatComparison::Equal => equal,
            FloatComparison::NotEqual => !equal,
            FloatComparison::Greater => a > b && !equal,
            FloatComparison::GreaterEqual => a > b || equal,
            FloatComparison::Less => a < b && !equal,
            FloatComparison::LessEqual => a < b || equal,
        };
        Ok(GraphValue::Bool(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap() {
        let from = FloatRange::new(0., 10.);
        let to = FloatRange::new(1., 0.);
        assert_eq!(from.remap(2.5, &to), 0.75);
        assert_eq!(from.remap(20., &to), 0.);
        assert_eq!(from.remap(-1., &to), 1.);
    }

    #[test]
    fn test_remap_degenerate_range() {
        let from = FloatRange::new(3., 3.);
        let to = FloatRange::new(-1., 1.);
        assert_eq!(from.remap(3., &to), -1.);
        assert_eq!(from.remap(100., &to), -1.);
    }

    #[test]
    fn test_clamp_reversed_range() {
        let range = FloatRange::new(1., -1.);
        assert_eq!(range.clamp(5.), 1.);
        assert_eq!(range.clamp(-5.), -1.);
        assert_eq!(range.clamp(0.5), 0.5);
    }
}
