use bevy::{
    math::Vec3,
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_runtime_core::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    context::GraphContext,
    errors::GraphResult,
    nodes::{NodeLike, ValueNode},
    value::{GraphValue, GraphValueType, Target},
};

/// Builds a vector from up to three float inputs. Missing components are 0.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VectorCreateNode {
    #[serde(default)]
    pub x: Option<NodeIndex>,
    #[serde(default)]
    pub y: Option<NodeIndex>,
    #[serde(default)]
    pub z: Option<NodeIndex>,
}

impl VectorCreateNode {
    pub fn new(x: Option<NodeIndex>, y: Option<NodeIndex>, z: Option<NodeIndex>) -> Self {
        Self { x, y, z }
    }

    fn component(ctx: &mut GraphContext, input: Option<NodeIndex>) -> GraphResult<f32> {
        match input {
            Some(input) => ctx.value(input),
            None => Ok(0.),
        }
    }
}

impl NodeLike for VectorCreateNode {
    fn display_name(&self) -> String {
        "Vec3".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Vector
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        [self.x, self.y, self.z]
            .into_iter()
            .flatten()
            .map(|input| (input, GraphValueType::Float))
            .collect()
    }
}

impl ValueNode for VectorCreateNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        let x = Self::component(ctx, self.x)?;
        let y = Self::component(ctx, self.y)?;
        let z = Self::component(ctx, self.z)?;
        Ok(GraphValue::Vector(Vec3::new(x, y, z)))
    }
}

#[derive(Reflect, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[reflect(Default)]
pub enum VectorInfoOutput {
    #[default]
    X,
    Y,
    Z,
    Length,
    LengthSquared,
    /// Length of the projection onto the ground (XZ) plane.
    HorizontalLength,
    /// Heading angle around +Y in radians, 0 facing +Z.
    Heading,
}

/// Extracts a scalar from a vector.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VectorInfoNode {
    pub input: NodeIndex,
    pub info: VectorInfoOutput,
}

impl VectorInfoNode {
    pub fn new(input: NodeIndex, info: VectorInfoOutput) -> Self {
        Self { input, info }
    }
}

impl NodeLike for VectorInfoNode {
    fn display_name(&self) -> String {
        format!("Vec3 {:?}", self.info)
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Float
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![(self.input, GraphValueType::Vector)]
    }
}

impl ValueNode for VectorInfoNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        let v: Vec3 = ctx.value(self.input)?;
        let value = match self.info {
            VectorInfoOutput::X => v.x,
            VectorInfoOutput::Y => v.y,
            VectorInfoOutput::Z => v.z,
            VectorInfoOutput::Length => v.length(),
            VectorInfoOutput::LengthSquared => v.length_squared(),
            VectorInfoOutput::HorizontalLength => v.with_y(0.).length(),
            VectorInfoOutput::Heading => v.x.atan2(v.z),
        };
        Ok(GraphValue::Float(value))
    }
}

/// Turns a world-space position into an IK target.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VectorToTargetNode {
    pub input: NodeIndex,
}

impl NodeLike for VectorToTargetNode {
    fn display_name(&self) -> String {
        "Vec3 → Target".into()
    }

    fn output_type(&self) -> GraphValueType {
        GraphValueType::Target
    }

    fn inputs(&self) -> Vec<(NodeIndex, GraphValueType)> {
        vec![(self.input, GraphValueType::Vector)]
    }
}

impl ValueNode for VectorToTargetNode {
    fn value(&self, ctx: &mut GraphContext, _: NodeIndex) -> GraphResult<GraphValue> {
        let position: Vec3 = ctx.value(self.input)?;
        Ok(GraphValue::Target(Target::Point(position)))
    }
}
