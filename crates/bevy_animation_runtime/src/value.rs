use bevy::{
    math::Vec3,
    reflect::{Reflect, std_traits::ReflectDefault},
    transform::components::Transform,
};
use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, GraphResult};

/// Type of the output of a graph node.
#[derive(Reflect, Default, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[reflect(Default)]
pub enum GraphValueType {
    #[default]
    Pose,
    Bool,
    Float,
    Int,
    Id,
    Vector,
    Target,
}

/// A world space target, either a bare point or a full transform.
#[derive(Reflect, Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum Target {
    Point(Vec3),
    Transform(Transform),
}

impl Default for Target {
    fn default() -> Self {
        Self::Point(Vec3::ZERO)
    }
}

impl Target {
    pub fn position(&self) -> Vec3 {
        match self {
            Target::Point(point) => *point,
            Target::Transform(transform) => transform.translation,
        }
    }

    pub fn transform(&self) -> Transform {
        match self {
            Target::Point(point) => Transform::from_translation(*point),
            Target::Transform(transform) => *transform,
        }
    }
}

/// Output of a value node.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum GraphValue {
    Bool(bool),
    Float(f32),
    Int(i32),
    Id(String),
    Vector(Vec3),
    Target(Target),
}

impl Default for GraphValue {
    fn default() -> Self {
        Self::Float(0.)
    }
}

impl GraphValue {
    pub fn value_type(&self) -> GraphValueType {
        match self {
            GraphValue::Bool(_) => GraphValueType::Bool,
            GraphValue::Float(_) => GraphValueType::Float,
            GraphValue::Int(_) => GraphValueType::Int,
            GraphValue::Id(_) => GraphValueType::Id,
            GraphValue::Vector(_) => GraphValueType::Vector,
            GraphValue::Target(_) => GraphValueType::Target,
        }
    }

    /// Default value of a type. Poses are not values, so there is none for
    /// them.
    pub fn default_for(value_type: GraphValueType) -> Option<Self> {
        Some(match value_type {
            GraphValueType::Pose => return None,
            GraphValueType::Bool => GraphValue::Bool(false),
            GraphValueType::Float => GraphValue::Float(0.),
            GraphValueType::Int => GraphValue::Int(0),
            GraphValueType::Id => GraphValue::Id(String::new()),
            GraphValueType::Vector => GraphValue::Vector(Vec3::ZERO),
            GraphValueType::Target => GraphValue::Target(Target::default()),
        })
    }
}

/// Rust types a [`GraphValue`] can be unwrapped into.
pub trait GraphValueKind: Sized + Into<GraphValue> {
    const VALUE_TYPE: GraphValueType;

    fn from_value(value: GraphValue) -> GraphResult<Self>;
}

macro_rules! impl_value_kind {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for GraphValue {
            fn from(value: $ty) -> Self {
                GraphValue::$variant(value)
            }
        }

        impl GraphValueKind for $ty {
            const VALUE_TYPE: GraphValueType = GraphValueType::$variant;

            fn from_value(value: GraphValue) -> GraphResult<Self> {
                match value {
                    GraphValue::$variant(inner) => Ok(inner),
                    other => Err(GraphError::MismatchedDataType(
                        Self::VALUE_TYPE,
                        other.value_type(),
                    )),
                }
            }
        }
    };
}

impl_value_kind!(bool, Bool);
impl_value_kind!(f32, Float);
impl_value_kind!(i32, Int);
impl_value_kind!(String, Id);
impl_value_kind!(Vec3, Vector);
impl_value_kind!(Target, Target);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_matching_kind() {
        assert_eq!(f32::from_value(GraphValue::Float(2.5)), Ok(2.5));
        assert_eq!(
            String::from_value(GraphValue::Id("run".into())),
            Ok("run".to_string())
        );
    }

    #[test]
    fn test_unwrap_mismatched_kind() {
        assert_eq!(
            bool::from_value(GraphValue::Int(1)),
            Err(GraphError::MismatchedDataType(
                GraphValueType::Bool,
                GraphValueType::Int
            ))
        );
    }

    #[test]
    fn test_target_position() {
        let target = Target::Transform(Transform::from_xyz(1., 2., 3.));
        assert_eq!(target.position(), Vec3::new(1., 2., 3.));
        assert_eq!(
            Target::Point(Vec3::X).transform(),
            Transform::from_translation(Vec3::X)
        );
    }
}
