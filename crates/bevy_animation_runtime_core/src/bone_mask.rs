use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::SkeletonError;

/// How the weights of a [`BoneMask`] are authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoneMaskWeights {
    /// Explicit `(bone name, weight)` pairs. Bones not listed get weight 0.
    Explicit(Vec<(String, f32)>),
    /// Every bone whose name matches `pattern` gets `weight`, every other bone
    /// gets 0.
    Pattern { pattern: String, weight: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneMaskDefinition {
    pub id: String,
    pub weights: BoneMaskWeights,
}

/// Per-bone blend weights, resolved against a skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneMask {
    id: String,
    weights: Vec<f32>,
}

impl BoneMask {
    pub fn all(id: impl Into<String>, num_bones: usize) -> Self {
        Self {
            id: id.into(),
            weights: vec![1.; num_bones],
        }
    }

    pub fn none(id: impl Into<String>, num_bones: usize) -> Self {
        Self {
            id: id.into(),
            weights: vec![0.; num_bones],
        }
    }

    pub(crate) fn from_definition(
        definition: &BoneMaskDefinition,
        bone_names: &[String],
        bone_index: impl Fn(&str) -> Option<usize>,
    ) -> Result<Self, SkeletonError> {
        let mut mask = Self::none(definition.id.clone(), bone_names.len());

        match &definition.weights {
            BoneMaskWeights::Explicit(weights) => {
                for (bone, weight) in weights {
                    let index =
                        bone_index(bone).ok_or_else(|| SkeletonError::UnknownBone(bone.clone()))?;
                    mask.weights[index] = weight.clamp(0., 1.);
                }
            }
            BoneMaskWeights::Pattern { pattern, weight } => {
                let regex = Regex::new(pattern)?;
                for (index, name) in bone_names.iter().enumerate() {
                    if regex.is_match(name) {
                        mask.weights[index] = weight.clamp(0., 1.);
                    }
                }
            }
        }

        Ok(mask)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Weight of the given bone. Bones outside the mask have weight 0.
    pub fn weight(&self, bone: usize) -> f32 {
        self.weights.get(bone).copied().unwrap_or(0.)
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}
