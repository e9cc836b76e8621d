use bevy::{
    math::{Quat, Vec3},
    transform::components::Transform,
};

use crate::{
    bone_mask::BoneMask,
    pose::{Pose, PoseState},
};

pub trait InterpolateLinear {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self;
}

impl InterpolateLinear for f32 {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        self + (other - self) * f
    }
}

impl InterpolateLinear for Vec3 {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        self.lerp(*other, f)
    }
}

impl InterpolateLinear for Quat {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        self.slerp(*other, f)
    }
}

impl InterpolateLinear for Transform {
    fn interpolate_linear(&self, other: &Self, f: f32) -> Self {
        Transform {
            translation: self.translation.interpolate_linear(&other.translation, f),
            rotation: self.rotation.interpolate_linear(&other.rotation, f),
            scale: self.scale.interpolate_linear(&other.scale, f),
        }
    }
}

pub struct LinearInterpolator<'a> {
    pub bone_mask: Option<&'a BoneMask>,
}

impl LinearInterpolator<'_> {
    /// Writes `source_0` blended towards `source_1` by `f` into `target`.
    pub fn interpolate_pose(&self, source_0: &Pose, source_1: &Pose, f: f32, target: &mut Pose) {
        let weights = self.bone_mask.map(BoneMask::weights);
        for (bone, ((out, a), b)) in target
            .transforms_mut()
            .iter_mut()
            .zip(source_0.transforms())
            .zip(source_1.transforms())
            .enumerate()
        {
            let weight = f * weights.map_or(1., |w| w.get(bone).copied().unwrap_or(0.));
            *out = a.interpolate_linear(b, weight);
        }

        let state = if source_0.is_additive() && source_1.is_additive() {
            PoseState::AdditivePose
        } else {
            PoseState::Pose
        };
        target.set_state(state);
    }
}
