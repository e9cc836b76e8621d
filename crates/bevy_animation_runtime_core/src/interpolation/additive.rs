use bevy::{
    math::{Quat, Vec3},
    transform::components::Transform,
};

use crate::{
    bone_mask::BoneMask,
    pose::{Pose, PoseState},
};

pub trait InterpolateAdditive {
    /// Applies `additive` on top of `self`, scaled by `f`.
    fn interpolate_additive(&self, additive: &Self, f: f32) -> Self;
}

impl InterpolateAdditive for Quat {
    fn interpolate_additive(&self, additive: &Self, f: f32) -> Self {
        self.slerp(*additive * *self, f)
    }
}

impl InterpolateAdditive for Transform {
    fn interpolate_additive(&self, additive: &Self, f: f32) -> Self {
        Transform {
            translation: self.translation + additive.translation * f,
            rotation: self.rotation.interpolate_additive(&additive.rotation, f),
            scale: self.scale * Vec3::ONE.lerp(additive.scale, f),
        }
    }
}

pub struct AdditiveInterpolator<'a> {
    pub bone_mask: Option<&'a BoneMask>,
}

impl AdditiveInterpolator<'_> {
    /// Writes `base` with `additive` layered on top into `target`.
    pub fn interpolate_pose(&self, base: &Pose, additive: &Pose, f: f32, target: &mut Pose) {
        let weights = self.bone_mask.map(BoneMask::weights);
        for (bone, ((out, a), b)) in target
            .transforms_mut()
            .iter_mut()
            .zip(base.transforms())
            .zip(additive.transforms())
            .enumerate()
        {
            let weight = f * weights.map_or(1., |w| w.get(bone).copied().unwrap_or(0.));
            *out = if weight == 0. {
                *a
            } else {
                a.interpolate_additive(b, weight)
            };
        }

        let state = if base.is_additive() {
            PoseState::AdditivePose
        } else {
            PoseState::Pose
        };
        target.set_state(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_weight_applies_offset() {
        let base = Transform::from_xyz(1., 0., 0.);
        let additive = Transform::from_xyz(0., 2., 0.).with_rotation(Quat::from_rotation_y(0.5));

        let result = base.interpolate_additive(&additive, 1.);
        assert!(result.translation.abs_diff_eq(Vec3::new(1., 2., 0.), 1e-6));
        assert!(result.rotation.abs_diff_eq(Quat::from_rotation_y(0.5), 1e-6));
    }

    #[test]
    fn test_zero_weight_is_base() {
        let base = Transform::from_xyz(1., 0., 0.).with_scale(Vec3::splat(2.));
        let additive = Transform::from_xyz(0., 2., 0.).with_scale(Vec3::splat(3.));

        let result = base.interpolate_additive(&additive, 0.);
        assert!(result.translation.abs_diff_eq(base.translation, 1e-6));
        assert!(result.scale.abs_diff_eq(base.scale, 1e-6));
    }
}
