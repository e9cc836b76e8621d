use std::sync::Arc;

use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
    transform::components::Transform,
};
use serde::{Deserialize, Serialize};

use crate::{
    skeleton::{BoneIndex, Skeleton},
    space_conversion::local_to_model_space,
};

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum PoseState {
    /// Released or freshly allocated; the transforms are stale.
    #[default]
    Unset,
    ReferencePose,
    ZeroPose,
    Pose,
    AdditivePose,
}

/// Pose a buffer can be reset to.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum PoseType {
    #[default]
    ReferencePose,
    ZeroPose,
}

/// Local bone transforms for a single skeleton.
#[derive(Clone, Debug)]
pub struct Pose {
    skeleton: Arc<Skeleton>,
    local_transforms: Vec<Transform>,
    state: PoseState,
}

impl Pose {
    pub fn new(skeleton: Arc<Skeleton>, pose_type: PoseType) -> Self {
        let mut pose = Self {
            local_transforms: Vec::with_capacity(skeleton.num_bones()),
            skeleton,
            state: PoseState::Unset,
        };
        pose.reset(pose_type);
        pose
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn num_bones(&self) -> usize {
        self.local_transforms.len()
    }

    pub fn state(&self) -> PoseState {
        self.state
    }

    /// Whether the pose holds computed or reset data, as opposed to stale
    /// data left behind by a released buffer.
    pub fn is_pose_set(&self) -> bool {
        self.state != PoseState::Unset
    }

    pub fn is_additive(&self) -> bool {
        self.state == PoseState::AdditivePose
    }

    pub fn is_reference_pose(&self) -> bool {
        self.state == PoseState::ReferencePose
    }

    pub fn is_zero_pose(&self) -> bool {
        self.state == PoseState::ZeroPose
    }

    pub fn reset(&mut self, pose_type: PoseType) {
        self.local_transforms.clear();
        match pose_type {
            PoseType::ReferencePose => {
                self.local_transforms
                    .extend_from_slice(self.skeleton.reference_pose());
                self.state = PoseState::ReferencePose;
            }
            PoseType::ZeroPose => {
                self.local_transforms
                    .resize(self.skeleton.num_bones(), Transform::IDENTITY);
                self.state = PoseState::ZeroPose;
            }
        }
    }

    /// Marks the pose as stale without touching its memory.
    pub fn clear(&mut self) {
        self.state = PoseState::Unset;
    }

    /// Deep copy of another pose of the same skeleton.
    pub fn copy_from(&mut self, other: &Pose) {
        assert_eq!(
            self.num_bones(),
            other.num_bones(),
            "cannot copy a pose between skeletons of different sizes"
        );
        self.local_transforms.copy_from_slice(&other.local_transforms);
        self.state = other.state;
    }

    pub fn transform(&self, bone: BoneIndex) -> Transform {
        self.local_transforms[bone]
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.local_transforms
    }

    pub fn set_transform(&mut self, bone: BoneIndex, transform: Transform) {
        self.local_transforms[bone] = transform;
        self.mark_modified();
    }

    pub fn set_rotation(&mut self, bone: BoneIndex, rotation: Quat) {
        self.local_transforms[bone].rotation = rotation;
        self.mark_modified();
    }

    pub fn set_translation(&mut self, bone: BoneIndex, translation: Vec3) {
        self.local_transforms[bone].translation = translation;
        self.mark_modified();
    }

    /// Overwrites every local transform and sets the additive flag.
    pub fn set_transforms(
        &mut self,
        transforms: impl IntoIterator<Item = Transform>,
        additive: bool,
    ) {
        for (target, source) in self.local_transforms.iter_mut().zip(transforms) {
            *target = source;
        }
        self.state = if additive {
            PoseState::AdditivePose
        } else {
            PoseState::Pose
        };
    }

    pub(crate) fn transforms_mut(&mut self) -> &mut [Transform] {
        &mut self.local_transforms
    }

    pub(crate) fn set_state(&mut self, state: PoseState) {
        self.state = state;
    }

    fn mark_modified(&mut self) {
        if self.state != PoseState::AdditivePose {
            self.state = PoseState::Pose;
        }
    }

    pub fn model_space_transforms(&self) -> Vec<Transform> {
        local_to_model_space(&self.local_transforms, |bone| {
            self.skeleton.parent_index(bone)
        })
    }

    pub fn model_space_transform(&self, bone: BoneIndex) -> Transform {
        let mut transform = self.local_transforms[bone];
        let mut parent = self.skeleton.parent_index(bone);
        while let Some(index) = parent {
            transform = self.local_transforms[index] * transform;
            parent = self.skeleton.parent_index(index);
        }
        transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneDefinition;

    fn skeleton() -> Arc<Skeleton> {
        Arc::new(
            Skeleton::new(
                "chain",
                vec![
                    BoneDefinition::new("a", None, Transform::from_xyz(0., 1., 0.)),
                    BoneDefinition::new("b", Some(0), Transform::from_xyz(0., 1., 0.)),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_reset_states() {
        let mut pose = Pose::new(skeleton(), PoseType::ReferencePose);
        assert!(pose.is_reference_pose());
        assert_eq!(pose.transform(1).translation, Vec3::Y);

        pose.reset(PoseType::ZeroPose);
        assert!(pose.is_zero_pose());
        assert_eq!(pose.transform(1), Transform::IDENTITY);

        pose.clear();
        assert!(!pose.is_pose_set());
    }

    #[test]
    fn test_modification_marks_pose() {
        let mut pose = Pose::new(skeleton(), PoseType::ReferencePose);
        pose.set_translation(0, Vec3::X);
        assert_eq!(pose.state(), PoseState::Pose);

        pose.set_transforms([Transform::IDENTITY; 2], true);
        pose.set_rotation(1, Quat::from_rotation_x(0.3));
        assert!(pose.is_additive());
    }

    #[test]
    fn test_copy_is_deep() {
        let mut a = Pose::new(skeleton(), PoseType::ReferencePose);
        let mut b = Pose::new(skeleton(), PoseType::ZeroPose);
        b.copy_from(&a);
        a.set_translation(0, Vec3::Z);

        assert_eq!(b.transform(0).translation, Vec3::Y);
        assert!(b.is_reference_pose());
    }

    #[test]
    fn test_model_space() {
        let pose = Pose::new(skeleton(), PoseType::ReferencePose);
        let model = pose.model_space_transforms();
        assert_eq!(model[1].translation, Vec3::new(0., 2., 0.));
        assert_eq!(pose.model_space_transform(1), model[1]);
    }
}
