use std::fmt::Debug;

use bevy::{platform::collections::HashMap, transform::components::Transform};

use crate::{
    bone_mask::{BoneMask, BoneMaskDefinition},
    errors::SkeletonError,
};

pub type BoneIndex = usize;

#[derive(Debug, Clone)]
pub struct BoneDefinition {
    pub name: String,
    pub parent: Option<BoneIndex>,
    pub reference_transform: Transform,
}

impl BoneDefinition {
    pub fn new(name: impl Into<String>, parent: Option<BoneIndex>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            reference_transform: transform,
        }
    }
}

/// Immutable bone hierarchy shared by poses and animation clips.
///
/// Bones are stored in an order where parents always precede their children,
/// so model-space transforms can be computed in a single forward pass.
#[derive(Clone)]
pub struct Skeleton {
    name: String,
    bone_names: Vec<String>,
    parent_indices: Vec<Option<BoneIndex>>,
    reference_pose: Vec<Transform>,
    name_to_index: HashMap<String, BoneIndex>,
    bone_masks: Vec<BoneMask>,
    preview_attachment_socket: Option<String>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>, bones: Vec<BoneDefinition>) -> Result<Self, SkeletonError> {
        if bones.is_empty() {
            return Err(SkeletonError::EmptySkeleton);
        }

        let mut skeleton = Self {
            name: name.into(),
            bone_names: Vec::with_capacity(bones.len()),
            parent_indices: Vec::with_capacity(bones.len()),
            reference_pose: Vec::with_capacity(bones.len()),
            name_to_index: HashMap::default(),
            bone_masks: Vec::new(),
            preview_attachment_socket: None,
        };

        for (index, bone) in bones.into_iter().enumerate() {
            if let Some(parent) = bone.parent
                && parent >= index
            {
                return Err(SkeletonError::ParentAfterChild {
                    bone: index,
                    parent,
                });
            }
            if skeleton
                .name_to_index
                .insert(bone.name.clone(), index)
                .is_some()
            {
                return Err(SkeletonError::DuplicateBoneName(bone.name));
            }
            skeleton.bone_names.push(bone.name);
            skeleton.parent_indices.push(bone.parent);
            skeleton.reference_pose.push(bone.reference_transform);
        }

        Ok(skeleton)
    }

    pub fn with_bone_mask(mut self, definition: BoneMaskDefinition) -> Result<Self, SkeletonError> {
        if self.bone_mask_index(&definition.id).is_some() {
            return Err(SkeletonError::DuplicateBoneMask(definition.id));
        }
        let mask = BoneMask::from_definition(&definition, &self.bone_names, |name| {
            self.name_to_index.get(name).copied()
        })?;
        self.bone_masks.push(mask);
        Ok(self)
    }

    pub fn with_preview_attachment_socket(mut self, socket: impl Into<String>) -> Self {
        self.preview_attachment_socket = Some(socket.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_bones(&self) -> usize {
        self.bone_names.len()
    }

    pub fn num_bone_masks(&self) -> usize {
        self.bone_masks.len()
    }

    pub fn bone_name(&self, bone: BoneIndex) -> Option<&str> {
        self.bone_names.get(bone).map(String::as_str)
    }

    pub fn bone_index(&self, name: &str) -> Option<BoneIndex> {
        self.name_to_index.get(name).copied()
    }

    pub fn parent_index(&self, bone: BoneIndex) -> Option<BoneIndex> {
        self.parent_indices.get(bone).copied().flatten()
    }

    /// Whether `parent` is a (possibly indirect) ancestor of `child`.
    pub fn is_child_of(&self, child: BoneIndex, parent: BoneIndex) -> bool {
        let mut current = self.parent_index(child);
        while let Some(bone) = current {
            if bone == parent {
                return true;
            }
            current = self.parent_index(bone);
        }
        false
    }

    pub fn reference_pose(&self) -> &[Transform] {
        &self.reference_pose
    }

    pub fn bone_mask(&self, index: usize) -> Option<&BoneMask> {
        self.bone_masks.get(index)
    }

    pub fn bone_mask_index(&self, id: &str) -> Option<usize> {
        self.bone_masks.iter().position(|mask| mask.id() == id)
    }

    pub fn preview_attachment_socket(&self) -> Option<&str> {
        self.preview_attachment_socket.as_deref()
    }

    fn indent(f: &mut std::fmt::Formatter<'_>, level: u32) -> std::fmt::Result {
        if level == 0 {
            return Ok(());
        }
        for _ in 0..(level - 1) {
            write!(f, "┃ ")?;
        }
        write!(f, "┣━")?;
        Ok(())
    }

    fn fmt_level(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        level: u32,
        parent: Option<BoneIndex>,
    ) -> std::fmt::Result {
        let children = self
            .parent_indices
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == parent)
            .map(|(index, _)| index);
        for child in children {
            Self::indent(f, level)?;
            writeln!(f, "🦴 {:?} [{}]", self.bone_names[child], child)?;
            self.fmt_level(f, level + 1, Some(child))?;
        }
        Ok(())
    }
}

impl Debug for Skeleton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Skeleton {:?} hierarchy:", self.name)?;
        self.fmt_level(f, 0, None)
    }
}
