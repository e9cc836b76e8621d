use bevy::transform::components::Transform;

pub trait TransformSpaceExt {
    /// Inverse of an affine transform, assuming it can be represented by a
    /// [`Transform`] (i.e. no shear).
    fn inverse(&self) -> Transform;

    /// Transform `delta` such that `self * delta == other`.
    fn delta_to(&self, other: &Transform) -> Transform;
}

impl TransformSpaceExt for Transform {
    fn inverse(&self) -> Transform {
        Transform::from_matrix(self.to_matrix().inverse())
    }

    fn delta_to(&self, other: &Transform) -> Transform {
        Transform::from_matrix(self.to_matrix().inverse() * other.to_matrix())
    }
}

/// Converts local (parent-relative) bone transforms into model space.
///
/// `parents` must list parents before their children.
pub fn local_to_model_space(
    locals: &[Transform],
    parents: impl Fn(usize) -> Option<usize>,
) -> Vec<Transform> {
    let mut model: Vec<Transform> = Vec::with_capacity(locals.len());
    for (bone, local) in locals.iter().enumerate() {
        let transform = match parents(bone) {
            Some(parent) => model[parent] * *local,
            None => *local,
        };
        model.push(transform);
    }
    model
}
