use std::sync::Arc;

use bevy::{math::Quat, transform::components::Transform};
use bevy_animation_runtime_core::{
    animation_clip::{AnimationClip, AnimationEvent},
    bone_mask::{BoneMaskDefinition, BoneMaskWeights},
    skeleton::{BoneDefinition, Skeleton},
};

use crate::{
    definition::{GraphDataSet, GraphDefinition},
    graph_instance::GraphInstance,
    nodes::{DefaultPoseNode, NodeSettings},
};

/// root -> hip -> knee -> foot, one unit apart along -Y.
pub fn leg_skeleton() -> Arc<Skeleton> {
    Arc::new(
        Skeleton::new(
            "leg",
            vec![
                BoneDefinition::new("root", None, Transform::IDENTITY),
                BoneDefinition::new("hip", Some(0), Transform::from_xyz(0., 2., 0.)),
                BoneDefinition::new("knee", Some(1), Transform::from_xyz(0., -1., 0.)),
                BoneDefinition::new("foot", Some(2), Transform::from_xyz(0., -1., 0.)),
            ],
        )
        .unwrap()
        .with_bone_mask(BoneMaskDefinition {
            id: "lower".into(),
            weights: BoneMaskWeights::Pattern {
                pattern: "knee|foot".into(),
                weight: 1.,
            },
        })
        .unwrap(),
    )
}

/// Clip moving the root bone from x = 0 to x = `distance`, with root motion
/// of `distance` along +Z. Fires "halfway" at the midpoint.
pub fn slide_clip(skeleton: &Arc<Skeleton>, duration: f32, distance: f32) -> Arc<AnimationClip> {
    let reference = skeleton.reference_pose().to_vec();
    let frames = (0..3)
        .map(|i| {
            let mut frame = reference.clone();
            frame[0].translation.x = distance * i as f32 / 2.;
            frame
        })
        .collect();
    let root_motion = (0..3)
        .map(|i| {
            Transform::from_xyz(0., 0., distance * i as f32 / 2.).with_rotation(Quat::IDENTITY)
        })
        .collect();
    Arc::new(
        AnimationClip::new("slide", skeleton.clone(), duration, frames)
            .unwrap()
            .with_root_motion(root_motion)
            .unwrap()
            .with_events(vec![AnimationEvent::immediate("halfway", 0.5)])
            .unwrap(),
    )
}

/// Evaluates the graph and runs both task passes with an identity world
/// transform.
pub fn run_frame(instance: &mut GraphInstance, delta_time: f32) {
    instance
        .evaluate_graph(delta_time, Transform::IDENTITY, None)
        .unwrap();
    instance.execute_pre_physics_pose_tasks(Transform::IDENTITY);
    instance.execute_post_physics_pose_tasks(Transform::IDENTITY);
}

/// Instance of `nodes` on the leg skeleton. A default pose root is inserted
/// as node 0, shifting the given nodes up by one.
pub fn value_graph(mut nodes: Vec<NodeSettings>) -> GraphInstance {
    nodes.insert(0, DefaultPoseNode::default().into());
    let definition = GraphDefinition::new(nodes, 0).unwrap();
    GraphInstance::new(Arc::new(definition), Arc::new(GraphDataSet::new(leg_skeleton()))).unwrap()
}
