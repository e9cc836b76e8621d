use std::sync::Arc;

use bevy_animation_runtime_core::{
    animation_clip::AnimationClip, skeleton::Skeleton, task::serialization::TaskResourceProvider,
};

#[derive(Debug, Clone)]
pub enum GraphResource {
    AnimationClip(Arc<AnimationClip>),
    Skeleton(Arc<Skeleton>),
}

/// Resources a graph instance binds its nodes to, addressed by data slot.
///
/// Nodes only store slot indices, so the same definition can be instantiated
/// against different data sets (e.g. one per character variant).
#[derive(Debug, Clone)]
pub struct GraphDataSet {
    skeleton: Arc<Skeleton>,
    secondary_skeletons: Vec<Arc<Skeleton>>,
    resources: Vec<Option<GraphResource>>,
}

impl GraphDataSet {
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        Self {
            skeleton,
            secondary_skeletons: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_secondary_skeleton(mut self, skeleton: Arc<Skeleton>) -> Self {
        self.secondary_skeletons.push(skeleton);
        self
    }

    /// Appends a resource, taking the next free slot.
    pub fn with_resource(mut self, resource: GraphResource) -> Self {
        self.resources.push(Some(resource));
        self
    }

    pub fn with_animation_clip(self, clip: Arc<AnimationClip>) -> Self {
        self.with_resource(GraphResource::AnimationClip(clip))
    }

    /// Binds `slot`, leaving any skipped slots empty.
    pub fn set_resource(&mut self, slot: u16, resource: Option<GraphResource>) {
        let slot = slot as usize;
        if self.resources.len() <= slot {
            self.resources.resize(slot + 1, None);
        }
        self.resources[slot] = resource;
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn secondary_skeletons(&self) -> &[Arc<Skeleton>] {
        &self.secondary_skeletons
    }

    pub fn num_slots(&self) -> usize {
        self.resources.len()
    }

    pub fn resource(&self, slot: u16) -> Option<&GraphResource> {
        self.resources.get(slot as usize).and_then(Option::as_ref)
    }

    pub fn animation_clip(&self, slot: u16) -> Option<&Arc<AnimationClip>> {
        match self.resource(slot) {
            Some(GraphResource::AnimationClip(clip)) => Some(clip),
            _ => None,
        }
    }

    pub fn skeleton_resource(&self, slot: u16) -> Option<&Arc<Skeleton>> {
        match self.resource(slot) {
            Some(GraphResource::Skeleton(skeleton)) => Some(skeleton),
            _ => None,
        }
    }
}

impl TaskResourceProvider for GraphDataSet {
    fn animation_clip(&self, data_slot: u16) -> Option<Arc<AnimationClip>> {
        GraphDataSet::animation_clip(self, data_slot).cloned()
    }
}
