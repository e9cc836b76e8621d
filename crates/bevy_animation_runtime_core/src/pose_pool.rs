use std::sync::Arc;

use bevy::{log::debug, reflect::Reflect};

use crate::{
    pose::{Pose, PoseType},
    skeleton::Skeleton,
};

pub const INITIAL_POSE_BUFFERS: usize = 6;
pub const POSE_BUFFER_GROWTH: usize = 3;
pub const MAX_POSE_BUFFERS: usize = 255;
pub const MAX_CACHED_POSES: usize = 64;

/// Index of a transient buffer in a [`PoseBufferPool`].
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoseBufferIndex(u8);

impl PoseBufferIndex {
    pub fn new(index: usize) -> Self {
        assert!(index < MAX_POSE_BUFFERS, "pose buffer index {index} out of range");
        Self(index as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable id of a cached pose buffer, valid across frames until destroyed.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CachedPoseId(u8);

impl CachedPoseId {
    pub fn new(id: usize) -> Self {
        assert!(id < MAX_CACHED_POSES, "cached pose id {id} out of range");
        Self(id as u8)
    }

    pub fn id(self) -> usize {
        self.0 as usize
    }

    fn bit(self) -> u64 {
        1 << self.0
    }
}

/// One primary pose plus one pose per secondary skeleton.
#[derive(Clone, Debug)]
pub struct PoseBuffer {
    poses: Vec<Pose>,
    is_used: bool,
}

impl PoseBuffer {
    fn new(skeletons: &[Arc<Skeleton>]) -> Self {
        let mut buffer = Self {
            poses: skeletons
                .iter()
                .map(|skeleton| Pose::new(skeleton.clone(), PoseType::ReferencePose))
                .collect(),
            is_used: false,
        };
        buffer.clear();
        buffer
    }

    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn primary(&self) -> &Pose {
        &self.poses[0]
    }

    pub fn primary_mut(&mut self) -> &mut Pose {
        &mut self.poses[0]
    }

    pub fn num_secondary(&self) -> usize {
        self.poses.len() - 1
    }

    pub fn secondary(&self, index: usize) -> Option<&Pose> {
        self.poses.get(index + 1)
    }

    pub fn secondary_mut(&mut self, index: usize) -> Option<&mut Pose> {
        self.poses.get_mut(index + 1)
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn poses_mut(&mut self) -> &mut [Pose] {
        &mut self.poses
    }

    pub fn reset_poses(&mut self, pose_type: PoseType) {
        for pose in &mut self.poses {
            pose.reset(pose_type);
        }
    }

    pub fn copy_from(&mut self, other: &PoseBuffer) {
        for (target, source) in self.poses.iter_mut().zip(&other.poses) {
            target.copy_from(source);
        }
    }

    fn clear(&mut self) {
        self.is_used = false;
        for pose in &mut self.poses {
            pose.clear();
        }
    }
}

#[derive(Debug)]
struct CachedPoseBuffer {
    id: CachedPoseId,
    buffer: PoseBuffer,
}

/// Arena of pose buffers lent out by index.
///
/// Transient buffers live for a single frame and are all released by
/// [`PoseBufferPool::reset`]. Cached buffers survive across frames until they
/// are destroyed, which only takes effect on the following reset.
#[derive(Debug)]
pub struct PoseBufferPool {
    skeletons: Vec<Arc<Skeleton>>,
    buffers: Vec<PoseBuffer>,
    first_free: usize,
    cached_buffers: Vec<CachedPoseBuffer>,
    live_cached_ids: u64,
    pending_cached_destroy: Vec<CachedPoseId>,
    is_recording: bool,
    recorded_poses: Vec<Option<PoseBuffer>>,
}

impl PoseBufferPool {
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        Self::with_secondary_skeletons(skeleton, Vec::new())
    }

    pub fn with_secondary_skeletons(
        skeleton: Arc<Skeleton>,
        secondary: Vec<Arc<Skeleton>>,
    ) -> Self {
        let mut skeletons = vec![skeleton];
        skeletons.extend(secondary);

        let buffers = (0..INITIAL_POSE_BUFFERS)
            .map(|_| PoseBuffer::new(&skeletons))
            .collect();

        Self {
            skeletons,
            buffers,
            first_free: 0,
            cached_buffers: Vec::new(),
            live_cached_ids: 0,
            pending_cached_destroy: Vec::new(),
            is_recording: false,
            recorded_poses: Vec::new(),
        }
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeletons[0]
    }

    pub fn secondary_skeletons(&self) -> &[Arc<Skeleton>] {
        &self.skeletons[1..]
    }

    /// Releases every transient buffer and applies pending cached buffer
    /// destructions. Called once at the start of every frame.
    pub fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.first_free = 0;

        for id in self.pending_cached_destroy.drain(..) {
            if let Some(cached) = self.cached_buffers.iter_mut().find(|c| c.id == id) {
                cached.buffer.clear();
            }
            self.live_cached_ids &= !id.bit();
        }

        self.recorded_poses.clear();
    }

    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn num_live_cached_buffers(&self) -> usize {
        self.live_cached_ids.count_ones() as usize
    }

    /// Number of buffers currently lent out, cached buffers included.
    pub fn used_count(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_used).count() + self.num_live_cached_buffers()
    }

    pub fn request_pose_buffer(&mut self) -> PoseBufferIndex {
        let index = match self.buffers[self.first_free..]
            .iter()
            .position(|b| !b.is_used)
        {
            Some(offset) => self.first_free + offset,
            None => {
                let index = self.buffers.len();
                self.grow();
                index
            }
        };

        self.buffers[index].is_used = true;
        self.first_free = index + 1;
        PoseBufferIndex::new(index)
    }

    fn grow(&mut self) {
        let new_len = self.buffers.len() + POSE_BUFFER_GROWTH;
        assert!(
            new_len <= MAX_POSE_BUFFERS,
            "pose buffer pool exhausted ({} buffers in use)",
            self.buffers.len()
        );
        debug!("Growing pose buffer pool to {new_len} buffers");
        let skeletons = &self.skeletons;
        self.buffers
            .extend((0..POSE_BUFFER_GROWTH).map(|_| PoseBuffer::new(skeletons)));
    }

    pub fn release_pose_buffer(&mut self, index: PoseBufferIndex) {
        let buffer = &mut self.buffers[index.index()];
        assert!(buffer.is_used, "pose buffer {} released twice", index.index());
        buffer.clear();
        self.first_free = self.first_free.min(index.index());
    }

    pub fn buffer(&self, index: PoseBufferIndex) -> &PoseBuffer {
        let buffer = &self.buffers[index.index()];
        assert!(buffer.is_used, "pose buffer {} is not in use", index.index());
        buffer
    }

    pub fn buffer_mut(&mut self, index: PoseBufferIndex) -> &mut PoseBuffer {
        let buffer = &mut self.buffers[index.index()];
        assert!(buffer.is_used, "pose buffer {} is not in use", index.index());
        buffer
    }

    /// Borrows a blend target mutably alongside its two sources.
    pub fn buffers_for_blend(
        &mut self,
        target: PoseBufferIndex,
        source_0: PoseBufferIndex,
        source_1: PoseBufferIndex,
    ) -> (&mut PoseBuffer, &PoseBuffer, &PoseBuffer) {
        assert!(
            target != source_0 && target != source_1 && source_0 != source_1,
            "blend buffers must be distinct"
        );

        let mut target_buffer = None;
        let mut source_0_buffer = None;
        let mut source_1_buffer = None;
        for (index, buffer) in self.buffers.iter_mut().enumerate() {
            if index == target.index() {
                target_buffer = Some(buffer);
            } else if index == source_0.index() {
                source_0_buffer = Some(&*buffer);
            } else if index == source_1.index() {
                source_1_buffer = Some(&*buffer);
            }
        }

        match (target_buffer, source_0_buffer, source_1_buffer) {
            (Some(t), Some(a), Some(b)) if t.is_used && a.is_used && b.is_used => (t, a, b),
            _ => panic!("blend buffers must all be in use"),
        }
    }

    pub fn create_cached_pose_buffer(&mut self) -> CachedPoseId {
        let free = (!self.live_cached_ids).trailing_zeros() as usize;
        assert!(free < MAX_CACHED_POSES, "too many cached pose buffers");
        let id = CachedPoseId::new(free);
        self.create_cached_pose_buffer_with_id(id);
        id
    }

    fn create_cached_pose_buffer_with_id(&mut self, id: CachedPoseId) -> &mut PoseBuffer {
        assert!(
            self.live_cached_ids & id.bit() == 0,
            "cached pose id {} is already live",
            id.id()
        );
        self.live_cached_ids |= id.bit();

        let slot = match self.cached_buffers.iter().position(|c| !c.buffer.is_used) {
            Some(slot) => slot,
            None => {
                self.cached_buffers.push(CachedPoseBuffer {
                    id,
                    buffer: PoseBuffer::new(&self.skeletons),
                });
                self.cached_buffers.len() - 1
            }
        };

        let cached = &mut self.cached_buffers[slot];
        cached.id = id;
        cached.buffer.clear();
        cached.buffer.is_used = true;
        &mut cached.buffer
    }

    /// Queues a cached buffer for destruction on the next [`Self::reset`].
    /// The buffer stays readable until then.
    pub fn destroy_cached_pose_buffer(&mut self, id: CachedPoseId) {
        assert!(
            self.live_cached_ids & id.bit() != 0,
            "cached pose id {} is not live",
            id.id()
        );
        assert!(
            !self.pending_cached_destroy.contains(&id),
            "cached pose id {} destroyed twice",
            id.id()
        );
        self.pending_cached_destroy.push(id);
    }

    pub fn is_cached_pose_id_live(&self, id: CachedPoseId) -> bool {
        self.live_cached_ids & id.bit() != 0
    }

    pub fn cached_pose_buffer(&self, id: CachedPoseId) -> Option<&PoseBuffer> {
        self.cached_buffers
            .iter()
            .find(|c| c.id == id && c.buffer.is_used)
            .map(|c| &c.buffer)
    }

    pub fn cached_pose_buffer_mut(&mut self, id: CachedPoseId) -> Option<&mut PoseBuffer> {
        self.cached_buffers
            .iter_mut()
            .find(|c| c.id == id && c.buffer.is_used)
            .map(|c| &mut c.buffer)
    }

    pub fn get_or_create_cached_pose_buffer(&mut self, id: CachedPoseId) -> &mut PoseBuffer {
        match self
            .cached_buffers
            .iter()
            .position(|c| c.id == id && c.buffer.is_used)
        {
            Some(slot) => &mut self.cached_buffers[slot].buffer,
            None => self.create_cached_pose_buffer_with_id(id),
        }
    }

    pub fn copy_to_cached(&mut self, id: CachedPoseId, source: PoseBufferIndex) {
        let source = &self.buffers[source.index()];
        assert!(source.is_used, "pose buffer is not in use");
        let cached = self
            .cached_buffers
            .iter_mut()
            .find(|c| c.id == id && c.buffer.is_used);
        match cached {
            Some(cached) => cached.buffer.copy_from(source),
            None => panic!("cached pose id {} is not live", id.id()),
        }
    }

    /// Copies a cached pose into a transient buffer. A cached buffer that was
    /// never written yields the reference pose.
    pub fn copy_from_cached(&mut self, id: CachedPoseId, target: PoseBufferIndex) {
        let target = &mut self.buffers[target.index()];
        assert!(target.is_used, "pose buffer is not in use");
        match self
            .cached_buffers
            .iter()
            .find(|c| c.id == id && c.buffer.is_used)
        {
            Some(cached) if cached.buffer.primary().is_pose_set() => {
                target.copy_from(&cached.buffer)
            }
            _ => target.reset_poses(PoseType::ReferencePose),
        }
    }

    pub fn set_recording_enabled(&mut self, enabled: bool) {
        self.is_recording = enabled;
        if !enabled {
            self.recorded_poses.clear();
        }
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Stores a copy of a buffer for debugging, keyed by task index.
    pub fn record_pose(&mut self, task_index: usize, source: PoseBufferIndex) {
        if !self.is_recording {
            return;
        }
        if self.recorded_poses.len() <= task_index {
            self.recorded_poses.resize(task_index + 1, None);
        }
        let mut copy = self.buffers[source.index()].clone();
        copy.is_used = false;
        self.recorded_poses[task_index] = Some(copy);
    }

    pub fn recorded_pose(&self, task_index: usize) -> Option<&PoseBuffer> {
        self.recorded_poses.get(task_index).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use bevy::{math::Vec3, transform::components::Transform};

    use super::*;
    use crate::skeleton::BoneDefinition;

    fn skeleton() -> Arc<Skeleton> {
        Arc::new(
            Skeleton::new(
                "pair",
                vec![
                    BoneDefinition::new("root", None, Transform::IDENTITY),
                    BoneDefinition::new("child", Some(0), Transform::from_xyz(0., 1., 0.)),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_requests_are_unique_and_released() {
        let mut pool = PoseBufferPool::new(skeleton());
        let before = pool.used_count();

        let indices: Vec<_> = (0..10).map(|_| pool.request_pose_buffer()).collect();
        let mut sorted = indices.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), indices.len());
        assert_eq!(pool.num_buffers(), 12);

        for index in indices {
            pool.release_pose_buffer(index);
        }
        assert_eq!(pool.used_count(), before);
    }

    #[test]
    fn test_release_rewinds_cursor() {
        let mut pool = PoseBufferPool::new(skeleton());
        let a = pool.request_pose_buffer();
        let b = pool.request_pose_buffer();
        let _c = pool.request_pose_buffer();

        pool.release_pose_buffer(a);
        assert_eq!(pool.request_pose_buffer(), a);

        pool.release_pose_buffer(b);
        assert_eq!(pool.request_pose_buffer(), b);
    }

    #[test]
    #[should_panic(expected = "released twice")]
    fn test_double_release_panics() {
        let mut pool = PoseBufferPool::new(skeleton());
        let a = pool.request_pose_buffer();
        pool.release_pose_buffer(a);
        pool.release_pose_buffer(a);
    }

    #[test]
    #[should_panic(expected = "pool exhausted")]
    fn test_capacity_is_capped() {
        let mut pool = PoseBufferPool::new(skeleton());
        for _ in 0..=MAX_POSE_BUFFERS {
            pool.request_pose_buffer();
        }
    }

    #[test]
    fn test_reset_keeps_cached_buffers() {
        let mut pool = PoseBufferPool::new(skeleton());
        pool.request_pose_buffer();
        pool.request_pose_buffer();
        pool.create_cached_pose_buffer();

        pool.reset();
        assert_eq!(pool.used_count(), pool.num_live_cached_buffers());
        assert_eq!(pool.used_count(), 1);
    }

    #[test]
    fn test_cached_destroy_is_deferred() {
        let mut pool = PoseBufferPool::new(skeleton());
        let id1 = pool.create_cached_pose_buffer();
        let id2 = pool.create_cached_pose_buffer();
        assert_ne!(id1, id2);

        let source = pool.request_pose_buffer();
        pool.buffer_mut(source)
            .primary_mut()
            .set_translation(0, Vec3::X);
        pool.copy_to_cached(id2, source);

        pool.destroy_cached_pose_buffer(id1);
        assert!(pool.cached_pose_buffer(id1).is_some(), "still readable this frame");

        pool.reset();
        assert!(!pool.is_cached_pose_id_live(id1));
        assert!(pool.cached_pose_buffer(id1).is_none());
        let held = pool.cached_pose_buffer(id2).unwrap();
        assert_eq!(held.primary().transform(0).translation, Vec3::X);

        // Lowest free id gets recycled
        assert_eq!(pool.create_cached_pose_buffer(), id1);
    }

    #[test]
    fn test_get_or_create_cached() {
        let mut pool = PoseBufferPool::new(skeleton());
        let id = CachedPoseId::new(5);
        assert!(pool.cached_pose_buffer(id).is_none());
        pool.get_or_create_cached_pose_buffer(id);
        assert!(pool.is_cached_pose_id_live(id));
        assert_eq!(pool.create_cached_pose_buffer(), CachedPoseId::new(0));
    }

    #[test]
    fn test_copy_from_unwritten_cache_is_reference() {
        let mut pool = PoseBufferPool::new(skeleton());
        let id = pool.create_cached_pose_buffer();
        let target = pool.request_pose_buffer();
        pool.copy_from_cached(id, target);
        assert!(pool.buffer(target).primary().is_reference_pose());
    }

    #[test]
    fn test_recording_is_decoupled() {
        let mut pool = PoseBufferPool::new(skeleton());
        pool.set_recording_enabled(true);
        let index = pool.request_pose_buffer();
        pool.buffer_mut(index).reset_poses(PoseType::ZeroPose);
        pool.record_pose(3, index);
        pool.release_pose_buffer(index);

        assert!(pool.recorded_pose(3).unwrap().primary().is_zero_pose());
        assert!(pool.recorded_pose(0).is_none());
        assert_eq!(pool.used_count(), 0);

        pool.reset();
        assert!(pool.recorded_pose(3).is_none());
    }

    #[test]
    fn test_secondary_poses() {
        let mut pool = PoseBufferPool::with_secondary_skeletons(skeleton(), vec![skeleton()]);
        let index = pool.request_pose_buffer();
        assert_eq!(pool.buffer(index).num_secondary(), 1);
        assert!(pool.buffer(index).secondary(0).is_some());
    }
}
