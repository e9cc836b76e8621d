//! Compact bit-packed encoding of a frame's task list, for recording and
//! replaying animation without re-evaluating the graph.
//!
//! Stream layout, per task list:
//!
//! * task count (8 bits)
//! * per task: type id, source node (16 bits), dependency count (2 bits),
//!   dependency indices, then a type specific payload
//!
//! Type ids use as many bits as the registry needs, dependency indices as many
//! as the task count needs, and bone mask indices as many as the skeleton's
//! bone mask count needs.

use std::sync::Arc;

use bevy::{
    math::{Quat, Vec3},
    transform::components::Transform,
};

use crate::{
    NodeIndex,
    animation_clip::AnimationClip,
    errors::TaskSerializationError,
    pose_pool::{CachedPoseId, MAX_CACHED_POSES},
    skeleton::{BoneIndex, Skeleton},
    task::{
        BlendTask, CachedPoseReadTask, CachedPoseWriteTask, DefaultPoseTask, ExternalGraphTask,
        SampleTask, Task, TaskIndex, TaskKind, TwoBoneIkTask, WarpTask,
    },
};

const TASK_COUNT_BITS: u32 = 8;
const DEPENDENCY_COUNT_BITS: u32 = 2;

/// Resolves the resources tasks refer to by data slot.
pub trait TaskResourceProvider {
    fn animation_clip(&self, data_slot: u16) -> Option<Arc<AnimationClip>>;

    /// Resources of the child graph attached to an external graph slot. Tasks
    /// relayed from that child resolve their data slots through it.
    fn external_graph_resources(&self, _external_slot: u16) -> Option<&dyn TaskResourceProvider> {
        None
    }
}

/// Tasks that can be decoded from a task stream.
pub trait DeserializableTask: Sized + Into<TaskKind> {
    const NUM_DEPENDENCIES: usize;

    fn deserialize(reader: &mut TaskReader) -> Result<Self, TaskSerializationError>;
}

struct TaskTypeRegistration {
    type_name: &'static str,
    num_dependencies: usize,
    deserialize: fn(&mut TaskReader) -> Result<TaskKind, TaskSerializationError>,
}

const fn register<T: DeserializableTask>(type_name: &'static str) -> TaskTypeRegistration {
    TaskTypeRegistration {
        type_name,
        num_dependencies: T::NUM_DEPENDENCIES,
        deserialize: deserialize_kind::<T>,
    }
}

fn deserialize_kind<T: DeserializableTask>(
    reader: &mut TaskReader,
) -> Result<TaskKind, TaskSerializationError> {
    T::deserialize(reader).map(Into::into)
}

/// Single source of truth for task type ids: a task's id is its position here.
static TASK_TYPES: [TaskTypeRegistration; 8] = [
    register::<DefaultPoseTask>(DefaultPoseTask::TYPE_NAME),
    register::<SampleTask>(SampleTask::TYPE_NAME),
    register::<BlendTask>(BlendTask::TYPE_NAME),
    register::<WarpTask>(WarpTask::TYPE_NAME),
    register::<TwoBoneIkTask>(TwoBoneIkTask::TYPE_NAME),
    register::<CachedPoseWriteTask>(CachedPoseWriteTask::TYPE_NAME),
    register::<CachedPoseReadTask>(CachedPoseReadTask::TYPE_NAME),
    register::<ExternalGraphTask>(ExternalGraphTask::TYPE_NAME),
];

fn task_type_id(kind: &TaskKind) -> u32 {
    let name = kind.type_name();
    match TASK_TYPES.iter().position(|r| r.type_name == name) {
        Some(id) => id as u32,
        None => panic!("task type {name} is not registered for serialization"),
    }
}

/// Number of bits needed to store every value in `0..=max_value`.
pub fn bits_required(max_value: usize) -> u32 {
    (usize::BITS - max_value.leading_zeros()).max(1)
}

#[derive(Debug, Default, Clone)]
struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    fn write_bits(&mut self, value: u32, bits: u32) {
        debug_assert!(bits == 32 || value < (1 << bits), "{value} does not fit in {bits} bits");
        for bit in 0..bits {
            if self.bit_len % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> bit) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 1 << (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }
}

#[derive(Debug, Clone)]
struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl BitReader<'_> {
    fn read_bits(&mut self, bits: u32) -> Result<u32, TaskSerializationError> {
        let mut value = 0;
        for bit in 0..bits {
            let byte = *self
                .bytes
                .get(self.position / 8)
                .ok_or(TaskSerializationError::UnexpectedEndOfStream)?;
            if (byte >> (self.position % 8)) & 1 == 1 {
                value |= 1 << bit;
            }
            self.position += 1;
        }
        Ok(value)
    }
}

/// Field widths of one task list, fixed when the list is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStreamLayout {
    pub type_bits: u32,
    pub task_index_bits: u32,
    pub bone_mask_bits: u32,
}

impl TaskStreamLayout {
    pub fn new(num_tasks: usize, num_bone_masks: usize) -> Self {
        Self {
            type_bits: bits_required(TASK_TYPES.len() - 1),
            task_index_bits: bits_required(num_tasks.saturating_sub(1)),
            // Zero encodes "no mask"
            bone_mask_bits: bits_required(num_bone_masks),
        }
    }
}

pub struct TaskWriter {
    bits: BitWriter,
    layout: TaskStreamLayout,
    num_bone_masks: usize,
}

impl TaskWriter {
    pub fn new(num_bone_masks: usize) -> Self {
        Self {
            bits: BitWriter::default(),
            layout: TaskStreamLayout::new(0, num_bone_masks),
            num_bone_masks,
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.bits.bytes
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bits.write_bits(value as u32, 1);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bits.write_bits(value as u32, 16);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.bits.write_bits(value.to_bits(), 32);
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        for component in value.to_array() {
            self.write_f32(component);
        }
    }

    pub fn write_transform(&mut self, transform: &Transform) {
        self.write_vec3(transform.translation);
        for component in transform.rotation.to_array() {
            self.write_f32(component);
        }
        self.write_vec3(transform.scale);
    }

    pub fn write_bone_mask(&mut self, bone_mask: Option<usize>) {
        let value = bone_mask.map_or(0, |index| index + 1);
        self.bits.write_bits(value as u32, self.layout.bone_mask_bits);
    }

    pub fn write_cached_pose_id(&mut self, id: CachedPoseId) {
        self.bits
            .write_bits(id.id() as u32, bits_required(MAX_CACHED_POSES - 1));
    }
}

pub struct TaskReader<'a> {
    bits: BitReader<'a>,
    layout: TaskStreamLayout,
    num_bones: usize,
    num_bone_masks: usize,
    resources: &'a dyn TaskResourceProvider,
}

impl<'a> TaskReader<'a> {
    pub fn read_bool(&mut self) -> Result<bool, TaskSerializationError> {
        Ok(self.bits.read_bits(1)? == 1)
    }

    pub fn read_u16(&mut self) -> Result<u16, TaskSerializationError> {
        Ok(self.bits.read_bits(16)? as u16)
    }

    pub fn read_f32(&mut self) -> Result<f32, TaskSerializationError> {
        Ok(f32::from_bits(self.bits.read_bits(32)?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, TaskSerializationError> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_transform(&mut self) -> Result<Transform, TaskSerializationError> {
        let translation = self.read_vec3()?;
        let rotation = Quat::from_array([
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ]);
        let scale = self.read_vec3()?;
        Ok(Transform {
            translation,
            rotation,
            scale,
        })
    }

    pub fn read_bone_mask(&mut self) -> Result<Option<usize>, TaskSerializationError> {
        let value = self.bits.read_bits(self.layout.bone_mask_bits)? as usize;
        match value {
            0 => Ok(None),
            index if index <= self.num_bone_masks => Ok(Some(index - 1)),
            index => Err(TaskSerializationError::InvalidBoneMask(index - 1)),
        }
    }

    pub fn read_bone_index(&mut self) -> Result<BoneIndex, TaskSerializationError> {
        let bone = self.read_u16()? as BoneIndex;
        if bone < self.num_bones {
            Ok(bone)
        } else {
            Err(TaskSerializationError::InvalidBoneIndex(bone))
        }
    }

    pub fn read_cached_pose_id(&mut self) -> Result<CachedPoseId, TaskSerializationError> {
        let id = self.bits.read_bits(bits_required(MAX_CACHED_POSES - 1))?;
        Ok(CachedPoseId::new(id as usize))
    }

    pub fn animation_clip(
        &self,
        data_slot: u16,
    ) -> Result<Arc<AnimationClip>, TaskSerializationError> {
        self.resources
            .animation_clip(data_slot)
            .ok_or(TaskSerializationError::MissingAnimationClip(data_slot))
    }

    /// Decodes a nested task list whose data slots belong to the child graph
    /// attached to `external_slot`.
    pub fn read_external_task_list(
        &mut self,
        external_slot: u16,
    ) -> Result<Vec<Task>, TaskSerializationError> {
        let resources: &'a dyn TaskResourceProvider = self.resources;
        let child_resources = resources
            .external_graph_resources(external_slot)
            .ok_or(TaskSerializationError::MissingExternalGraph(external_slot))?;

        self.resources = child_resources;
        let tasks = deserialize_task_list(self);
        self.resources = resources;
        tasks
    }
}

/// Writes a task list, including its own header, into `writer`.
pub fn serialize_task_list(tasks: &[Task], writer: &mut TaskWriter) {
    let outer_layout = writer.layout;
    writer.layout = TaskStreamLayout::new(tasks.len(), writer.num_bone_masks);
    writer.bits.write_bits(tasks.len() as u32, TASK_COUNT_BITS);

    for task in tasks {
        writer
            .bits
            .write_bits(task_type_id(task.kind()), writer.layout.type_bits);
        writer.write_u16(task.source_node());
        writer
            .bits
            .write_bits(task.dependencies().len() as u32, DEPENDENCY_COUNT_BITS);
        for dependency in task.dependencies() {
            writer
                .bits
                .write_bits(dependency.index() as u32, writer.layout.task_index_bits);
        }
        task.kind().map(|t| t.serialize(writer));
    }

    writer.layout = outer_layout;
}

pub fn deserialize_task_list(reader: &mut TaskReader) -> Result<Vec<Task>, TaskSerializationError> {
    let outer_layout = reader.layout;
    let num_tasks = reader.bits.read_bits(TASK_COUNT_BITS)? as usize;
    reader.layout = TaskStreamLayout::new(num_tasks, reader.num_bone_masks);

    let mut tasks = Vec::with_capacity(num_tasks);
    for task_index in 0..num_tasks {
        let type_id = reader.bits.read_bits(reader.layout.type_bits)?;
        let registration = TASK_TYPES
            .get(type_id as usize)
            .ok_or(TaskSerializationError::UnknownTaskType(type_id))?;
        let source_node: NodeIndex = reader.read_u16()?;

        let num_dependencies = reader.bits.read_bits(DEPENDENCY_COUNT_BITS)? as usize;
        if num_dependencies != registration.num_dependencies {
            return Err(TaskSerializationError::DependencyCountMismatch {
                task_type: registration.type_name,
                expected: registration.num_dependencies,
                found: num_dependencies,
            });
        }
        let mut dependencies = Vec::with_capacity(num_dependencies);
        for _ in 0..num_dependencies {
            let dependency = reader.bits.read_bits(reader.layout.task_index_bits)? as usize;
            if dependency >= task_index {
                return Err(TaskSerializationError::InvalidDependency {
                    task: task_index,
                    dependency,
                });
            }
            dependencies.push(TaskIndex::new(dependency));
        }

        let kind = (registration.deserialize)(reader)?;
        tasks.push(Task::new(source_node, kind, dependencies));
    }

    reader.layout = outer_layout;
    Ok(tasks)
}

pub fn serialize_tasks(tasks: &[Task], num_bone_masks: usize) -> Vec<u8> {
    let mut writer = TaskWriter::new(num_bone_masks);
    serialize_task_list(tasks, &mut writer);
    writer.finish()
}

/// Decodes a task stream written for `skeleton`. Bone and bone mask indices
/// are checked against it.
pub fn deserialize_tasks(
    bytes: &[u8],
    skeleton: &Skeleton,
    resources: &dyn TaskResourceProvider,
) -> Result<Vec<Task>, TaskSerializationError> {
    let num_bone_masks = skeleton.num_bone_masks();
    let mut reader = TaskReader {
        bits: BitReader { bytes, position: 0 },
        layout: TaskStreamLayout::new(0, num_bone_masks),
        num_bones: skeleton.num_bones(),
        num_bone_masks,
        resources,
    };
    deserialize_task_list(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pose::PoseType,
        task::{PoseBlendMode, test_utils},
    };

    #[derive(Default)]
    struct Clips {
        clips: Vec<Arc<AnimationClip>>,
        external: Vec<Clips>,
    }

    impl Clips {
        fn new(clips: Vec<Arc<AnimationClip>>) -> Self {
            Self {
                clips,
                external: Vec::new(),
            }
        }
    }

    impl TaskResourceProvider for Clips {
        fn animation_clip(&self, data_slot: u16) -> Option<Arc<AnimationClip>> {
            self.clips.get(data_slot as usize).cloned()
        }

        fn external_graph_resources(
            &self,
            external_slot: u16,
        ) -> Option<&dyn TaskResourceProvider> {
            self.external
                .get(external_slot as usize)
                .map(|c| c as &dyn TaskResourceProvider)
        }
    }

    #[test]
    fn test_field_widths() {
        assert_eq!(bits_required(0), 1);
        assert_eq!(bits_required(1), 1);
        assert_eq!(bits_required(4), 3);
        assert_eq!(bits_required(254), 8);

        let layout = TaskStreamLayout::new(5, 1);
        assert_eq!(layout.task_index_bits, 3);
        assert_eq!(layout.bone_mask_bits, 1);
        assert_eq!(layout.type_bits, 3);
    }

    #[test]
    fn test_bits_round_trip() {
        let mut writer = BitWriter::default();
        writer.write_bits(5, 3);
        writer.write_bits(0xABCD, 16);
        writer.write_bits(1, 1);

        let mut reader = BitReader {
            bytes: &writer.bytes,
            position: 0,
        };
        assert_eq!(reader.read_bits(3), Ok(5));
        assert_eq!(reader.read_bits(16), Ok(0xABCD));
        assert_eq!(reader.read_bits(1), Ok(1));
        assert_eq!(writer.bytes.len(), 3);
        assert_eq!(reader.read_bits(8), Err(TaskSerializationError::UnexpectedEndOfStream));
    }

    #[test]
    fn test_task_list_decodes() {
        let skeleton = test_utils::leg_skeleton();
        let clip = test_utils::slide_clip(&skeleton, 1., 1.);
        let tasks = vec![
            Task::new(2, SampleTask::new(clip.clone(), 0, 0.25), vec![]),
            Task::new(3, DefaultPoseTask::new(PoseType::ZeroPose), vec![]),
            Task::new(
                4,
                BlendTask::new(0.5, PoseBlendMode::Additive, Some(0)),
                vec![TaskIndex::new(0), TaskIndex::new(1)],
            ),
            Task::new(
                5,
                ExternalGraphTask::new(
                    0,
                    vec![Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![])],
                ),
                vec![],
            ),
        ];

        let bytes = serialize_tasks(&tasks, skeleton.num_bone_masks());
        let resources = Clips {
            clips: vec![clip],
            external: vec![Clips::default()],
        };
        let decoded = deserialize_tasks(&bytes, &skeleton, &resources).unwrap();

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[2].dependencies(), &[TaskIndex::new(0), TaskIndex::new(1)]);
        assert_eq!(decoded[2].source_node(), 4);
        match decoded[2].kind() {
            TaskKind::Blend(blend) => {
                assert_eq!(blend, &BlendTask::new(0.5, PoseBlendMode::Additive, Some(0)))
            }
            other => panic!("unexpected task {other:?}"),
        }
        match decoded[0].kind() {
            TaskKind::Sample(sample) => assert_eq!(sample.time, 0.25),
            other => panic!("unexpected task {other:?}"),
        }
        match decoded[3].kind() {
            TaskKind::ExternalGraph(relay) => {
                assert_eq!(relay.external_slot(), 0);
                assert_eq!(relay.tasks().len(), 1);
            }
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[test]
    fn test_external_tasks_resolve_child_clips() {
        let skeleton = test_utils::leg_skeleton();
        let parent_clip = test_utils::slide_clip(&skeleton, 1., 1.);
        let child_clip = test_utils::slide_clip(&skeleton, 3., 5.);
        let tasks = vec![Task::new(
            0,
            ExternalGraphTask::new(
                1,
                vec![Task::new(0, SampleTask::new(child_clip.clone(), 0, 0.5), vec![])],
            ),
            vec![],
        )];
        let bytes = serialize_tasks(&tasks, skeleton.num_bone_masks());

        let resources = Clips {
            clips: vec![parent_clip],
            external: vec![Clips::default(), Clips::new(vec![child_clip.clone()])],
        };
        let decoded = deserialize_tasks(&bytes, &skeleton, &resources).unwrap();
        let TaskKind::ExternalGraph(relay) = decoded[0].kind() else {
            panic!("unexpected task {:?}", decoded[0].kind());
        };
        match relay.tasks()[0].kind() {
            TaskKind::Sample(sample) => assert!(Arc::ptr_eq(&sample.clip, &child_clip)),
            other => panic!("unexpected task {other:?}"),
        }

        let unbound = Clips::new(vec![test_utils::slide_clip(&skeleton, 1., 1.)]);
        assert_eq!(
            deserialize_tasks(&bytes, &skeleton, &unbound).unwrap_err(),
            TaskSerializationError::MissingExternalGraph(1)
        );
    }

    #[test]
    fn test_missing_clip_is_reported() {
        let skeleton = test_utils::leg_skeleton();
        let clip = test_utils::slide_clip(&skeleton, 1., 1.);
        let tasks = vec![Task::new(0, SampleTask::new(clip, 3, 0.), vec![])];

        let bytes = serialize_tasks(&tasks, 1);
        let result = deserialize_tasks(&bytes, &skeleton, &Clips::default());
        assert_eq!(result.unwrap_err(), TaskSerializationError::MissingAnimationClip(3));
    }

    #[test]
    fn test_out_of_range_bone_is_rejected() {
        let skeleton = test_utils::leg_skeleton();
        let tasks = vec![
            Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![]),
            Task::new(1, TwoBoneIkTask::new(9, None), vec![TaskIndex::new(0)]),
        ];

        let bytes = serialize_tasks(&tasks, skeleton.num_bone_masks());
        let result = deserialize_tasks(&bytes, &skeleton, &Clips::default());
        assert_eq!(result.unwrap_err(), TaskSerializationError::InvalidBoneIndex(9));
    }

    #[test]
    fn test_out_of_range_blend_weight_is_rejected() {
        let skeleton = test_utils::leg_skeleton();
        let blend = BlendTask {
            weight: 1.5,
            mode: PoseBlendMode::Interpolative,
            bone_mask: None,
        };
        let tasks = vec![
            Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![]),
            Task::new(1, DefaultPoseTask::new(PoseType::ZeroPose), vec![]),
            Task::new(2, blend, vec![TaskIndex::new(0), TaskIndex::new(1)]),
        ];

        let bytes = serialize_tasks(&tasks, skeleton.num_bone_masks());
        let result = deserialize_tasks(&bytes, &skeleton, &Clips::default());
        assert_eq!(result.unwrap_err(), TaskSerializationError::InvalidBlendWeight(1.5));

        // The same weight is fine for an additive blend
        let mut tasks = tasks;
        tasks[2] = Task::new(
            2,
            BlendTask::new(1.5, PoseBlendMode::Additive, None),
            vec![TaskIndex::new(0), TaskIndex::new(1)],
        );
        let bytes = serialize_tasks(&tasks, skeleton.num_bone_masks());
        assert!(deserialize_tasks(&bytes, &skeleton, &Clips::default()).is_ok());
    }

    #[test]
    fn test_truncated_stream_is_reported() {
        let skeleton = test_utils::leg_skeleton();
        let tasks = vec![Task::new(0, DefaultPoseTask::new(PoseType::ReferencePose), vec![])];
        let bytes = serialize_tasks(&tasks, skeleton.num_bone_masks());

        let result = deserialize_tasks(&bytes[..1], &skeleton, &Clips::default());
        assert_eq!(result.unwrap_err(), TaskSerializationError::UnexpectedEndOfStream);
    }
}
