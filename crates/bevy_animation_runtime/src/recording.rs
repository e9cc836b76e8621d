//! Frame-by-frame recording of a graph instance.
//!
//! A [`FrameRecord`] stores the inputs of one evaluation together with the
//! encoded task list it produced. Replaying a record only executes the
//! tasks, so the pose can be reproduced without the graph.

use bevy::transform::components::Transform;
use bevy_animation_runtime_core::task::{TaskSystem, serialization::TaskResourceProvider};
use serde::{Deserialize, Serialize};

use crate::{errors::RecordingError, graph_instance::GraphInstance, value::GraphValue};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameRecord {
    pub update_id: u64,
    pub delta_time: f32,
    /// World transform the post-physics tasks ran with.
    pub world_transform: Transform,
    pub control_parameters: Vec<GraphValue>,
    /// Bit-packed task stream, see [`TaskSystem::serialize_tasks`].
    pub tasks: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphRecorder {
    frames: Vec<FrameRecord>,
}

impl GraphRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the last frame of `instance`. Call after the frame's tasks
    /// were executed.
    pub fn record_frame(&mut self, instance: &GraphInstance) {
        self.frames.push(FrameRecord {
            update_id: instance.update_id(),
            delta_time: instance.delta_time(),
            world_transform: instance.world_transform(),
            control_parameters: instance.control_parameters().to_vec(),
            tasks: instance.task_system().serialize_tasks(),
        });
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&FrameRecord> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordingError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordingError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Loads the tasks of frame `index` into `task_system` and executes both
    /// passes. Clips are resolved through `resources` by data slot.
    ///
    /// Frames relaying external graphs need a provider that knows the
    /// attached children, such as the recorded [`GraphInstance`] itself.
    pub fn replay_frame(
        &self,
        index: usize,
        task_system: &mut TaskSystem,
        resources: &dyn TaskResourceProvider,
    ) -> Result<(), RecordingError> {
        let frame = self.frame(index).ok_or(RecordingError::MissingFrame(index))?;
        task_system.deserialize_tasks(&frame.tasks, resources)?;
        task_system.execute_pre_physics_tasks(frame.delta_time, frame.world_transform);
        task_system.execute_post_physics_tasks(frame.world_transform);
        Ok(())
    }
}
