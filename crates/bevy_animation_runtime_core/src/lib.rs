//! # Bevy Animation Runtime Core
//!
//! Pose data and the deferred task machinery the animation graph runtime
//! is built on:
//!
//! - [`Skeleton`], [`Pose`] and [`AnimationClip`] hold the animation data.
//! - [`PoseBufferPool`] owns every pose buffer a graph instance works with.
//!   Transient buffers are handed out to tasks for the duration of one frame,
//!   cached buffers survive across frames.
//! - [`SampledEventsBuffer`] collects the animation and state events sampled
//!   during graph evaluation.
//! - [`TaskSystem`] executes the [`Task`]s registered by graph nodes, once
//!   before physics and once after it.
//!
//! [`Skeleton`]: crate::skeleton::Skeleton
//! [`Pose`]: crate::pose::Pose
//! [`AnimationClip`]: crate::animation_clip::AnimationClip
//! [`PoseBufferPool`]: crate::pose_pool::PoseBufferPool
//! [`SampledEventsBuffer`]: crate::sampled_events::SampledEventsBuffer
//! [`TaskSystem`]: crate::task::TaskSystem
//! [`Task`]: crate::task::Task

pub mod animation_clip;
pub mod bone_mask;
pub mod errors;
pub mod interpolation;
pub mod pose;
pub mod pose_pool;
pub mod sampled_events;
pub mod skeleton;
pub mod space_conversion;
pub mod sync_track;
pub mod task;

/// Index of a node within a graph definition.
pub type NodeIndex = u16;

pub mod prelude {
    pub use super::NodeIndex;
    pub use super::animation_clip::*;
    pub use super::bone_mask::*;
    pub use super::errors::*;
    pub use super::interpolation::{additive::*, linear::*};
    pub use super::pose::*;
    pub use super::pose_pool::*;
    pub use super::sampled_events::*;
    pub use super::skeleton::*;
    pub use super::space_conversion::*;
    pub use super::sync_track::*;
    pub use super::task::*;
}
