//! # Bevy Animation Runtime
//!
//! Data-driven animation graphs on top of [`bevy_animation_runtime_core`].
//!
//! A [`GraphDefinition`] is an immutable, topologically ordered array of
//! nodes, usually loaded from RON. A [`GraphInstance`] binds a definition to
//! the clips and skeleton of a [`GraphDataSet`] and is evaluated once per
//! frame:
//!
//! ```ignore
//! instance.set_control_parameter("speed", 1.5)?;
//! instance.evaluate_graph(delta_time, world_transform, None)?;
//! instance.execute_pre_physics_pose_tasks(world_transform);
//! // physics step
//! instance.execute_post_physics_pose_tasks(post_physics_transform);
//! let pose = instance.pose();
//! ```
//!
//! Evaluating the graph updates node times, samples events and root motion,
//! and registers pose tasks; the tasks produce the pose when executed.
//!
//! [`GraphDefinition`]: crate::definition::GraphDefinition
//! [`GraphInstance`]: crate::graph_instance::GraphInstance
//! [`GraphDataSet`]: crate::definition::GraphDataSet

pub mod config;
pub mod context;
pub mod definition;
pub mod errors;
pub mod graph_instance;
pub mod nodes;
pub mod recording;
pub mod value;

#[cfg(test)]
pub(crate) mod test_utils;

pub mod prelude {
    pub use super::config::*;
    pub use super::context::*;
    pub use super::definition::*;
    pub use super::errors::*;
    pub use super::graph_instance::*;
    pub use super::nodes::*;
    pub use super::recording::*;
    pub use super::value::*;
    pub use bevy_animation_runtime_core::prelude::*;
}
