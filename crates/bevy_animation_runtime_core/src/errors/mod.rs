mod animation_clip_error;
mod skeleton_error;
mod task_serialization_error;

pub use animation_clip_error::*;
pub use skeleton_error::*;
pub use task_serialization_error::*;
