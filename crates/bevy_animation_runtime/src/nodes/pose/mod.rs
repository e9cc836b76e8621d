mod animation_clip;
mod animation_pose;
mod blend;
mod cached_pose;
mod default_pose;
mod external_graph;
mod orientation_warp;
mod speed_scale;
mod state;
mod two_bone_ik;

pub use animation_clip::*;
pub use animation_pose::*;
pub use blend::*;
pub use cached_pose::*;
pub use default_pose::*;
pub use external_graph::*;
pub use orientation_warp::*;
pub use speed_scale::*;
pub use state::*;
pub use two_bone_ik::*;
