use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnimationClipError {
    #[error("An animation clip needs at least one frame")]
    NoFrames,
    #[error("Frame {frame} has {found} bone transforms, but the skeleton has {expected} bones")]
    BoneCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("Root motion track has {found} samples, but the clip has {expected} frames")]
    RootMotionFrameMismatch { expected: usize, found: usize },
    #[error("Animation clip duration must be positive and finite, got {0}")]
    InvalidDuration(f32),
    #[error("Event {0:?} does not fit in the clip's [0, 1] range")]
    EventOutOfRange(String),
}
