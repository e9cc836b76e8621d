use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum SkeletonError {
    #[error("A skeleton needs at least one bone")]
    EmptySkeleton,
    #[error("Bone {bone} has parent {parent}, which does not precede it")]
    ParentAfterChild { bone: usize, parent: usize },
    #[error("Bone name {0:?} is used more than once")]
    DuplicateBoneName(String),
    #[error("Unknown bone {0:?}")]
    UnknownBone(String),
    #[error("Bone mask {0:?} is defined more than once")]
    DuplicateBoneMask(String),
    #[error("Invalid bone mask pattern: {0}")]
    InvalidBoneMaskPattern(#[from] regex::Error),
}
