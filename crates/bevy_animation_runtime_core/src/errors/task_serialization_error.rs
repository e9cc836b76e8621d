use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskSerializationError {
    #[error("Task stream ended unexpectedly")]
    UnexpectedEndOfStream,
    #[error("Unknown task type id {0}")]
    UnknownTaskType(u32),
    #[error("Task {task} depends on task {dependency}, which does not precede it")]
    InvalidDependency { task: usize, dependency: usize },
    #[error("Task of type {task_type} expects {expected} dependencies, found {found}")]
    DependencyCountMismatch {
        task_type: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("No animation clip is bound to data slot {0}")]
    MissingAnimationClip(u16),
    #[error("Bone mask index {0} does not exist in the skeleton")]
    InvalidBoneMask(usize),
    #[error("Bone index {0} does not exist in the skeleton")]
    InvalidBoneIndex(usize),
    #[error("Blend weight {0} is out of range for its blend mode")]
    InvalidBlendWeight(f32),
    #[error("External graph tasks mix pre-physics and post-physics stages")]
    MixedTaskStages,
    #[error("No external graph resources are bound to slot {0}")]
    MissingExternalGraph(u16),
}
