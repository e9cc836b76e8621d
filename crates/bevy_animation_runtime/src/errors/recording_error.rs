use bevy_animation_runtime_core::errors::TaskSerializationError;
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Could not encode recording: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("Could not decode recording: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("Could not decode recorded tasks: {0}")]
    Tasks(#[from] TaskSerializationError),
    #[error("Recording has no frame {0}")]
    MissingFrame(usize),
}
