mod graph_error;
mod loader_error;
mod recording_error;
mod validation_error;

pub use graph_error::*;
pub use loader_error::*;
pub use recording_error::*;
pub use validation_error::*;
