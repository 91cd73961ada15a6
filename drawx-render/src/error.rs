use thiserror::Error;

/// Failure of a frame sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Could not acquire frame buffer: {0}")]
    Acquire(String),
    #[error("Could not present frame: {0}")]
    Present(String),
    #[error("Surface lost")]
    SurfaceLost,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Render loop already stopped")]
    Stopped,
    #[error("Render worker panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Sink(#[from] SinkError),
}
