use thiserror::Error;

/// Construction-time failures. Nothing in the per-frame path returns these.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("render backend: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no suitable GPU adapter or device")]
    Unavailable,

    #[error("GPU device request failed: {0}")]
    Device(String),

    #[error("backend used after release")]
    Released,
}
