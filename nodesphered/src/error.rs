use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("could not determine data directory")]
    NoDataDir,

    #[error("failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    Args(String),

    #[error("engine: {0}")]
    Engine(#[from] nodesphere::EngineError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
