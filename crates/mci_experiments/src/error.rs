use mci_core::error::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("invalid batch configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build replication thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn batch worker: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode results: {0}")]
    Json(#[from] serde_json::Error),
}
