use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Failed to read providers file {path}: {source}")]
    ProvidersFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid network range: {0}")]
    InvalidNetwork(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Worker fault: {0}")]
    WorkerFault(String),

    #[error("Upstream error ({code}): {message}")]
    Upstream { code: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PreviewError {
    /// True for failures raised while building the service.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PreviewError::ProvidersFile { .. }
                | PreviewError::InvalidNetwork(_)
                | PreviewError::Config(_)
        )
    }

    /// True when the worker pool could not accept or complete the job.
    pub fn is_dispatch_error(&self) -> bool {
        matches!(self, PreviewError::PoolClosed | PreviewError::WorkerFault(_))
    }

    pub fn log(&self) {
        match self {
            PreviewError::ProvidersFile { path, source } => {
                error!(path = %path.display(), error = %source, "Providers file unreadable");
            }
            PreviewError::InvalidNetwork(e) => {
                error!(error = %e, "Network range rejected");
            }
            PreviewError::Config(e) => {
                error!(error = %e, "Invalid configuration");
            }
            PreviewError::InvalidUrl(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            PreviewError::PoolClosed => {
                warn!("Job submitted to a released worker pool");
            }
            PreviewError::WorkerFault(e) => {
                error!(error = %e, "Worker failed to complete job");
            }
            PreviewError::Upstream { code, message } => {
                warn!(code = *code, error = %message, "Upstream returned no usable data");
            }
            PreviewError::Internal(e) => {
                error!(error = %e, "Unclassified failure");
            }
        }
    }
}
