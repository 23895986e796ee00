//! Error taxonomy shared by the serving API and the retrain job.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServingError {
    #[error("{0}")]
    ClientInput(String),
    #[error("model artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),
    #[error("no model artifacts found in {}", .0.display())]
    NoArtifactsFound(PathBuf),
    #[error("no alternative model artifact available (current: {current})")]
    NoAlternativeArtifact { current: String },
    #[error("test data files not found: {}", .0.display())]
    TestDataNotFound(PathBuf),
    #[error("invalid model artifact {}: {reason}", path.display())]
    InvalidArtifact { path: PathBuf, reason: String },
    #[error("invalid test data {}: {reason}", path.display())]
    InvalidTestData { path: PathBuf, reason: String },
    #[error("prediction failed: {0}")]
    Prediction(String),
    #[error("registry unavailable: {0}")]
    UpstreamUnavailable(#[from] sled::Error),
    #[error("registry record could not be decoded: {0}")]
    CorruptRecord(#[from] serde_json::Error),
    #[error("registry key of {0} bytes is not a record id")]
    CorruptKey(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind { ClientInput, NotFound, UpstreamUnavailable, Prediction, Internal }

impl ServingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClientInput(_) => ErrorKind::ClientInput,
            Self::ArtifactNotFound(_) | Self::NoArtifactsFound(_) | Self::NoAlternativeArtifact { .. } | Self::TestDataNotFound(_) => ErrorKind::NotFound,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::Prediction(_) => ErrorKind::Prediction,
            Self::InvalidArtifact { .. } | Self::InvalidTestData { .. } | Self::CorruptRecord(_) | Self::CorruptKey(_) | Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn client_input(msg: impl Into<String>) -> Self { Self::ClientInput(msg.into()) }
}

pub type Result<T> = std::result::Result<T, ServingError>;
