//! Error types
//!
//! Fatal failures only. Advisory conditions (out-of-range inputs,
//! unattainable dynamic ductility) are reported as
//! [`Diagnostic`](crate::models::Diagnostic)s and never abort a call.

use crate::models::{ArtifactResource, ModelKey};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RhomutError>;

#[derive(Debug, Error)]
pub enum RhomutError {
    /// Caller supplied an argument outside its legal domain
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No file backs the requested artifact
    #[error("no {resource} artifact found for model {key}")]
    ArtifactNotFound { key: ModelKey, resource: ArtifactResource },

    /// Artifact exists but could not be read or parsed
    #[error("failed to load {resource} artifact for model {key}")]
    ArtifactLoad {
        key: ModelKey,
        resource: ArtifactResource,
        #[source]
        source: anyhow::Error,
    },

    /// Loaded artifacts disagree with the request (feature count, empty table)
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("prediction exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl RhomutError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RhomutError::InvalidArgument(message.into())
    }

    /// Returns true for caller errors, as opposed to artifact or runtime failures
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, RhomutError::InvalidArgument(_))
    }
}
