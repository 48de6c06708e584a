//! Deploy error types.

use pagedrop_manifest::ManifestError;
use pagedrop_pages_api::ApiError;
use pagedrop_protocol::ValidationError;

/// Errors produced during a deployment attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("platform error: {0}")]
    Api(#[from] ApiError),

    #[error("upload credential rejected for project {project}: {message}")]
    Authentication { project: String, message: String },

    #[error("failed to upload {} asset(s): {}", keys.len(), keys.join(", "))]
    FileUpload { keys: Vec<String> },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cancelled")]
    Cancelled,
}

impl DeployError {
    /// Whether the caller may retry the whole attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::Io(_) => true,
            Self::Validation(_)
            | Self::Authentication { .. }
            | Self::FileUpload { .. }
            | Self::Join(_)
            | Self::Cancelled => false,
        }
    }
}

impl From<ManifestError> for DeployError {
    fn from(e: ManifestError) -> Self {
        match e {
            ManifestError::Io(e) => Self::Io(e),
            ManifestError::Validation(e) => Self::Validation(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn file_upload_names_every_key() {
        let err = DeployError::FileUpload {
            keys: vec!["h1".into(), "h2".into()],
        };
        assert_eq!(err.to_string(), "failed to upload 2 asset(s): h1, h2");
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_api_errors_are_retryable() {
        let err = DeployError::from(ApiError::Timeout(Duration::from_secs(30)));
        assert!(err.is_retryable());

        let err = DeployError::from(ApiError::Api {
            status: 400,
            message: "bad".into(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn manifest_errors_keep_their_kind() {
        let err = DeployError::from(ManifestError::Validation(ValidationError::EmptyManifest));
        assert!(matches!(
            err,
            DeployError::Validation(ValidationError::EmptyManifest)
        ));
    }
}
