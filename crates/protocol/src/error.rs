//! Validation errors.

/// Input rejected before any network call is made.
///
/// These are never retryable and are reported to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid project name {name:?}: {reason}")]
    InvalidProjectName { name: String, reason: &'static str },

    #[error("{path}: file is {size} bytes, maximum is {max}")]
    FileTooLarge { path: String, size: u64, max: u64 },

    #[error("duplicate manifest path: {0}")]
    DuplicatePath(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("manifest is empty")]
    EmptyManifest,

    #[error("fingerprint list is empty")]
    EmptyFingerprints,

    #[error("fingerprint at index {0} is empty")]
    EmptyFingerprint(usize),

    #[error("malformed upload item {key:?}: empty {field}")]
    MalformedPayload { key: String, field: &'static str },

    #[error("no local source for asset {0}")]
    UnknownAsset(String),

    #[error("{0}: content changed while deploying")]
    ContentChanged(String),
}
