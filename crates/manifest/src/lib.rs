//! Content-addressed manifest builder.
//!
//! Walks a local folder and produces the path → fingerprint [`Manifest`]
//! submitted with a deployment, plus an [`AssetIndex`] that maps each
//! fingerprint back to a file on disk for the upload step.

mod builder;
mod fingerprint;
mod index;
mod mime;
mod validation;

pub use builder::{
    BuiltManifest, DEFAULT_IGNORE, DEFAULT_MAX_FILE_SIZE, FileEntry, ManifestOptions,
    build_manifest,
};
pub use fingerprint::{FINGERPRINT_LEN, fingerprint_bytes, fingerprint_file};
pub use index::{AssetIndex, AssetSource};
pub use mime::content_type_for;
pub use pagedrop_protocol::Manifest;
pub use validation::validate_relative_path;

use pagedrop_protocol::ValidationError;

/// Errors produced while building a manifest or reading assets back.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
