//! Wire types for the Pages direct-upload API.
//!
//! Shared by the manifest builder, the HTTP client and the deploy
//! pipeline. Nothing in here performs I/O.

pub mod envelope;
pub mod error;
pub mod manifest;
pub mod project;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{ApiEnvelope, ApiMessage};
pub use error::ValidationError;
pub use manifest::Manifest;
pub use project::{MAX_PROJECT_NAME_LEN, validate_project_name};
pub use types::{
    AssetMetadata, Deployment, Project, Stage, StageStatus, UploadPayloadItem, UploadResult,
    UploadToken,
};
