//! Incremental deploys of a local folder to Cloudflare Pages.
//!
//! This crate implements the deploy **business logic**. It talks to the
//! platform only through [`PagesPlatform`], so the binary supplies the
//! HTTPS client and tests supply an in-memory fake.
//!
//! # Pipeline
//!
//! 1. **Manifest**: fingerprint every file under the folder
//! 2. **Authorize**: obtain a project-scoped upload credential
//! 3. **Resolve**: ask which fingerprints the platform lacks
//! 4. **Upload**: send only those, batched and concurrent
//! 5. **Create**: submit the full manifest as a new deployment
//! 6. **Poll**: follow the deployment on a cancellable background task

pub mod authorizer;
pub mod config;
pub mod error;
pub mod initiator;
pub mod pipeline;
pub mod poller;
pub mod resolver;
pub mod retry;
pub mod status;
pub mod uploader;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use authorizer::get_upload_credential;
pub use config::DeployConfig;
pub use error::DeployError;
pub use initiator::{CreatedDeployment, create_deployment};
pub use pagedrop_pages_api::PagesPlatform;
pub use pipeline::{DeployOutcome, Deployer};
pub use poller::{PollConfig, PollHandle, PollOutcome, spawn_poller};
pub use resolver::{DEFAULT_MISSING_BATCH_SIZE, ResolverOptions, resolve_missing};
pub use retry::{Backoff, CallPolicy, RetryPolicy};
pub use status::{DeployState, DeploymentStatus, map_deployment};
pub use uploader::{UploadOptions, UploadReport, upload_missing};
