//! Deploy pipeline configuration.

use pagedrop_manifest::ManifestOptions;

use crate::poller::PollConfig;
use crate::resolver::ResolverOptions;
use crate::retry::CallPolicy;
use crate::uploader::UploadOptions;

/// Everything a [`Deployer`](crate::Deployer) needs besides the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
    pub manifest: ManifestOptions,
    pub resolver: ResolverOptions,
    pub upload: UploadOptions,
    /// Timeout and retries applied to individual platform calls.
    pub calls: CallPolicy,
    pub poll: PollConfig,
    /// Check-missing/upload rounds before giving up on stragglers.
    pub max_upload_rounds: u32,
    pub create_project_if_missing: bool,
    /// Production branch used when a project has to be created.
    pub production_branch: String,
    /// Refresh retention of already stored assets after upload.
    pub upsert_hashes: bool,
    /// Spawn a status poller after the deployment is created.
    pub follow_deployment: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            manifest: ManifestOptions::default(),
            resolver: ResolverOptions::default(),
            upload: UploadOptions::default(),
            calls: CallPolicy::default(),
            poll: PollConfig::default(),
            max_upload_rounds: 3,
            create_project_if_missing: true,
            production_branch: "main".into(),
            upsert_hashes: true,
            follow_deployment: true,
        }
    }
}
