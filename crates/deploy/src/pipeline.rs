//! Deploy orchestrator.
//!
//! Runs one deployment attempt: manifest, upload credential, missing-asset
//! check, upload, deployment creation. The caller gets the deployment id
//! and URL as soon as the deployment exists; status tracking continues on
//! a [`PollHandle`].

use std::path::Path;
use std::sync::Arc;

use pagedrop_manifest::build_manifest;
use pagedrop_pages_api::PagesPlatform;
use pagedrop_protocol::{Project, ValidationError, validate_project_name};
use tracing::{info, warn};

use crate::authorizer::get_upload_credential;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::initiator::create_deployment;
use crate::poller::{PollHandle, spawn_poller};
use crate::resolver::resolve_missing;
use crate::status::{DeploymentStatus, map_deployment};
use crate::uploader::{UploadReport, upload_missing};

/// Result of [`Deployer::deploy`].
pub struct DeployOutcome {
    pub deployment_id: String,
    pub url: Option<String>,
    /// Status mapped from the create response.
    pub initial_status: DeploymentStatus,
    pub report: UploadReport,
    /// Present when following is enabled and the deployment is not already
    /// terminal.
    pub poller: Option<PollHandle>,
}

/// Deploys local folders to Pages projects.
///
/// Attempts share nothing but the platform client and configuration, so
/// one `Deployer` can serve several projects concurrently.
pub struct Deployer {
    platform: Arc<dyn PagesPlatform>,
    config: DeployConfig,
}

impl Deployer {
    pub fn new(platform: Arc<dyn PagesPlatform>, config: DeployConfig) -> Self {
        Self { platform, config }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Makes sure `project` exists, creating it if the platform has no
    /// such project.
    pub async fn ensure_project(&self, project: &str) -> Result<Project, DeployError> {
        validate_project_name(project)?;
        let calls = &self.config.calls;

        if let Some(existing) = calls
            .run("get-project", || self.platform.get_project(project))
            .await?
        {
            return Ok(existing);
        }

        info!(project, branch = %self.config.production_branch, "creating project");
        let created = calls
            .timed(
                self.platform
                    .create_project(project, &self.config.production_branch),
            )
            .await?;
        Ok(created)
    }

    /// Deploys the contents of `folder` to `project`.
    ///
    /// Returns once the deployment has been created. Nothing is created if
    /// any asset fails to upload.
    pub async fn deploy(&self, project: &str, folder: &Path) -> Result<DeployOutcome, DeployError> {
        validate_project_name(project)?;
        let calls = &self.config.calls;
        info!(project, folder = %folder.display(), "starting deployment");

        if self.config.create_project_if_missing {
            self.ensure_project(project).await?;
        }

        let root = folder.to_path_buf();
        let options = self.config.manifest.clone();
        let built = tokio::task::spawn_blocking(move || build_manifest(&root, &options)).await??;
        if built.manifest.is_empty() {
            return Err(ValidationError::EmptyManifest.into());
        }
        info!(
            project,
            files = built.manifest.len(),
            unique = built.index.len(),
            bytes = built.total_size,
            "manifest ready"
        );

        let token = get_upload_credential(&*self.platform, project, calls).await?;
        let fingerprints = built.manifest.fingerprints();

        let mut report = UploadReport::default();
        let mut round = 0;
        loop {
            let missing = resolve_missing(
                &*self.platform,
                &token,
                &fingerprints,
                &self.config.resolver,
                calls,
            )
            .await?;
            if missing.is_empty() {
                break;
            }

            round += 1;
            if round > self.config.max_upload_rounds {
                warn!(project, missing = missing.len(), "assets still missing after upload");
                return Err(DeployError::FileUpload { keys: missing });
            }

            info!(project, round, missing = missing.len(), total = fingerprints.len(), "uploading missing assets");
            let uploaded = upload_missing(
                &*self.platform,
                &token,
                &missing,
                &built.index,
                &self.config.upload,
                calls,
            )
            .await?;
            uploaded.ensure_complete()?;
            report.merge(uploaded);
        }

        if self.config.upsert_hashes {
            if let Err(e) = calls
                .run("upsert-hashes", || {
                    self.platform.upsert_hashes(&token, &fingerprints)
                })
                .await
            {
                warn!(project, error = %e, "refreshing asset retention failed");
            }
        }
        drop(token);

        let created = create_deployment(&*self.platform, project, &built.manifest, calls).await?;

        let poller = (self.config.follow_deployment && !created.status.is_terminal())
            .then(|| self.watch(project, &created.id));

        Ok(DeployOutcome {
            deployment_id: created.id,
            url: created.url,
            initial_status: created.status,
            report,
            poller,
        })
    }

    /// One status snapshot of an existing deployment.
    pub async fn poll_status(
        &self,
        project: &str,
        deployment_id: &str,
    ) -> Result<DeploymentStatus, DeployError> {
        validate_project_name(project)?;
        let deployment = self
            .config
            .calls
            .run("get-deployment", || {
                self.platform.get_deployment(project, deployment_id)
            })
            .await?;
        Ok(map_deployment(&deployment))
    }

    /// Starts following an existing deployment.
    pub fn watch(&self, project: &str, deployment_id: &str) -> PollHandle {
        spawn_poller(
            Arc::clone(&self.platform),
            project.to_string(),
            deployment_id.to_string(),
            self.config.poll.clone(),
            self.config.calls.timeout,
        )
    }
}
