//! Deployment creation.

use pagedrop_pages_api::PagesPlatform;
use pagedrop_protocol::{Manifest, ValidationError, validate_project_name};
use serde::Serialize;
use tracing::info;

use crate::error::DeployError;
use crate::retry::CallPolicy;
use crate::status::{DeploymentStatus, map_deployment};

/// A deployment as returned by the create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedDeployment {
    pub id: String,
    /// Present when the platform assigns the URL synchronously.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: DeploymentStatus,
}

/// Submits the full manifest and creates a deployment.
///
/// Made exactly once: the call is not idempotent, so a timeout or transient
/// error is returned to the caller instead of being retried.
pub async fn create_deployment(
    platform: &dyn PagesPlatform,
    project: &str,
    manifest: &Manifest,
    calls: &CallPolicy,
) -> Result<CreatedDeployment, DeployError> {
    validate_project_name(project)?;
    if manifest.is_empty() {
        return Err(ValidationError::EmptyManifest.into());
    }

    let deployment = calls
        .timed(platform.create_deployment(project, manifest))
        .await?;
    let status = map_deployment(&deployment);

    info!(
        project,
        deployment = %deployment.id,
        url = deployment.url.as_deref().unwrap_or("-"),
        state = ?status.state,
        "deployment created"
    );

    Ok(CreatedDeployment {
        id: deployment.id,
        url: deployment.url,
        status,
    })
}
