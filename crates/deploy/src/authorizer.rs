//! Upload credential issuance.

use pagedrop_pages_api::{ApiError, PagesPlatform};
use pagedrop_protocol::{UploadToken, validate_project_name};
use tracing::debug;

use crate::error::DeployError;
use crate::retry::CallPolicy;

/// Obtains a project-scoped upload credential.
///
/// Transient failures are retried under `calls`. A client-side rejection
/// (unknown project, revoked API token) becomes
/// [`DeployError::Authentication`].
pub async fn get_upload_credential(
    platform: &dyn PagesPlatform,
    project: &str,
    calls: &CallPolicy,
) -> Result<UploadToken, DeployError> {
    validate_project_name(project)?;

    match calls
        .run("upload-token", || platform.upload_token(project))
        .await
    {
        Ok(token) => {
            debug!(project, "upload credential issued");
            Ok(token)
        }
        Err(e) if e.is_client_error() || matches!(e, ApiError::InvalidToken) => {
            Err(DeployError::Authentication {
                project: project.to_string(),
                message: e.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}
