//! The hosting platform as seen by the deploy pipeline.

use std::future::Future;
use std::pin::Pin;

use pagedrop_protocol::{Deployment, Manifest, Project, UploadPayloadItem, UploadResult, UploadToken};

use crate::error::ApiError;

/// Boxed future returned by every [`PagesPlatform`] operation.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Operations consumed from the hosting platform.
///
/// [`Client`](crate::Client) implements this over HTTPS. Keeping it a trait
/// lets the pipeline run against in-memory fakes in tests.
pub trait PagesPlatform: Send + Sync {
    /// Looks up a project. `Ok(None)` means it does not exist.
    fn get_project<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Project>>;

    fn create_project<'a>(
        &'a self,
        name: &'a str,
        production_branch: &'a str,
    ) -> ApiFuture<'a, Project>;

    /// Issues a short-lived asset upload credential for a project.
    fn upload_token<'a>(&'a self, project: &'a str) -> ApiFuture<'a, UploadToken>;

    /// Returns the subset of `hashes` the platform does not store yet.
    fn check_missing<'a>(
        &'a self,
        token: &'a UploadToken,
        hashes: &'a [String],
    ) -> ApiFuture<'a, Vec<String>>;

    fn upload<'a>(
        &'a self,
        token: &'a UploadToken,
        payload: &'a [UploadPayloadItem],
    ) -> ApiFuture<'a, UploadResult>;

    /// Refreshes the retention of already stored hashes.
    fn upsert_hashes<'a>(&'a self, token: &'a UploadToken, hashes: &'a [String])
    -> ApiFuture<'a, ()>;

    fn create_deployment<'a>(
        &'a self,
        project: &'a str,
        manifest: &'a Manifest,
    ) -> ApiFuture<'a, Deployment>;

    fn get_deployment<'a>(&'a self, project: &'a str, id: &'a str) -> ApiFuture<'a, Deployment>;
}
