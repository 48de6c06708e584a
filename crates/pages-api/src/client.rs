//! Pages API client.
//!
//! Async HTTP client using `reqwest`. Account-scoped endpoints authenticate
//! with the API token; asset endpoints authenticate with the short-lived
//! upload JWT instead.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;

use pagedrop_protocol::types::{CreateProjectRequest, HashesRequest, UploadTokenResult};
use pagedrop_protocol::{
    ApiEnvelope, Deployment, Manifest, Project, UploadPayloadItem, UploadResult, UploadToken,
};

use crate::error::ApiError;
use crate::platform::{ApiFuture, PagesPlatform};

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Per-request timeout applied by the client itself.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters escaped in path segments built from caller input.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Pages API client.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    timeout: Duration,
}

impl Client {
    /// Creates a client for `account_id` authenticated with `api_token`.
    pub fn new(account_id: &str, api_token: &str) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_token}"))
            .map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            account_id: account_id.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Points the client at a different API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn projects_url(&self) -> String {
        format!(
            "{}/accounts/{}/pages/projects",
            self.base_url,
            utf8_percent_encode(&self.account_id, PATH_SEGMENT)
        )
    }

    fn project_url(&self, project: &str) -> String {
        format!(
            "{}/{}",
            self.projects_url(),
            utf8_percent_encode(project, PATH_SEGMENT)
        )
    }

    fn assets_url(&self, endpoint: &str) -> String {
        format!("{}/pages/assets/{endpoint}", self.base_url)
    }

    /// Sends a request and returns the envelope's `result`, if any.
    async fn send_envelope<T: DeserializeOwned>(
        &self,
        what: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        debug!(request = what, "sending API request");

        let resp = req
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|env| env.error_summary())
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;
        if !envelope.success {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: envelope
                    .error_summary()
                    .unwrap_or_else(|| format!("{what} was not successful")),
            });
        }

        Ok(envelope.result)
    }

    /// Like [`send_envelope`](Self::send_envelope), but a missing result is an error.
    async fn send<T: DeserializeOwned>(
        &self,
        what: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send_envelope(what, req)
            .await?
            .ok_or(ApiError::EmptyResult(what))
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Http(e)
        }
    }
}

impl PagesPlatform for Client {
    fn get_project<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Project>> {
        Box::pin(async move {
            let req = self.http.get(self.project_url(name));
            match self.send::<Project>("get project", req).await {
                Ok(project) => Ok(Some(project)),
                Err(ApiError::Api { status: 404, .. }) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn create_project<'a>(
        &'a self,
        name: &'a str,
        production_branch: &'a str,
    ) -> ApiFuture<'a, Project> {
        Box::pin(async move {
            let body = CreateProjectRequest {
                name,
                production_branch,
            };
            let req = self.http.post(self.projects_url()).json(&body);
            self.send("create project", req).await
        })
    }

    fn upload_token<'a>(&'a self, project: &'a str) -> ApiFuture<'a, UploadToken> {
        Box::pin(async move {
            let url = format!("{}/upload-token", self.project_url(project));
            let result: UploadTokenResult = self.send("upload token", self.http.get(url)).await?;
            if result.jwt.is_empty() {
                return Err(ApiError::EmptyResult("upload token"));
            }
            Ok(UploadToken::new(result.jwt))
        })
    }

    fn check_missing<'a>(
        &'a self,
        token: &'a UploadToken,
        hashes: &'a [String],
    ) -> ApiFuture<'a, Vec<String>> {
        Box::pin(async move {
            let req = self
                .http
                .post(self.assets_url("check-missing"))
                .bearer_auth(token.expose())
                .json(&HashesRequest { hashes });
            self.send("check missing", req).await
        })
    }

    fn upload<'a>(
        &'a self,
        token: &'a UploadToken,
        payload: &'a [UploadPayloadItem],
    ) -> ApiFuture<'a, UploadResult> {
        Box::pin(async move {
            let req = self
                .http
                .post(self.assets_url("upload"))
                .bearer_auth(token.expose())
                .json(payload);
            self.send("upload", req).await
        })
    }

    fn upsert_hashes<'a>(
        &'a self,
        token: &'a UploadToken,
        hashes: &'a [String],
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let req = self
                .http
                .post(self.assets_url("upsert-hashes"))
                .bearer_auth(token.expose())
                .json(&HashesRequest { hashes });
            self.send_envelope::<serde_json::Value>("upsert hashes", req)
                .await
                .map(|_| ())
        })
    }

    fn create_deployment<'a>(
        &'a self,
        project: &'a str,
        manifest: &'a Manifest,
    ) -> ApiFuture<'a, Deployment> {
        Box::pin(async move {
            let form = reqwest::multipart::Form::new().text("manifest", manifest.to_json()?);
            let url = format!("{}/deployments", self.project_url(project));
            self.send("create deployment", self.http.post(url).multipart(form))
                .await
        })
    }

    fn get_deployment<'a>(&'a self, project: &'a str, id: &'a str) -> ApiFuture<'a, Deployment> {
        Box::pin(async move {
            let url = format!(
                "{}/deployments/{}",
                self.project_url(project),
                utf8_percent_encode(id, PATH_SEGMENT)
            );
            self.send("get deployment", self.http.get(url)).await
        })
    }
}
