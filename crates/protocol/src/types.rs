use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Short-lived, project-scoped credential for the asset endpoints.
///
/// The JWT never shows up in `Debug` output and is not serializable, so it
/// cannot leak into logs or persisted state by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn new(jwt: impl Into<String>) -> Self {
        Self(jwt.into())
    }

    /// Returns the raw JWT for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UploadToken(<redacted>)")
    }
}

/// `result` of the upload-token endpoint.
#[derive(Debug, Deserialize)]
pub struct UploadTokenResult {
    pub jwt: String,
}

/// Metadata attached to an uploaded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(rename = "contentType")]
    pub content_type: String,
}

/// One entry of an asset upload request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPayloadItem {
    pub key: String,
    pub value: String,
    pub metadata: AssetMetadata,
    pub base64: bool,
}

impl UploadPayloadItem {
    /// Builds an item from raw bytes, base64-encoding them.
    pub fn from_bytes(key: impl Into<String>, data: &[u8], content_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: STANDARD.encode(data),
            metadata: AssetMetadata {
                content_type: content_type.into(),
            },
            base64: true,
        }
    }

    /// Checks that key, value and content type are all non-empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let malformed = |field| ValidationError::MalformedPayload {
            key: self.key.clone(),
            field,
        };
        if self.key.is_empty() {
            return Err(malformed("key"));
        }
        if self.value.is_empty() {
            return Err(malformed("value"));
        }
        if self.metadata.content_type.is_empty() {
            return Err(malformed("contentType"));
        }
        Ok(())
    }
}

/// Body of the check-missing and upsert-hashes endpoints.
#[derive(Debug, Serialize)]
pub struct HashesRequest<'a> {
    pub hashes: &'a [String],
}

/// `result` of the upload endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default)]
    pub successful_key_count: u64,
    #[serde(default)]
    pub unsuccessful_keys: Vec<String>,
}

/// A Pages project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
}

/// Body of the create-project endpoint.
#[derive(Debug, Serialize)]
pub struct CreateProjectRequest<'a> {
    pub name: &'a str,
    pub production_branch: &'a str,
}

/// Status of a deployment stage as reported by the platform.
///
/// The vocabulary is loosely specified upstream; anything not listed here
/// deserializes to [`StageStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Idle,
    Active,
    Success,
    Failure,
    #[serde(alias = "cancelled")]
    Canceled,
    Skipped,
    #[serde(other)]
    Unknown,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coarse phase of a deployment (`queued`, `build`, `deploy`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<StageStatus>,
    #[serde(default)]
    pub started_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_on: Option<DateTime<Utc>>,
}

/// A deployment record. Owned by the platform; only read or created here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
}
