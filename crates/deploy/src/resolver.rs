//! Missing-asset resolution.
//!
//! Asks the platform which fingerprints it does not store yet, in bounded
//! batches. Only fingerprints reported missing are ever uploaded.

use std::collections::HashSet;

use pagedrop_pages_api::PagesPlatform;
use pagedrop_protocol::{UploadToken, ValidationError};
use tracing::{debug, warn};

use crate::error::DeployError;
use crate::retry::CallPolicy;

/// Fingerprints per check-missing request.
pub const DEFAULT_MISSING_BATCH_SIZE: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub batch_size: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_MISSING_BATCH_SIZE,
        }
    }
}

/// Returns the fingerprints the platform reports as missing, without
/// duplicates, in first-seen order.
///
/// Any batch failing after retries aborts the whole resolution.
pub async fn resolve_missing(
    platform: &dyn PagesPlatform,
    token: &UploadToken,
    fingerprints: &[String],
    options: &ResolverOptions,
    calls: &CallPolicy,
) -> Result<Vec<String>, DeployError> {
    if fingerprints.is_empty() {
        return Err(ValidationError::EmptyFingerprints.into());
    }
    if let Some(index) = fingerprints.iter().position(|f| f.is_empty()) {
        return Err(ValidationError::EmptyFingerprint(index).into());
    }

    let mut seen = HashSet::with_capacity(fingerprints.len());
    let unique: Vec<String> = fingerprints
        .iter()
        .filter(|f| seen.insert(f.as_str()))
        .cloned()
        .collect();
    let requested: HashSet<&str> = unique.iter().map(String::as_str).collect();

    let mut missing = Vec::new();
    let mut reported = HashSet::new();

    for (batch, chunk) in unique.chunks(options.batch_size.max(1)).enumerate() {
        let result = calls
            .run("check-missing", || platform.check_missing(token, chunk))
            .await?;
        debug!(batch, asked = chunk.len(), missing = result.len(), "check-missing batch");

        for hash in result {
            if !requested.contains(hash.as_str()) {
                warn!(hash = %hash, "platform reported an unrequested hash as missing");
                continue;
            }
            if reported.insert(hash.clone()) {
                missing.push(hash);
            }
        }
    }

    Ok(missing)
}
