//! Batched, concurrent asset upload.
//!
//! Missing keys are packed into batches bounded by item count and encoded
//! size, then dispatched with bounded concurrency. Every batch of a round
//! completes before the next round starts. Keys the platform rejects, and
//! keys of batches that failed transiently, go into the next round.

use std::collections::HashSet;

use futures_util::StreamExt;
use futures_util::stream;
use pagedrop_manifest::AssetIndex;
use pagedrop_pages_api::PagesPlatform;
use pagedrop_protocol::{UploadPayloadItem, UploadResult, UploadToken, ValidationError};
use tracing::{debug, info, warn};

use crate::error::DeployError;
use crate::retry::{CallPolicy, RetryPolicy};

/// Items per upload request.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 2000;
/// Encoded payload bytes per upload request: 40 MiB.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 40 * 1024 * 1024;
/// Upload requests in flight at once.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub max_batch_items: usize,
    pub max_batch_bytes: usize,
    pub concurrency: usize,
    /// Rounds for keys that did not make it, and the wait between them.
    pub retry: RetryPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of [`upload_missing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    /// Keys that still failed after the last round.
    pub failed: Vec<String>,
    /// Upload requests issued, across all rounds.
    pub batches: usize,
}

impl UploadReport {
    /// Fails with [`DeployError::FileUpload`] if any key was not stored.
    pub fn ensure_complete(&self) -> Result<(), DeployError> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(DeployError::FileUpload {
                keys: self.failed.clone(),
            })
        }
    }

    pub(crate) fn merge(&mut self, other: UploadReport) {
        self.uploaded.extend(other.uploaded);
        self.failed = other.failed;
        self.batches += other.batches;
    }
}

/// Splits `(key, encoded_size)` pairs into batches.
///
/// A batch closes when adding the next item would exceed either cap. An
/// item larger than `max_bytes` on its own travels alone.
pub(crate) fn plan_batches(
    items: &[(String, usize)],
    max_items: usize,
    max_bytes: usize,
) -> Vec<Vec<String>> {
    let max_items = max_items.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_bytes = 0usize;

    for (key, size) in items {
        if !current.is_empty()
            && (current.len() >= max_items || current_bytes.saturating_add(*size) > max_bytes)
        {
            batches.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current.push(key.clone());
        current_bytes = current_bytes.saturating_add(*size);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Uploads every key in `missing`, reading bytes through `index`.
///
/// Returns a report; permanently failed keys are listed in
/// [`UploadReport::failed`] rather than returned as an error. A fatal batch
/// error (4xx, unreadable or modified file) aborts immediately.
pub async fn upload_missing(
    platform: &dyn PagesPlatform,
    token: &UploadToken,
    missing: &[String],
    index: &AssetIndex,
    options: &UploadOptions,
    calls: &CallPolicy,
) -> Result<UploadReport, DeployError> {
    let mut seen = HashSet::new();
    let mut pending: Vec<String> = missing
        .iter()
        .filter(|k| seen.insert(k.as_str()))
        .cloned()
        .collect();

    let mut report = UploadReport::default();
    let attempts = options.retry.attempts();

    for attempt in 1..=attempts {
        if pending.is_empty() {
            break;
        }

        let delay = options.retry.delay_before(attempt);
        if !delay.is_zero() {
            debug!(attempt, keys = pending.len(), delay_ms = delay.as_millis() as u64, "waiting before upload retry");
            tokio::time::sleep(delay).await;
        }

        let sized = pending
            .iter()
            .map(|k| -> Result<(String, usize), ValidationError> {
                Ok((k.clone(), index.require(k)?.encoded_len()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let plan = plan_batches(&sized, options.max_batch_items, options.max_batch_bytes);
        report.batches += plan.len();
        debug!(attempt, keys = pending.len(), batches = plan.len(), "upload round");

        let results: Vec<(Vec<String>, Result<UploadResult, DeployError>)> = stream::iter(plan)
            .map(move |keys| async move {
                let result = upload_batch(platform, token, &keys, index, calls).await;
                (keys, result)
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        let mut retry = Vec::new();
        for (keys, result) in results {
            match result {
                Ok(outcome) => {
                    let rejected: HashSet<&str> =
                        outcome.unsuccessful_keys.iter().map(String::as_str).collect();
                    if !rejected.is_empty() {
                        warn!(attempt, rejected = rejected.len(), "platform rejected some assets");
                    }
                    for key in keys {
                        if rejected.contains(key.as_str()) {
                            retry.push(key);
                        } else {
                            report.uploaded.push(key);
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, keys = keys.len(), error = %e, "upload batch failed, will retry");
                    retry.extend(keys);
                }
                Err(e) => return Err(e),
            }
        }
        pending = retry;
    }

    report.failed = pending;
    info!(
        uploaded = report.uploaded.len(),
        failed = report.failed.len(),
        batches = report.batches,
        "asset upload finished"
    );
    Ok(report)
}

async fn upload_batch(
    platform: &dyn PagesPlatform,
    token: &UploadToken,
    keys: &[String],
    index: &AssetIndex,
    calls: &CallPolicy,
) -> Result<UploadResult, DeployError> {
    let mut payload = Vec::with_capacity(keys.len());
    for key in keys {
        let source = index.require(key)?.clone();
        let content_type = source.content_type.clone();
        let fingerprint = key.clone();
        let data =
            tokio::task::spawn_blocking(move || source.read_verified(&fingerprint)).await??;

        let item = UploadPayloadItem::from_bytes(key.clone(), &data, content_type);
        item.validate()?;
        payload.push(item);
    }

    let result = calls.timed(platform.upload(token, &payload)).await?;
    debug!(
        items = payload.len(),
        successful = result.successful_key_count,
        unsuccessful = result.unsuccessful_keys.len(),
        "upload batch done"
    );
    Ok(result)
}
