//! Fingerprint → local byte source.

use std::collections::HashMap;
use std::path::PathBuf;

use pagedrop_protocol::ValidationError;

use crate::ManifestError;
use crate::fingerprint::fingerprint_bytes;

/// Where the bytes for a fingerprint live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    pub path: PathBuf,
    pub relative_path: String,
    pub size: u64,
    pub content_type: String,
}

impl AssetSource {
    /// Reads the file and checks it still hashes to `fingerprint`.
    ///
    /// A file edited after the manifest was built fails with
    /// [`ValidationError::ContentChanged`].
    pub fn read_verified(&self, fingerprint: &str) -> Result<Vec<u8>, ManifestError> {
        let data = std::fs::read(&self.path)?;
        if fingerprint_bytes(&data) != fingerprint {
            return Err(ValidationError::ContentChanged(self.relative_path.clone()).into());
        }
        Ok(data)
    }

    /// Length of the base64 encoding of this asset.
    pub fn encoded_len(&self) -> usize {
        (self.size as usize).div_ceil(3) * 4
    }
}

/// Side index built next to the manifest, consulted by the uploader.
///
/// When several paths share content, the first path seen is kept as the
/// source; the bytes are identical either way.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    sources: HashMap<String, AssetSource>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source. Returns `false` if the fingerprint was already known.
    pub fn insert(&mut self, fingerprint: impl Into<String>, source: AssetSource) -> bool {
        let fingerprint = fingerprint.into();
        if self.sources.contains_key(&fingerprint) {
            return false;
        }
        self.sources.insert(fingerprint, source);
        true
    }

    pub fn get(&self, fingerprint: &str) -> Option<&AssetSource> {
        self.sources.get(fingerprint)
    }

    /// Like [`get`](Self::get), but a missing entry is a validation error.
    pub fn require(&self, fingerprint: &str) -> Result<&AssetSource, ValidationError> {
        self.get(fingerprint)
            .ok_or_else(|| ValidationError::UnknownAsset(fingerprint.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
