//! Folder walking.
//!
//! Recursively walks the deploy folder in sorted order, skipping ignored
//! names, and fingerprints every regular file. Relative paths are
//! normalized to forward slashes.

use std::collections::BTreeSet;
use std::path::Path;

use pagedrop_protocol::{Manifest, ValidationError};
use tracing::debug;

use crate::ManifestError;
use crate::fingerprint::fingerprint_file;
use crate::index::{AssetIndex, AssetSource};
use crate::mime::content_type_for;
use crate::validation::validate_relative_path;

/// Largest single file accepted by default: 25 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// File and directory names skipped by default: VCS metadata, OS and
/// editor artifacts, build-tool output.
pub const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    ".idea",
    ".vscode",
    "node_modules",
    ".wrangler",
    ".cache",
    ".turbo",
];

/// Options for [`build_manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOptions {
    pub max_file_size: u64,
    /// Names matched against every path component.
    pub ignore: BTreeSet<String>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            ignore: DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ManifestOptions {
    fn is_ignored(&self, name: &str) -> bool {
        self.ignore.contains(name)
    }
}

/// A file that made it into the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub relative_path: String,
    pub fingerprint: String,
    pub size: u64,
    pub content_type: String,
}

/// Output of [`build_manifest`].
#[derive(Debug, Clone, Default)]
pub struct BuiltManifest {
    pub manifest: Manifest,
    pub index: AssetIndex,
    /// Entries in traversal order.
    pub files: Vec<FileEntry>,
    pub total_size: u64,
}

/// Builds the manifest for everything under `root`.
///
/// Fails fast on the first file larger than `options.max_file_size`,
/// naming its relative path. Symlinks are not followed.
pub fn build_manifest(root: &Path, options: &ManifestOptions) -> Result<BuiltManifest, ManifestError> {
    if !root.is_dir() {
        return Err(ValidationError::NotADirectory(root.display().to_string()).into());
    }

    let mut built = BuiltManifest::default();
    walk_dir(root, root, options, &mut built)?;

    debug!(
        root = %root.display(),
        files = built.files.len(),
        unique = built.index.len(),
        total_bytes = built.total_size,
        "manifest built"
    );

    Ok(built)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    options: &ManifestOptions,
    built: &mut BuiltManifest,
) -> Result<(), ManifestError> {
    let mut entries = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        if options.is_ignored(&name.to_string_lossy()) {
            debug!(path = %entry.path().display(), "ignored");
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &path, options, built)?;
        } else if file_type.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;

            // Normalize to forward slashes.
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");
            validate_relative_path(&rel_str)?;

            let size = entry.metadata()?.len();
            if size > options.max_file_size {
                return Err(ValidationError::FileTooLarge {
                    path: rel_str,
                    size,
                    max: options.max_file_size,
                }
                .into());
            }

            let fingerprint = fingerprint_file(&path)?;
            let content_type = content_type_for(&rel_str).to_string();

            built.manifest.insert(rel_str.clone(), fingerprint.clone())?;
            built.index.insert(
                fingerprint.clone(),
                AssetSource {
                    path: path.clone(),
                    relative_path: rel_str.clone(),
                    size,
                    content_type: content_type.clone(),
                },
            );
            built.files.push(FileEntry {
                relative_path: rel_str,
                fingerprint,
                size,
                content_type,
            });
            built.total_size += size;
        } else {
            debug!(path = %path.display(), "skipping non-regular file");
        }
    }

    Ok(())
}
