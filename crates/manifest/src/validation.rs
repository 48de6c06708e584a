use std::path::{Component, Path};

use pagedrop_protocol::ValidationError;

/// Validates that a manifest path stays inside the deployed folder.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_relative_path(rel_path: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidPath {
        path: rel_path.to_string(),
        reason,
    };

    if rel_path.is_empty() {
        return Err(invalid("empty path"));
    }

    let path = Path::new(rel_path);
    if path.is_absolute() {
        return Err(invalid("absolute path not allowed"));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => return Err(invalid("parent directory traversal not allowed")),
            Component::Prefix(_) => return Err(invalid("path prefix not allowed")),
            Component::RootDir => return Err(invalid("absolute path not allowed")),
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}
