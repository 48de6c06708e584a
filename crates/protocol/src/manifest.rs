//! Path to fingerprint mapping submitted with a deployment.

use std::collections::{BTreeMap, HashSet};

use crate::error::ValidationError;

/// Complete desired state of a deployment: relative path → fingerprint.
///
/// Paths are stored without a leading `/` and use `/` separators. Each path
/// appears once; several paths may share a fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. A path that is already present is rejected.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let path = path.into();
        if self.entries.contains_key(&path) {
            return Err(ValidationError::DuplicatePath(path));
        }
        self.entries.insert(path, fingerprint.into());
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, f)| (p.as_str(), f.as_str()))
    }

    /// Distinct fingerprints, in path order.
    pub fn fingerprints(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .values()
            .filter(|fp| seen.insert(fp.as_str()))
            .cloned()
            .collect()
    }

    /// Wire form: every path prefixed with `/`.
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(p, f)| (format!("/{p}"), f.clone()))
            .collect()
    }

    /// Serializes the wire form as a JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_wire())
    }
}
