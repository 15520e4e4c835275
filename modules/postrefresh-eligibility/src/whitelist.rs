use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use postrefresh_common::{RefreshError, RefreshResult};

/// Outlet ids allowed to be processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Whitelist(HashSet<i64>);

impl Whitelist {
    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<i64> for Whitelist {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Read a whitelist from a JSON array of integers.
pub fn load_whitelist(path: &Path) -> RefreshResult<Whitelist> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RefreshError::Whitelist(format!("failed to read {}: {e}", path.display()))
    })?;
    let whitelist: Whitelist = serde_json::from_str(&content).map_err(|e| {
        RefreshError::Whitelist(format!("failed to parse {}: {e}", path.display()))
    })?;
    tracing::info!(path = %path.display(), ids = whitelist.len(), "Loaded media id whitelist");
    Ok(whitelist)
}
