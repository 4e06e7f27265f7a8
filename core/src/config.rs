use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::persist::IndexPaths;

/// How the stores react to unreadable data found on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadPolicy {
    /// Fall back to an empty table or an empty slot and log a warning.
    #[default]
    Tolerant,
    /// Surface the failure to the caller.
    Strict,
}

impl LoadPolicy {
    pub fn is_strict(self) -> bool {
        self == LoadPolicy::Strict
    }
}

/// Index configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the term, posting and name files
    pub root: PathBuf,
    pub load_policy: LoadPolicy,
    /// Sync file contents to disk after every write
    pub sync_writes: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./index"),
            load_policy: LoadPolicy::Tolerant,
            sync_writes: false,
        }
    }
}

impl IndexConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), ..Self::default() }
    }

    pub fn with_load_policy(mut self, load_policy: LoadPolicy) -> Self {
        self.load_policy = load_policy;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn paths(&self) -> IndexPaths {
        IndexPaths::new(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_tolerant() {
        let config = IndexConfig::default();
        assert_eq!(config.root, PathBuf::from("./index"));
        assert_eq!(config.load_policy, LoadPolicy::Tolerant);
        assert!(!config.sync_writes);
    }

    #[test]
    fn builder_overrides() {
        let config = IndexConfig::new("/tmp/idx").with_load_policy(LoadPolicy::Strict).with_sync_writes(true);
        assert!(config.load_policy.is_strict());
        assert!(config.sync_writes);
        assert_eq!(config.paths().terms(), PathBuf::from("/tmp/idx/terms.db"));
    }
}
