use crate::config::LoadPolicy;
use crate::error::Result;
use crate::persist::Table;
use crate::DocId;
use std::path::PathBuf;

/// Registry of document names keyed by id.
pub struct NameStore {
    table: Table<DocId, String>,
}

impl NameStore {
    pub fn open(path: PathBuf, policy: LoadPolicy, sync: bool) -> Result<Self> {
        let table = Table::open(path, policy, sync)?;
        tracing::info!(path = %table.path().display(), documents = table.len(), "loaded name store");
        Ok(Self { table })
    }

    pub fn resolve(&self, id: DocId) -> Option<&str> {
        self.table.get(&id).map(String::as_str)
    }

    /// Returns `false`, leaving the store untouched, when `id` is already taken.
    pub fn register(&mut self, id: DocId, name: &str) -> Result<bool> {
        if self.table.contains(&id) {
            return Ok(false);
        }
        self.table.insert(id, name.to_string())?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn register_then_resolve() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.db");
        let mut names = NameStore::open(path.clone(), LoadPolicy::Strict, false).unwrap();
        assert!(names.is_empty());
        assert!(names.register(3, "Paula Oliveira").unwrap());
        assert!(!names.register(3, "Someone Else").unwrap());
        assert_eq!(names.resolve(3), Some("Paula Oliveira"));
        assert_eq!(names.resolve(4), None);

        let reopened = NameStore::open(path, LoadPolicy::Strict, false).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.resolve(3), Some("Paula Oliveira"));
    }
}
