use crate::config::LoadPolicy;
use crate::error::Result;
use crate::persist::Table;
use crate::BlockOffset;
use std::path::PathBuf;

/// Maps each term to the offset of its posting chain head.
///
/// The whole map is rewritten on every insert, so adding a term costs
/// O(vocabulary). Head offsets never change once recorded.
pub struct TermDictionary {
    table: Table<String, BlockOffset>,
}

impl TermDictionary {
    pub fn open(path: PathBuf, policy: LoadPolicy, sync: bool) -> Result<Self> {
        let table = Table::open(path, policy, sync)?;
        tracing::info!(path = %table.path().display(), terms = table.len(), "loaded term dictionary");
        Ok(Self { table })
    }

    pub fn lookup(&self, term: &str) -> Option<BlockOffset> {
        self.table.get_by(term).copied()
    }

    /// Callers only insert terms that `lookup` did not find.
    pub fn insert(&mut self, term: &str, head: BlockOffset) -> Result<()> {
        debug_assert!(self.lookup(term).is_none(), "term {term} already has a chain");
        self.table.insert(term.to_string(), head)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
