use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::names::NameStore;
use crate::persist::{ensure_meta, IndexPaths, MetaFile};
use crate::postings::{PostingStore, EMPTY_SLOT};
use crate::terms::TermDictionary;
use crate::tokenizer::{FoldingNormalizer, Normalizer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::create_dir_all;

pub type DocId = i32;
/// Byte offset of a posting block in the posting file.
pub type BlockOffset = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub terms: usize,
    pub blocks: u64,
    pub posting_bytes: u64,
    pub created_at: String,
}

/// Boolean containment index over document names.
///
/// Owns the name registry, the term dictionary and the posting file. Both
/// maps are loaded once on open and flushed to disk on every mutation.
pub struct IndexEngine<N: Normalizer = FoldingNormalizer> {
    paths: IndexPaths,
    meta: MetaFile,
    names: NameStore,
    terms: TermDictionary,
    postings: PostingStore,
    normalizer: N,
}

impl IndexEngine<FoldingNormalizer> {
    pub fn open(config: &IndexConfig) -> Result<Self> {
        Self::with_normalizer(config, FoldingNormalizer::default())
    }
}

impl<N: Normalizer> IndexEngine<N> {
    pub fn with_normalizer(config: &IndexConfig, normalizer: N) -> Result<Self> {
        let paths = config.paths();
        create_dir_all(&paths.root)?;
        let meta = ensure_meta(&paths, config.load_policy)?;
        let names = NameStore::open(paths.names(), config.load_policy, config.sync_writes)?;
        let terms = TermDictionary::open(paths.terms(), config.load_policy, config.sync_writes)?;
        let postings = PostingStore::open(paths.ids(), config.load_policy, config.sync_writes)?;
        tracing::info!(root = %paths.root.display(), policy = ?config.load_policy, "opened index");
        Ok(Self { paths, meta, names, terms, postings, normalizer })
    }

    /// Register a document and index the terms of its name.
    ///
    /// Fails with [`IndexError::DuplicateDocument`] without touching the index
    /// when `id` is already registered.
    pub fn register(&mut self, id: DocId, name: &str) -> Result<()> {
        if id == EMPTY_SLOT {
            return Err(IndexError::ReservedId(id));
        }
        if !self.names.register(id, name)? {
            tracing::debug!(id, "document already registered");
            return Err(IndexError::DuplicateDocument(id));
        }

        let mut indexed = 0;
        for term in self.normalizer.terms(name) {
            if term.trim().is_empty() {
                continue;
            }
            self.index_term(&term, id)?;
            indexed += 1;
        }
        tracing::info!(id, terms = indexed, "registered document");
        Ok(())
    }

    pub fn register_document(&mut self, doc: &Document) -> Result<()> {
        self.register(doc.id, &doc.name)
    }

    fn index_term(&mut self, term: &str, id: DocId) -> Result<()> {
        match self.terms.lookup(term) {
            Some(head) => self.postings.append(head, id),
            None => {
                // Head block first: a crash in between leaves an orphan block, never a dangling term.
                let address = self.postings.end_of_file()?;
                self.postings.create_chain(address, id)?;
                self.terms.insert(term, address)?;
                tracing::debug!(term, address, "new posting chain");
                Ok(())
            }
        }
    }

    /// Ids of documents containing every known term in `terms`.
    ///
    /// The first term found in the dictionary seeds the result and each later
    /// known term narrows it. Unknown terms are skipped, so a query made only
    /// of unknown terms returns nothing.
    pub fn query<S: AsRef<str>>(&self, terms: &[S]) -> Result<Vec<DocId>> {
        let mut result: Option<Vec<DocId>> = None;
        for term in terms {
            let term = term.as_ref();
            let Some(head) = self.terms.lookup(term) else {
                tracing::debug!(term, "unknown term skipped");
                continue;
            };
            let ids = self.postings.retrieve(head)?;
            result = Some(match result {
                None => ids,
                Some(current) => intersect(current, &ids),
            });
        }
        Ok(result.unwrap_or_default())
    }

    /// Normalize raw query text, then [`IndexEngine::query`] its terms.
    pub fn search(&self, text: &str) -> Result<Vec<DocId>> {
        let terms = self.normalizer.terms(text);
        self.query(&terms)
    }

    pub fn resolve_name(&self, id: DocId) -> Option<&str> {
        self.names.resolve(id)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            documents: self.names.len(),
            terms: self.terms.len(),
            blocks: self.postings.block_count()?,
            posting_bytes: self.postings.end_of_file()?,
            created_at: self.meta.created_at.clone(),
        })
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }
}

/// Keeps the order of `current`.
fn intersect(current: Vec<DocId>, other: &[DocId]) -> Vec<DocId> {
    let other: HashSet<DocId> = other.iter().copied().collect();
    current.into_iter().filter(|id| other.contains(id)).collect()
}
