//! Inverted-list index: normalized terms mapped to chains of document-id
//! blocks on disk, with boolean AND queries over them.

pub mod config;
pub mod error;
pub mod index;
pub mod names;
pub mod persist;
pub mod postings;
pub mod terms;
pub mod tokenizer;

pub use config::{IndexConfig, LoadPolicy};
pub use error::{IndexError, Result};
pub use index::{BlockOffset, DocId, Document, IndexEngine, IndexStats};
pub use names::NameStore;
pub use postings::{PostingBlock, PostingStore};
pub use terms::TermDictionary;
pub use tokenizer::{FoldingNormalizer, Normalizer};
