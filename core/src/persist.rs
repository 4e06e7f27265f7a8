use crate::config::LoadPolicy;
use crate::error::{IndexError, Result};
use crate::postings::BLOCK_CAPACITY;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::hash::Hash;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub block_capacity: u32,
    pub created_at: String,
}

impl MetaFile {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            block_capacity: BLOCK_CAPACITY as u32,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
        }
    }

    fn check_compatible(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(IndexError::IncompatibleFormat(format!(
                "version {} (supported: {FORMAT_VERSION})",
                self.version
            )));
        }
        if self.block_capacity != BLOCK_CAPACITY as u32 {
            return Err(IndexError::IncompatibleFormat(format!(
                "block capacity {} (supported: {BLOCK_CAPACITY})",
                self.block_capacity
            )));
        }
        Ok(())
    }
}

impl Default for MetaFile {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn terms(&self) -> PathBuf { self.root.join("terms.db") }
    pub fn ids(&self) -> PathBuf { self.root.join("ids.db") }
    pub fn names(&self) -> PathBuf { self.root.join("names.db") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Load a bincode table. `Ok(None)` means the table was never written:
/// the file is missing or empty.
pub fn load_table<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    if buf.is_empty() {
        return Ok(None);
    }
    let table = bincode::deserialize(&buf)?;
    Ok(Some(table))
}

pub fn save_table<T: Serialize>(path: &Path, table: &T, sync: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut f = File::create(path)?;
    let bytes = bincode::serialize(table)?;
    f.write_all(&bytes)?;
    if sync {
        f.sync_data()?;
    }
    Ok(())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Read the manifest, writing a fresh one on first open.
pub fn ensure_meta(paths: &IndexPaths, policy: LoadPolicy) -> Result<MetaFile> {
    match load_meta(paths) {
        Ok(meta) => {
            meta.check_compatible()?;
            Ok(meta)
        }
        Err(IndexError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            let meta = MetaFile::new();
            save_meta(paths, &meta)?;
            tracing::info!(root = %paths.root.display(), "created index manifest");
            Ok(meta)
        }
        Err(err) if policy.is_strict() => Err(IndexError::StoreUnavailable {
            path: paths.meta(),
            reason: err.to_string(),
        }),
        Err(err) => {
            tracing::warn!(path = %paths.meta().display(), error = %err, "unreadable manifest, assuming current format");
            Ok(MetaFile::new())
        }
    }
}

/// In-memory map mirrored to a single file, rewritten in full on every insert.
#[derive(Debug)]
pub(crate) struct Table<K, V> {
    path: PathBuf,
    entries: HashMap<K, V>,
    sync: bool,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub(crate) fn open(path: PathBuf, policy: LoadPolicy, sync: bool) -> Result<Self> {
        let entries = match load_table(&path) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no table on disk, starting empty");
                HashMap::new()
            }
            Err(err) if policy.is_strict() => {
                return Err(IndexError::StoreUnavailable { path, reason: err.to_string() });
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable table, starting empty");
                HashMap::new()
            }
        };
        Ok(Self { path, entries, sync })
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub(crate) fn get_by<Q>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert and persist. The in-memory entry is rolled back if the write fails.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Result<()>
    where
        K: Clone,
    {
        let rollback = key.clone();
        let previous = self.entries.insert(key, value);
        if let Err(err) = save_table(&self.path, &self.entries, self.sync) {
            match previous {
                Some(v) => {
                    self.entries.insert(rollback, v);
                }
                None => {
                    self.entries.remove(&rollback);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
