//! Artifact stores and the compiled-pattern cache.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use graft_ir::Pattern;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::error::*;

/// Blob store keyed by relative path.
pub trait ArtifactStore {
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>>;

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl ArtifactStore for MemoryStore {
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.get(path).cloned())
    }

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Store rooted at a directory; paths may contain `/` separated subdirectories.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for DirStore {
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(path);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Artifact { path, source }),
        }
    }

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(ArtifactSnafu { path: parent })?;
        }
        std::fs::write(&path, bytes).context(ArtifactSnafu { path })
    }
}

/// Compiled patterns, stored as `patterns/<key>.<fingerprint>.cbor` and
/// shared in memory by fingerprint.
///
/// The fingerprint in the blob path ties a blob to the pattern it was written
/// for: once a rule's pattern changes, its old blob is no longer looked up.
#[derive(Debug, Default)]
pub struct PatternCache {
    by_fingerprint: HashMap<u64, Pattern>,
    by_key: HashMap<String, u64>,
    loaded: usize,
    stored: usize,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blob_path(key: &str, fingerprint: u64) -> String {
        format!("patterns/{key}.{fingerprint:016x}.cbor")
    }

    /// Pattern registered under `key`.
    ///
    /// On a memo miss the pattern is compiled and looked up in `store` by key and
    /// fingerprint. A matching blob is loaded; a missing, unreadable or mismatched
    /// one is (re)written.
    pub fn get_or_compile(
        &mut self,
        store: &mut dyn ArtifactStore,
        key: &str,
        compile: impl FnOnce() -> Pattern,
    ) -> Result<Pattern> {
        if let Some(pattern) = self.by_key.get(key).and_then(|fp| self.by_fingerprint.get(fp)) {
            return Ok(pattern.clone());
        }

        let compiled = compile();
        let fingerprint = compiled.fingerprint().context(PatternCacheSnafu { key })?;
        let path = Self::blob_path(key, fingerprint);
        let stored = match store.read_file(&path)? {
            Some(bytes) => match Pattern::from_binary(&bytes) {
                Ok(pattern) if pattern.fingerprint().ok() == Some(fingerprint) => Some(pattern),
                Ok(_) => {
                    warn!(key, path = %path, "discarding pattern blob with a foreign fingerprint");
                    None
                }
                Err(e) => {
                    warn!(key, error = %e, "discarding unreadable pattern blob");
                    None
                }
            },
            None => None,
        };
        let pattern = match stored {
            Some(pattern) => {
                self.loaded += 1;
                pattern
            }
            None => {
                let bytes = compiled.to_binary().context(PatternCacheSnafu { key })?;
                store.write_file(&path, &bytes)?;
                self.stored += 1;
                compiled
            }
        };

        debug!(key, fingerprint = %format!("{fingerprint:016x}"), "pattern cached");
        self.by_key.insert(key.to_string(), fingerprint);
        Ok(self.by_fingerprint.entry(fingerprint).or_insert(pattern).clone())
    }

    /// Patterns decoded from the store so far.
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    /// Patterns written to the store so far.
    pub fn stored(&self) -> usize {
        self.stored
    }

    /// Distinct patterns held in memory.
    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}
