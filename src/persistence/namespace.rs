//! Namespace-addressed collection files and their write locks.

use crate::collection::Collection;
use crate::error::{Result, StoreError};
use crate::persistence::json_file;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// File stem of the unnamespaced collection.
pub const DEFAULT_NAMESPACE: &str = "default";

const EXTENSION: &str = "json";

/// Normalize a caller-supplied namespace.
///
/// `None` and `Some("")` both address the default collection. Names that
/// could escape the storage directory, or that would alias the default
/// file, are rejected.
pub fn normalize(namespace: Option<&str>) -> Result<Option<&str>> {
    let ns = match namespace {
        None | Some("") => return Ok(None),
        Some(ns) => ns,
    };

    let invalid = |reason: &str| StoreError::InvalidNamespace {
        namespace: ns.to_string(),
        reason: reason.to_string(),
    };

    if ns.contains(&['/', '\\', '\0'][..]) {
        return Err(invalid("must not contain path separators"));
    }
    if ns == "." || ns == ".." {
        return Err(invalid("must not be a relative path component"));
    }
    if ns == DEFAULT_NAMESPACE {
        return Err(invalid("reserved for the unnamespaced collection"));
    }
    Ok(Some(ns))
}

/// Reads and writes one JSON file per namespace under a directory.
#[derive(Debug)]
pub struct NamespaceFiles {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NamespaceFiles {
    /// Open the storage directory, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing a (normalized) namespace.
    pub fn path(&self, namespace: Option<&str>) -> PathBuf {
        let stem = namespace.unwrap_or(DEFAULT_NAMESPACE);
        self.dir.join(format!("{}.{}", stem, EXTENSION))
    }

    /// Load a collection. Absent or corrupt files read as empty.
    pub fn load(&self, namespace: Option<&str>) -> Collection {
        json_file::load_or_default(&self.path(namespace))
    }

    /// Replace a collection's file with `collection`.
    pub fn save(&self, namespace: Option<&str>, collection: &Collection) -> Result<()> {
        json_file::save_pretty(&self.path(namespace), collection)
    }

    /// Run `f` while holding the namespace's write lock.
    ///
    /// Serializes read-modify-write cycles on one namespace among callers
    /// sharing this value. Other processes are not excluded.
    pub fn with_lock<R>(&self, namespace: Option<&str>, f: impl FnOnce() -> R) -> R {
        let key = namespace.unwrap_or(DEFAULT_NAMESPACE).to_string();
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key).or_default())
        };
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Namespaces that currently have a file, sorted. The default collection
    /// is reported as `None`.
    pub fn namespaces(&self) -> Result<Vec<Option<String>>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if stem == DEFAULT_NAMESPACE {
                    names.push(None);
                } else {
                    names.push(Some(stem.to_string()));
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::VectorRecord;
    use crate::vector::Vector;
    use tempfile::TempDir;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(None).unwrap(), None);
        assert_eq!(normalize(Some("")).unwrap(), None);
        assert_eq!(normalize(Some("faq")).unwrap(), Some("faq"));

        for bad in ["../etc", "a/b", "a\\b", "..", ".", "default", "nul\0"] {
            assert!(
                matches!(normalize(Some(bad)), Err(StoreError::InvalidNamespace { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_paths() {
        let dir = TempDir::new().unwrap();
        let files = NamespaceFiles::open(dir.path()).unwrap();
        assert_eq!(files.path(None), dir.path().join("default.json"));
        assert_eq!(files.path(Some("faq")), dir.path().join("faq.json"));
    }

    #[test]
    fn test_save_load_and_list() {
        let dir = TempDir::new().unwrap();
        let files = NamespaceFiles::open(dir.path().join("vectors")).unwrap();
        assert!(files.load(Some("faq")).is_empty());

        let collection = Collection {
            vectors: vec![VectorRecord {
                id: "r1".to_string(),
                embedding: Vector::new(vec![0.5, 0.25]),
                metadata: Default::default(),
            }],
        };
        files.save(Some("faq"), &collection).unwrap();
        files.save(None, &Collection::new()).unwrap();

        assert_eq!(files.load(Some("faq")), collection);
        assert!(files.load(None).is_empty());
        assert_eq!(
            files.namespaces().unwrap(),
            vec![None, Some("faq".to_string())]
        );
    }

    #[test]
    fn test_with_lock_returns_closure_value() {
        let dir = TempDir::new().unwrap();
        let files = NamespaceFiles::open(dir.path()).unwrap();
        let value = files.with_lock(Some("a"), || files.with_lock(Some("b"), || 7));
        assert_eq!(value, 7);
    }
}
