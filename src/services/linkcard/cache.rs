// src/services/linkcard/cache.rs

//! URL-keyed JSON caches for link metadata.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;
use crate::storage::{read_json_file, write_json_file};

/// A persistent map from URL to cached value, backed by one JSON file.
///
/// Loaded once, mutated in memory and written back by [`LinkCache::persist`].
/// Entries never expire.
#[derive(Debug, Clone)]
pub struct LinkCache<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
    dirty: bool,
}

impl<V: Serialize + DeserializeOwned> LinkCache<V> {
    /// Empty cache that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the cache file. A missing or unreadable file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match read_json_file::<BTreeMap<String, V>>(&path) {
            Ok(Some(entries)) => {
                log::debug!("Loaded {} cached links from {:?}", entries.len(), path);
                Self {
                    path,
                    entries,
                    dirty: false,
                }
            }
            Ok(None) => {
                log::warn!("Link cache {:?} not found, starting empty", path);
                Self::empty(path)
            }
            Err(e) => {
                log::warn!("Link cache {:?} is unreadable ({}), starting empty", path, e);
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, url: &str) -> Option<&V> {
        self.entries.get(url)
    }

    pub fn insert(&mut self, url: impl Into<String>, value: V) {
        self.entries.insert(url.into(), value);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache back if anything was inserted since loading.
    pub fn persist(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        write_json_file(&self.path, &self.entries)?;
        self.dirty = false;
        log::info!("Saved {} cached links to {:?}", self.entries.len(), self.path);
        Ok(true)
    }
}
