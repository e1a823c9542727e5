//! Reversal cache: what a package reference looked like before it was
//! turned into a project reference, so the reverse conversion can restore it
//! exactly.
//!
//! Stored as TOML next to the solution:
//!
//! ```toml
//! [[entry]]
//! owner = "{A0B1C2D3-1111-4A4A-9B9B-000000000001}"
//! name = "Foo"
//! kind = "assembly"
//! version = "1.2.3"
//! target_framework = "net461"
//! include = "Foo, Version=1.2.3.0, Culture=neutral"
//! hint_path = "..\\..\\packages\\Foo.1.2.3\\lib\\net461\\Foo.dll"
//! private = "True"
//! element = '<Reference Include="Foo, Version=1.2.3.0, Culture=neutral"><HintPath>..\..\packages\Foo.1.2.3\lib\net461\Foo.dll</HintPath><Private>True</Private></Reference>'
//! ```
//!
//! `element` is the replaced element as written, restored verbatim when
//! present. The other fields rebuild the reference when it is missing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::project::ReferenceKind;
use crate::solution::ProjectId;
use crate::storage::{self, StorageError};

/// The reference and package entry a conversion replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPackage {
    pub owner: String,
    pub name: String,
    pub kind: ReferenceKind,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
    pub include: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default, rename = "entry")]
    entries: Vec<CachedPackage>,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to parse reversal cache {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize reversal cache: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Entries keyed by `(owner id, package name)`, both case-insensitive.
#[derive(Debug, Default, Clone)]
pub struct ReversalCache {
    entries: BTreeMap<(String, String), CachedPackage>,
    changed: bool,
}

impl ReversalCache {
    /// Read a cache file; a missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let bytes = storage::read(path)?;
        let file: CacheFile = toml::from_str(&String::from_utf8_lossy(&bytes))
            .map_err(|source| CacheError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let mut cache = Self::default();
        for entry in file.entries {
            cache.entries.insert(key(&entry.owner, &entry.name), entry);
        }
        debug!(path = %path.display(), entries = cache.entries.len(), "loaded reversal cache");
        Ok(cache)
    }

    /// Add entries from `other` that this cache does not hold yet.
    pub fn merge_missing(&mut self, other: ReversalCache) {
        for (k, entry) in other.entries {
            self.entries.entry(k).or_insert(entry);
        }
    }

    pub fn insert(&mut self, entry: CachedPackage) {
        self.entries.insert(key(&entry.owner, &entry.name), entry);
        self.changed = true;
    }

    pub fn get(&self, owner: &ProjectId, name: &str) -> Option<&CachedPackage> {
        self.entries.get(&key(owner.as_str(), name))
    }

    pub fn remove(&mut self, owner: &ProjectId, name: &str) -> Option<CachedPackage> {
        let removed = self.entries.remove(&key(owner.as_str(), name));
        if removed.is_some() {
            self.changed = true;
        }
        removed
    }

    /// Put back the entries `previous` held for `owner`, dropping any made
    /// since.
    pub fn revert_owner(&mut self, previous: &ReversalCache, owner: &ProjectId) {
        let (owner_key, _) = key(owner.as_str(), "");
        self.entries.retain(|(entry_owner, _), _| *entry_owner != owner_key);
        for (k, entry) in &previous.entries {
            if k.0 == owner_key {
                self.entries.insert(k.clone(), entry.clone());
            }
        }
        self.changed = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Persist the cache. An empty cache removes the file.
    pub fn save(&mut self, path: &Path) -> Result<(), CacheError> {
        if self.entries.is_empty() {
            if path.is_file() {
                storage::delete(path)?;
            }
        } else {
            let file = CacheFile {
                entries: self.entries.values().cloned().collect(),
            };
            let text = toml::to_string_pretty(&file)?;
            storage::write_atomic(path, text.as_bytes())?;
        }
        self.changed = false;
        Ok(())
    }
}

fn key(owner: &str, name: &str) -> (String, String) {
    let owner = owner.trim_matches(['{', '}']).to_ascii_uppercase();
    (owner, name.to_ascii_lowercase())
}
