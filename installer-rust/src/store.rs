//! The per-user environment store: a persistent key/value tree scoped to the
//! current user. On Windows this is `HKEY_CURRENT_USER`; elsewhere a JSON
//! document stands in for it.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{error::StoreError, fs_ops};

pub const ENVIRONMENT_KEY: &str = "Environment";
pub const PATH_VALUE: &str = "Path";
pub const CLASSES_KEY: &str = r"Software\Classes";

/// Name of a key's unnamed (default) value.
pub const DEFAULT_VALUE: &str = "";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    /// Expanded against the environment on read (`%USERPROFILE%` etc).
    ExpandString,
}

/// Read-modify-write access to the per-user store. Keys are paths relative
/// to the user root, separated by `\`.
pub trait EnvironmentStore {
    /// `Ok(None)` when the key or value does not exist.
    fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, StoreError>;

    /// Creates `key` if needed and replaces the value.
    fn write_string(
        &mut self,
        key: &str,
        name: &str,
        value: &str,
        kind: ValueKind,
    ) -> Result<(), StoreError>;

    /// Tells running processes the environment block changed.
    fn broadcast_environment_change(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredValue {
    pub kind: ValueKind,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreDocument {
    #[serde(default)]
    pub keys: BTreeMap<String, BTreeMap<String, StoredValue>>,
}

/// File-backed store. Every write persists the whole document.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl JsonStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let doc = if path.exists() {
            read_document(path)?
        } else {
            StoreDocument::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    fn save(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = serde_json::to_vec_pretty(doc).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs_ops::write_bytes_atomic(&self.path, &contents).map_err(io_err)
    }
}

impl EnvironmentStore for JsonStore {
    fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .doc
            .keys
            .get(&normalize_key(key))
            .and_then(|values| values.get(&normalize_name(name)))
            .map(|v| v.data.clone()))
    }

    fn write_string(
        &mut self,
        key: &str,
        name: &str,
        value: &str,
        kind: ValueKind,
    ) -> Result<(), StoreError> {
        let mut doc = self.doc.clone();
        doc.keys.entry(normalize_key(key)).or_default().insert(
            normalize_name(name),
            StoredValue {
                kind,
                data: value.to_string(),
            },
        );
        self.save(&doc)?;
        self.doc = doc;
        Ok(())
    }

    fn broadcast_environment_change(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub fn read_document(path: &Path) -> Result<StoreDocument, StoreError> {
    let s = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&s).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

// Registry key and value names are case-insensitive.
fn normalize_key(key: &str) -> String {
    key.trim_matches('\\').to_ascii_lowercase()
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
}
