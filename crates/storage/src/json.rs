// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file-based persistence: one file per record under `<base>/<kind>/`

use crate::store::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct JsonStore {
    base_path: PathBuf,
}

impl JsonStore {
    /// Open a store at the given path, creating it if needed
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write a record, replacing any previous version atomically
    pub fn save<T: Serialize>(&self, kind: &str, id: &str, data: &T) -> Result<(), StoreError> {
        let path = self.path_for(kind, id)?;
        let dir = self.base_path.join(kind);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(data)?;
        let tmp = dir.join(format!(".{}.tmp", id));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(kind, id)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(kind, id)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// All ids of a kind
    pub fn list(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.base_path.join(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Every record of a kind; unreadable files are skipped with a warning
    pub fn load_all<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for id in self.list(kind)? {
            match self.load(kind, &id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(kind, id, error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }

    fn path_for(&self, kind: &str, id: &str) -> Result<PathBuf, StoreError> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.base_path.join(kind).join(format!("{}.json", id)))
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
