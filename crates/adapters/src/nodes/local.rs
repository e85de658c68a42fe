// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node provider over a local directory

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobs_core::{Node, NodeProvider, NodeRequest, NodeType, ProviderError};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;

/// Exposes the files below `root` as nodes. Paths are relative to the root
/// and `/`-separated; collections are reported alongside files.
#[derive(Clone, Debug)]
pub struct LocalNodeProvider {
    root: PathBuf,
}

impl LocalNodeProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Node for `path`; symbolic links are not followed and yield `None`
    async fn node_at(&self, path: &Path) -> Result<Option<Node>, ProviderError> {
        let meta = tokio::fs::symlink_metadata(path).await?;
        if meta.file_type().is_symlink() {
            tracing::debug!(path = %path.display(), "skipping symbolic link");
            return Ok(None);
        }
        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let mtime: DateTime<Utc> = meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
        let node = if meta.is_dir() {
            Node::collection(relative, mtime)
        } else {
            Node::file(relative, meta.len(), mtime)
        };
        Ok(Some(node))
    }

    /// Join a selected path onto the root. Anything that could leave the
    /// root (`..`, drive prefixes) is refused.
    fn resolve(&self, relative: &str) -> Result<PathBuf, ProviderError> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ProviderError::Lookup(format!(
                "path outside the provider root: {}",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Walk everything below `start`, depth first
    async fn walk(&self, start: PathBuf, tx: &mpsc::Sender<Node>) -> Result<bool, ProviderError> {
        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let Some(node) = self.node_at(&path).await? else {
                    continue;
                };
                if node.node_type == NodeType::Collection {
                    stack.push(path);
                }
                if tx.send(node).await.is_err() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl NodeProvider for LocalNodeProvider {
    async fn search(
        &self,
        request: &NodeRequest,
        tx: mpsc::Sender<Node>,
    ) -> Result<(), ProviderError> {
        if !request.paths.is_empty() && !request.all {
            for relative in &request.paths {
                let path = self.resolve(relative)?;
                match self.node_at(&path).await {
                    Ok(Some(node)) => {
                        if tx.send(node).await.is_err() {
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(ProviderError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                        tracing::debug!(path = %relative, "selected path does not exist");
                    }
                    Err(e) => return Err(e),
                }
            }
            return Ok(());
        }

        // `all` or query-only selections scan the whole tree
        self.walk(self.root.clone(), &tx).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
