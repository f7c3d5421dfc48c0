// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workload directory tree.
//!
//! ```text
//! {root}/{id}/
//!   src/       Dockerfile and sources (build context)
//!   meta/      workload.json
//!   state/     bind-mounted at /state, read-write
//!   compose/   last generated container spec
//!   logs/      build.log
//!   runtime/   engine scratch (image id file)
//! ```

use berth_core::{ContainerSpec, WorkloadId, WorkloadMetadata};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const DOCKERFILE: &str = "Dockerfile";

const SUBDIRS: [&str; 6] = ["src", "meta", "state", "compose", "logs", "runtime"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid source path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io { path: path.to_path_buf(), source }
}

/// Check that a user-supplied source path stays inside `src/`.
pub fn validate_source_path(raw: &str) -> Result<PathBuf, StorageError> {
    let invalid = |reason| StorageError::InvalidPath { path: raw.to_string(), reason };
    if raw.is_empty() {
        return Err(invalid("empty"));
    }
    let path = Path::new(raw);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("parent directory reference")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("absolute path")),
        }
    }
    if path.components().all(|c| c == Component::CurDir) {
        return Err(invalid("no file name"));
    }
    if path == Path::new(DOCKERFILE) {
        return Err(invalid("Dockerfile is supplied separately"));
    }
    Ok(path.to_path_buf())
}

/// Filesystem layout rooted at the engine's storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workload_dir(&self, id: &WorkloadId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn src_dir(&self, id: &WorkloadId) -> PathBuf {
        self.workload_dir(id).join("src")
    }

    pub fn meta_dir(&self, id: &WorkloadId) -> PathBuf {
        self.workload_dir(id).join("meta")
    }

    pub fn state_dir(&self, id: &WorkloadId) -> PathBuf {
        self.workload_dir(id).join("state")
    }

    pub fn compose_dir(&self, id: &WorkloadId) -> PathBuf {
        self.workload_dir(id).join("compose")
    }

    pub fn logs_dir(&self, id: &WorkloadId) -> PathBuf {
        self.workload_dir(id).join("logs")
    }

    pub fn runtime_dir(&self, id: &WorkloadId) -> PathBuf {
        self.workload_dir(id).join("runtime")
    }

    pub fn dockerfile_path(&self, id: &WorkloadId) -> PathBuf {
        self.src_dir(id).join(DOCKERFILE)
    }

    pub fn build_log_path(&self, id: &WorkloadId) -> PathBuf {
        self.logs_dir(id).join("build.log")
    }

    pub fn image_id_path(&self, id: &WorkloadId) -> PathBuf {
        self.runtime_dir(id).join("image.id")
    }

    pub fn metadata_path(&self, id: &WorkloadId) -> PathBuf {
        self.meta_dir(id).join("workload.json")
    }

    pub fn spec_path(&self, id: &WorkloadId) -> PathBuf {
        self.compose_dir(id).join("spec.json")
    }

    /// Create every subdirectory. Succeeds without change when they exist.
    pub async fn ensure_folders(&self, id: &WorkloadId) -> Result<(), StorageError> {
        let base = self.workload_dir(id);
        for sub in SUBDIRS {
            let dir = base.join(sub);
            tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;
        }
        Ok(())
    }

    /// Write the Dockerfile and sources into `src/`.
    pub async fn write_sources(
        &self,
        id: &WorkloadId,
        dockerfile: &str,
        files: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let checked: Vec<(PathBuf, &String)> = files
            .iter()
            .map(|(path, content)| validate_source_path(path).map(|p| (p, content)))
            .collect::<Result<_, StorageError>>()?;

        let src = self.src_dir(id);
        tokio::fs::create_dir_all(&src).await.map_err(io_err(&src))?;

        let dockerfile_path = self.dockerfile_path(id);
        tokio::fs::write(&dockerfile_path, dockerfile).await.map_err(io_err(&dockerfile_path))?;

        for (relative, content) in checked {
            let path = src.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
            }
            tokio::fs::write(&path, content).await.map_err(io_err(&path))?;
        }
        Ok(())
    }

    pub async fn write_metadata(&self, metadata: &WorkloadMetadata) -> Result<(), StorageError> {
        self.write_json(&self.metadata_path(&metadata.id), metadata).await
    }

    pub async fn write_spec(&self, id: &WorkloadId, spec: &ContainerSpec) -> Result<(), StorageError> {
        self.write_json(&self.spec_path(id), spec).await
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }
        tokio::fs::write(path, json).await.map_err(io_err(path))
    }

    pub fn exists(&self, id: &WorkloadId) -> bool {
        self.workload_dir(id).is_dir()
    }

    /// Delete the workload's tree. Missing trees are not an error.
    pub async fn remove(&self, id: &WorkloadId) -> Result<(), StorageError> {
        let dir = self.workload_dir(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io { path: dir, source: e }),
        }
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
