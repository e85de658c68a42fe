// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields a working daemon rooted in the platform data
//! directory.

use crate::lifecycle::LifecycleError;
use jobs_core::{Job, User};
use jobs_engine::{MaintenanceConfig, RuntimeConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Store, lock file and log live here
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/jobsd.log`
    pub log_path: Option<PathBuf>,
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_level: String,
    pub workers: usize,
    pub status_max_retries: u32,
    pub dead_letter_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub status_retry_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
    /// Running tasks older than this are considered stuck
    #[serde(with = "humantime_serde")]
    pub stale_threshold: Duration,
    /// Terminal tasks kept per job
    pub prune_keep: usize,
    /// ISO-8601 period of the maintenance jobs
    pub maintenance_interval: String,
    /// TOML file of `[[jobs]]` registered at startup
    pub jobs_file: Option<PathBuf>,
    /// Directory served by the filesystem node provider
    pub nodes_root: Option<PathBuf>,
    /// Users served by the directory user provider
    pub users: Vec<User>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        let maintenance = MaintenanceConfig::default();
        Self {
            data_dir: default_data_dir(),
            log_path: None,
            log_level: "info".to_string(),
            workers: runtime.workers,
            status_max_retries: runtime.status_max_retries,
            dead_letter_capacity: runtime.dead_letter_capacity,
            status_retry_interval: runtime.status_retry_interval,
            shutdown_grace: runtime.shutdown_grace,
            stale_threshold: maintenance.stale_threshold,
            prune_keep: maintenance.prune_keep,
            maintenance_interval: maintenance.interval,
            jobs_file: None,
            nodes_root: None,
            users: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("jobsd")
}

/// Contents of a jobs file
#[derive(Debug, Default, Deserialize)]
struct JobsFile {
    #[serde(default)]
    jobs: Vec<Job>,
}

impl DaemonConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, LifecycleError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| LifecycleError::ConfigRead(path.to_path_buf(), e))?;
                Self::parse(&content)
                    .map_err(|e| LifecycleError::ConfigParse(path.to_path_buf(), e))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("jobsd.log"))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("jobsd.pid")
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            workers: self.workers,
            status_max_retries: self.status_max_retries,
            dead_letter_capacity: self.dead_letter_capacity,
            status_retry_interval: self.status_retry_interval,
            shutdown_grace: self.shutdown_grace,
        }
    }

    pub fn maintenance(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            stale_threshold: self.stale_threshold,
            prune_keep: self.prune_keep,
            max_retries: self.status_max_retries,
            interval: self.maintenance_interval.clone(),
        }
    }

    /// Jobs from the configured jobs file; none when unset
    pub fn load_jobs(&self) -> Result<Vec<Job>, LifecycleError> {
        let Some(path) = &self.jobs_file else {
            return Ok(Vec::new());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| LifecycleError::ConfigRead(path.clone(), e))?;
        let file: JobsFile =
            toml::from_str(&content).map_err(|e| LifecycleError::ConfigParse(path.clone(), e))?;
        Ok(file.jobs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
