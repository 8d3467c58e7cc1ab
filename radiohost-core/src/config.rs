//! Context configuration: library search path and runtime memory limit.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RadioError, RadioResult};

pub const ENV_LIBRARY_PATH: &str = "RADIOHOST_LIBRARY_PATH";
pub const ENV_MEMORY_LIMIT: &str = "RADIOHOST_MEMORY_LIMIT";

/// Settings applied when a context's runtime is created.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContextConfig {
    /// Directories searched for the pipeline library before the runtime's
    /// default `package.path`.
    pub library_path: Vec<PathBuf>,
    /// Upper bound on runtime memory, in bytes.
    pub memory_limit: Option<usize>,
}

impl ContextConfig {
    /// Load from TOML string.
    pub fn from_toml(s: &str) -> RadioResult<Self> {
        toml::from_str(s).map_err(|e| RadioError::Config(e.to_string()))
    }

    /// Load from file path.
    pub fn load_path(path: &Path) -> RadioResult<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| RadioError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&s)
    }

    /// Defaults overridden by `RADIOHOST_LIBRARY_PATH` and `RADIOHOST_MEMORY_LIMIT`.
    pub fn from_env() -> RadioResult<Self> {
        Self::default().with_env()
    }

    /// Apply environment overrides on top of `self`. Library directories from
    /// the environment are searched before the configured ones.
    pub fn with_env(mut self) -> RadioResult<Self> {
        if let Some(paths) = std::env::var_os(ENV_LIBRARY_PATH) {
            let mut dirs: Vec<PathBuf> = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            dirs.append(&mut self.library_path);
            self.library_path = dirs;
        }
        if let Ok(limit) = std::env::var(ENV_MEMORY_LIMIT) {
            let limit = limit.trim().parse::<usize>().map_err(|e| {
                RadioError::Config(format!("{ENV_MEMORY_LIMIT}={limit:?}: {e}"))
            })?;
            self.memory_limit = Some(limit);
        }
        Ok(self)
    }

    /// `package.path` entries for the configured library directories.
    pub(crate) fn package_path_prefix(&self) -> String {
        self.library_path
            .iter()
            .map(|dir| {
                let dir = dir.to_string_lossy();
                format!("{dir}/?.lua;{dir}/?/init.lua;")
            })
            .collect()
    }
}
