//! Environment to log-root table.

use std::collections::HashMap;

use serde::Deserialize;

use crate::environment::DeployEnvironment;
use crate::path::TargetOs;

const DEFAULT_WINDOWS_ROOT: &str = r"D:\home\LogFiles";
const DEFAULT_POSIX_ROOT: &str = "/home/LogFiles";

/// Log root directory for one environment, per target OS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RootDirs {
    pub windows: String,
    pub posix: String,
}

impl RootDirs {
    pub fn new(windows: impl Into<String>, posix: impl Into<String>) -> Self {
        Self {
            windows: windows.into(),
            posix: posix.into(),
        }
    }

    pub fn for_os(&self, os: TargetOs) -> &str {
        match os {
            TargetOs::Windows => &self.windows,
            TargetOs::Posix => &self.posix,
        }
    }
}

impl Default for RootDirs {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOWS_ROOT, DEFAULT_POSIX_ROOT)
    }
}

/// Maps hosted environments to their log root.
///
/// Environments without an entry log under the relative `logs` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPathTable {
    roots: HashMap<DeployEnvironment, RootDirs>,
}

impl LogPathTable {
    /// A table with no hosted roots: everything logs under `logs/`.
    pub fn empty() -> Self {
        Self {
            roots: HashMap::new(),
        }
    }

    pub fn with_root(mut self, env: DeployEnvironment, dirs: RootDirs) -> Self {
        self.roots.insert(env, dirs);
        self
    }

    pub fn root(&self, env: DeployEnvironment, os: TargetOs) -> Option<&str> {
        self.roots.get(&env).map(|dirs| dirs.for_os(os))
    }

    /// Applies configured overrides on top of this table.
    ///
    /// Keys are environment names; unknown names are returned as errors by
    /// config validation before this is reached, and skipped here.
    pub fn merged(mut self, overrides: &HashMap<String, RootDirs>) -> Self {
        for (name, dirs) in overrides {
            if let Some(env) = DeployEnvironment::from_name(name) {
                self.roots.insert(env, dirs.clone());
            }
        }
        self
    }
}

impl Default for LogPathTable {
    fn default() -> Self {
        DeployEnvironment::ALL
            .into_iter()
            .filter(DeployEnvironment::is_hosted)
            .fold(Self::empty(), |table, env| {
                table.with_root(env, RootDirs::default())
            })
    }
}
