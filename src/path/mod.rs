//! Log file path resolution.
//!
//! Hosted environments (Development, Staging, Production) write under a
//! platform log root taken from a [`LogPathTable`]; everything else, and any
//! host where that root is missing, writes under the relative `logs/`
//! directory.

mod table;

pub use table::{LogPathTable, RootDirs};

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::environment::DeployEnvironment;

/// Relative directory used outside hosted environments.
pub const RELATIVE_LOG_DIR: &str = "logs";

const PROBE_FILE_NAME: &str = ".write-probe";

/// Operating system family the path is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Windows,
    Posix,
}

impl TargetOs {
    pub fn current() -> Self {
        if cfg!(windows) {
            TargetOs::Windows
        } else {
            TargetOs::Posix
        }
    }

    pub fn separator(&self) -> char {
        match self {
            TargetOs::Windows => '\\',
            TargetOs::Posix => '/',
        }
    }
}

/// Log file name template.
///
/// The rolling writer inserts the date before the extension, so `log.log`
/// becomes `log20240101.log` and `log-.log` becomes `log-20240101.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName(String);

impl LogFileName {
    pub const FIXED: &'static str = "log.log";
    pub const DATED: &'static str = "log-.log";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn fixed() -> Self {
        Self::new(Self::FIXED)
    }

    pub fn dated() -> Self {
        Self::new(Self::DATED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the name into stem and extension (with its leading dot).
    pub fn split(&self) -> (&str, &str) {
        match self.0.rfind('.') {
            Some(idx) if idx > 0 => self.0.split_at(idx),
            _ => (self.0.as_str(), ""),
        }
    }
}

impl Default for LogFileName {
    fn default() -> Self {
        Self::fixed()
    }
}

impl fmt::Display for LogFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved path of the log file template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogPath(String);

impl LogPath {
    /// `logs/<file_name>`, identical on every OS.
    pub fn relative(file_name: &LogFileName) -> Self {
        Self(format!("{}/{}", RELATIVE_LOG_DIR, file_name))
    }

    /// Joins a root directory and file name with the OS separator.
    pub fn rooted(root: &str, file_name: &LogFileName, os: TargetOs) -> Self {
        let sep = os.separator();
        let root = root.trim_end_matches(['/', '\\']);
        Self(format!("{}{}{}", root, sep, file_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Directory holding the log file, if the path has one.
    pub fn directory(&self) -> Option<&Path> {
        self.as_path()
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// File name component of the path.
    pub fn file_name(&self) -> LogFileName {
        let name = self
            .as_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.clone());
        LogFileName::new(name)
    }
}

impl fmt::Display for LogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for LogPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

/// Resolves the log path for an environment on a given OS.
///
/// Pure: no filesystem access. `None` (unrecognized environment), `Test`
/// and `Local` resolve to `logs/<file_name>`.
pub fn resolve(
    env: Option<DeployEnvironment>,
    file_name: &LogFileName,
    os: TargetOs,
    table: &LogPathTable,
) -> LogPath {
    match env.and_then(|env| table.root(env, os)) {
        Some(root) => LogPath::rooted(root, file_name, os),
        None => LogPath::relative(file_name),
    }
}

/// Resolves for the running OS, falling back to `logs/<file_name>` when the
/// hosted root directory does not exist on this machine.
pub fn resolve_with_fallback(
    env: Option<DeployEnvironment>,
    file_name: &LogFileName,
    table: &LogPathTable,
) -> LogPath {
    let os = TargetOs::current();
    match env.and_then(|env| table.root(env, os)) {
        Some(root) if Path::new(root).is_dir() => LogPath::rooted(root, file_name, os),
        Some(root) => {
            debug!(root, "log root missing, using relative log directory");
            LogPath::relative(file_name)
        }
        None => LogPath::relative(file_name),
    }
}

/// Async form of [`resolve_with_fallback`].
///
/// Meant to be awaited once at startup; the result is then passed around as
/// a plain value.
pub async fn resolve_async(
    env: Option<DeployEnvironment>,
    file_name: &LogFileName,
    table: &LogPathTable,
) -> LogPath {
    let os = TargetOs::current();
    let Some(root) = env.and_then(|env| table.root(env, os)) else {
        return LogPath::relative(file_name);
    };

    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => LogPath::rooted(root, file_name, os),
        _ => {
            debug!(root, "log root missing, using relative log directory");
            LogPath::relative(file_name)
        }
    }
}

/// Creates the directory holding `path`. Idempotent.
pub fn ensure_parent_dir(path: &LogPath) -> io::Result<()> {
    if let Some(dir) = path.directory() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Removes a file left at exactly `path` by a previous run.
///
/// Failures are ignored.
pub fn delete_if_exists(path: &LogPath) {
    if path.as_path().is_file() {
        if let Err(e) = fs::remove_file(path.as_path()) {
            debug!(path = %path, error = %e, "failed to delete previous log file");
        }
    }
}

/// Checks that the log directory is writable.
///
/// Never fails: problems are reported on stdout because the logging
/// pipeline is not running yet. Returns whether the probe succeeded.
pub fn probe_write(path: &LogPath) -> bool {
    let dir = path
        .directory()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let probe = dir.join(PROBE_FILE_NAME);

    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&probe)
        .and_then(|mut file| file.write_all(b"probe\n"))
        .and_then(|_| fs::remove_file(&probe));

    match result {
        Ok(()) => true,
        Err(e) => {
            println!("[probe] Cannot write to log directory {}: {}", dir.display(), e);
            false
        }
    }
}
