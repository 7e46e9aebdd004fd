//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches the configuration file and sends every valid reload.
///
/// Invalid files are reported and skipped; the receiver keeps the last good
/// configuration.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Config>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Config>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Starts watching. Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    reload(&path, &tx);
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "config watch error"),
            },
            notify::Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        info!(path = %self.path.display(), "config watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<Config>) {
    info!(path = %path.display(), "config file changed, reloading");
    match Config::load(path) {
        Ok(config) => {
            if tx.send(config).is_err() {
                warn!("config receiver dropped, ignoring reload");
            }
        }
        Err(e) => error!(error = %e, "failed to reload config, keeping current configuration"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_reload_sends_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logging.yaml");
        fs::write(&path, "log:\n  console: true\n").unwrap();
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        reload(&path, &watcher.update_tx);

        let config = rx.try_recv().unwrap();
        assert!(config.log.console);
    }

    #[test]
    fn test_reload_skips_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logging.yaml");
        fs::write(&path, "log:\n  buffer_size: 0\n").unwrap();
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        reload(&path, &watcher.update_tx);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watcher_picks_up_file_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logging.yaml");
        fs::write(&path, "log:\n  console: false\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        fs::write(&path, "log:\n  console: true\n").unwrap();

        let config = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match rx.recv().await {
                    Some(config) if config.log.console => return config,
                    Some(_) => continue,
                    None => panic!("watcher channel closed"),
                }
            }
        })
        .await
        .unwrap();
        assert!(config.log.console);
    }
}
