//! Hot reload of QoS thresholds from the config file.
//!
//! The parent directory is watched rather than the file itself: editors that
//! save by rename and ConfigMap mounts that swap a `..data` symlink replace
//! the inode, which would silently end a watch on the file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::QosConfig;

/// Symlink Kubernetes swaps when a mounted ConfigMap changes.
const CONFIGMAP_DATA_LINK: &str = "..data";

/// Watches the config file and forwards the `qos` section of every valid
/// rewrite.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<QosConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated QoS updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<QosConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let tx = self.update_tx;
        let path = self.path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    if !touches_config(&event, &file_name) {
                        return;
                    }
                    tracing::info!(path = ?path, "Config file change detected, reloading QoS");
                    match load_config(&path) {
                        Ok(config) => {
                            let _ = tx.send(config.qos);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Config reload failed, keeping current thresholds");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

fn touches_config(event: &Event, file_name: &OsString) -> bool {
    event.paths.iter().any(|p| match p.file_name() {
        Some(name) => name == file_name.as_os_str() || name == CONFIGMAP_DATA_LINK,
        None => false,
    })
}
