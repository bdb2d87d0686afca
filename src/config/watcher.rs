//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by renaming a temp file over the original are still picked up.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;

/// Publishes every valid, changed version of a config file.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its update channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned handle is dropped. Invalid files are
    /// logged and skipped; a file that parses to the last published config
    /// is not re-sent.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let tx = self.update_tx;
        let path = self.path.clone();
        let last: Arc<Mutex<Option<RouterConfig>>> = Arc::new(Mutex::new(None));

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Config watch error");
                    return;
                }
            };
            if !is_relevant(&event, &file_name) {
                return;
            }

            match load_config(&path) {
                Ok(config) => {
                    let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
                    if last.as_ref() == Some(&config) {
                        return;
                    }
                    tracing::info!(path = %path.display(), "Config file changed, publishing reload");
                    *last = Some(config.clone());
                    let _ = tx.send(config);
                }
                Err(e) => tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Reloaded config is invalid, keeping current configuration"
                ),
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}
