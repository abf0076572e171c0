//! Stop file watcher
//!
//! Creating the stop file (e.g. `touch PLAYDECK_STOP` over ssh) stops the
//! service cleanly. The directory is watched with notify; a file left over
//! from an earlier run is removed at startup.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::Lifecycle;

pub struct StopFileWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl StopFileWatcher {
    /// Watch `dir` for a file called `name`
    pub fn new(dir: impl AsRef<Path>, name: &str, lifecycle: Lifecycle) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(name);

        if path.exists() {
            info!("Removing stale stop file {}", path.display());
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale stop file: {}", path.display()))?;
        }

        let target = path.clone();
        // notify callbacks run on their own OS thread; Lifecycle is thread-safe
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    if !event.paths.iter().any(|p| p.file_name() == target.file_name()) {
                        return;
                    }
                    debug!("Stop file event: {:?}", event.kind);
                    if !target.exists() {
                        return;
                    }
                    info!("Stop requested using the stop file {}", target.display());
                    if let Err(e) = std::fs::remove_file(&target) {
                        warn!("Could not remove stop file: {}", e);
                    }
                    lifecycle.request_stop();
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", dir.display()))?;

        info!("Stop file watcher started for: {}", path.display());

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
