//! Loading the routing configuration and secret from disk, and reloading the
//! configuration when its file changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use routing::{ConfigError, Configuration, SharedConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Parses a routing configuration document. The result is not yet prepared.
pub fn parse_config(document: &[u8]) -> Result<Configuration, ConfigError> {
    serde_yaml::from_slice(document).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })
}

/// Reads, parses, and prepares the routing configuration at `path`.
pub fn load_config(path: &Path) -> anyhow::Result<Configuration> {
    let document = std::fs::read(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config = parse_config(&document)
        .and_then(Configuration::prepare)
        .with_context(|| format!("invalid config file {}", path.display()))?;

    if config.is_empty() {
        warn!(path = %path.display(), "configuration has no rules; every event will be dropped");
    }

    Ok(config)
}

/// Reads the shared hook secret, trimming surrounding whitespace.
pub fn read_secret(path: &Path) -> anyhow::Result<String> {
    let secret = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read secret file {}", path.display()))?;

    let secret = secret.trim();
    if secret.is_empty() {
        bail!("secret file {} is empty", path.display());
    }

    Ok(secret.to_string())
}

/// Re-reads `path` and installs it into `shared` if it is valid.
///
/// Returns `true` if a new snapshot was installed. A failed reload leaves the
/// previous snapshot live.
pub fn reload(path: &Path, shared: &SharedConfig) -> bool {
    let installed = std::fs::read(path)
        .map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
        .and_then(|document| parse_config(&document))
        .and_then(|config| shared.replace(config));

    match installed {
        Ok(()) => {
            info!(path = %path.display(), "configuration reloaded");
            true
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "configuration reload rejected; keeping previous");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Watching
// ---------------------------------------------------------------------------

/// Keeps the configuration file watch alive. Dropping it stops reloading.
pub struct ConfigWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watches the configuration file and reloads it into `shared` on change.
///
/// The parent directory is watched rather than the file itself so that
/// atomic replacements (rename over, symlink swap) are noticed.
pub fn watch_config(
    path: PathBuf,
    shared: SharedConfig,
    debounce: Duration,
) -> anyhow::Result<ConfigWatcher> {
    let (tx, mut rx) = mpsc::channel::<DebounceEventResult>(16);

    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        // Runs on the watcher thread; a closed channel means shutdown.
        let _ = tx.blocking_send(result);
    })
    .context("failed to create config file watcher")?;

    let watch_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    debouncer
        .watcher()
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_dir.display()))?;

    info!(path = %path.display(), "watching configuration for changes");

    let task = tokio::spawn(async move {
        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) => {
                    let touched = events
                        .iter()
                        .any(|event| event.path.file_name() == path.file_name());
                    if touched {
                        reload(&path, &shared);
                    } else {
                        debug!(count = events.len(), "ignoring unrelated file events");
                    }
                }
                Err(e) => error!(error = %e, "config file watcher error"),
            }
        }
    });

    Ok(ConfigWatcher {
        _debouncer: debouncer,
        task,
    })
}
