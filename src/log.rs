pub use tracing::{debug, error, info, trace, warn};

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to open log file {path}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid log filter {0:?}")]
    Filter(String),
    #[error("Failed to install tracing-subscriber")]
    TracingSubscriber(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Installs the global subscriber. The terminal belongs to the UI, so events
/// go to `cfg.file` (appended) or are discarded when no file is configured.
/// `RUST_LOG` takes precedence over `cfg.level`.
pub fn setup(cfg: &LogConfig) -> Result<(), LogError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|_| LogError::Filter(directives.clone()))?,
        _ => EnvFilter::try_new(&cfg.level).map_err(|_| LogError::Filter(cfg.level.clone()))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    match &cfg.file {
        Some(path) => {
            let file = open_log_file(path)?;
            builder.with_writer(Mutex::new(file)).try_init()?;
        }
        None => {
            builder.with_writer(io::sink).try_init()?;
        }
    }

    info!(version = crate::VERSION, "logging started");
    Ok(())
}

fn open_log_file(path: &PathBuf) -> Result<fs::File, LogError> {
    let to_err = |source| LogError::File {
        path: path.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_file_is_created_with_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("pentyflix.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
