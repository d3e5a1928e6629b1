//! Inicialização do tracing: stdout + arquivo de leituras opcional.

use monitor_core::config::LoggingConfig;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Falha ao abrir arquivo de log {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Subscriber já inicializado: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Instala o subscriber global. `RUST_LOG` tem precedência sobre `cfg.level`.
pub fn init_logging(cfg: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let file_layer = if cfg.file.trim().is_empty() {
        None
    } else {
        let path = PathBuf::from(cfg.file.trim());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LoggingError::Io { path, source })?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()?;
    Ok(())
}
