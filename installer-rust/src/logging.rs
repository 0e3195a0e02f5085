use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "J_INSTALL_LOG";

/// Per-run log file in the temp directory; the install root is not touched
/// until deployment starts.
pub fn create_log_path() -> PathBuf {
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("j-install-{nonce}.log"))
}

pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn open_log(path: &Path) -> Result<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

/// Console output plus a plain-text copy in `log_path`. When the file
/// cannot be opened only the console layer is installed and `None` is
/// returned; the run goes on either way.
pub fn init(log_path: &Path, verbose: u8) -> Result<Option<PathBuf>> {
    let (file, open_err) = match open_log(log_path) {
        Ok(file) => (Some(file), None),
        Err(err) => (None, Some(err)),
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbose).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .compact(),
        )
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;

    match open_err {
        None => Ok(Some(log_path.to_path_buf())),
        Some(err) => {
            warn!("log file unavailable, logging to console only: {err:#}");
            Ok(None)
        }
    }
}
