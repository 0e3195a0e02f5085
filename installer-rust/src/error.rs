use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Locating,
    Deploying,
    Registering,
    Verifying,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolving => "resolving install location",
            Phase::Locating => "locating artifacts",
            Phase::Deploying => "deploying files",
            Phase::Registering => "registering environment",
            Phase::Verifying => "verifying install",
            Phase::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Conditions that abort a run.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("could not determine the per-user data directory")]
    DataRootUnavailable,

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not find {name} to install (searched: {}). Build it first", display_paths(searched))]
    ExecutableMissing { name: String, searched: Vec<PathBuf> },

    #[error("failed to copy {} -> {}: {source}", from.display(), to.display())]
    ExecutableCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    pub fn phase(&self) -> Phase {
        match self {
            InstallError::DataRootUnavailable => Phase::Resolving,
            InstallError::ExecutableMissing { .. } => Phase::Locating,
            InstallError::CreateDir { .. } | InstallError::ExecutableCopy { .. } => {
                Phase::Deploying
            }
        }
    }

    /// Process exit status for this failure. Each cause is distinct.
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallError::DataRootUnavailable => 2,
            InstallError::CreateDir { .. } => 3,
            InstallError::ExecutableMissing { .. } => 4,
            InstallError::ExecutableCopy { .. } => 5,
        }
    }
}

/// Failures of the per-user environment store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed store document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{op} failed on {key}: os error {code}")]
    Os {
        op: &'static str,
        key: String,
        code: u32,
    },

    #[error("value {key}\\{name} is not a string")]
    NotAString { key: String, name: String },
}

/// Failures of a single registrar operation. Never fatal to a run.
#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("search path would be {len} characters, limit is {limit}")]
    SearchPathTooLong { len: usize, limit: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
