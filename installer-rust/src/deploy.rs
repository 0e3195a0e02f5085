use std::{fs, path::{Path, PathBuf}};

use tracing::{info, warn};

use crate::{
    error::InstallError,
    fs_ops,
    installer::Degradation,
    locate::ArtifactSet,
    paths::InstallLayout,
};

/// Destination paths that actually hold deployed content after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub executable: PathBuf,
    pub icon: Option<PathBuf>,
    pub examples: Option<PathBuf>,
}

impl Deployment {
    /// Icon reference for the association records: the copied icon file if
    /// present, otherwise the first icon embedded in the executable.
    pub fn icon_reference(&self) -> String {
        match &self.icon {
            Some(icon) => icon.display().to_string(),
            None => format!("{},0", self.executable.display()),
        }
    }
}

fn create_dir(path: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(path).map_err(|source| InstallError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

pub fn deploy(
    layout: &InstallLayout,
    artifacts: &ArtifactSet,
    degraded: &mut Vec<Degradation>,
) -> Result<Deployment, InstallError> {
    create_dir(&layout.bin)?;
    create_dir(&layout.examples)?;

    let executable = layout.executable();
    fs_ops::copy_file_atomic(&artifacts.executable, &executable).map_err(|source| {
        InstallError::ExecutableCopy {
            from: artifacts.executable.clone(),
            to: executable.clone(),
            source,
        }
    })?;
    info!(path = %executable.display(), "copied executable");

    let examples = match &artifacts.examples {
        None => {
            degraded.push(Degradation::ExamplesMissing);
            None
        }
        Some(src) => match fs_ops::copy_tree(src, &layout.examples) {
            Ok(count) => {
                info!(count, "copied examples");
                Some(layout.examples.clone())
            }
            Err(err) => {
                warn!("failed to copy examples: {err}");
                degraded.push(Degradation::ExamplesCopyFailed(err.to_string()));
                None
            }
        },
    };

    let icon = match (&artifacts.icon, &layout.icon) {
        (Some(src), Some(dest)) => match fs_ops::copy_file_atomic(src, dest) {
            Ok(()) => {
                info!(path = %dest.display(), "copied icon");
                Some(dest.clone())
            }
            Err(err) => {
                warn!("failed to copy icon: {err}");
                degraded.push(Degradation::IconCopyFailed(err.to_string()));
                None
            }
        },
        _ => {
            degraded.push(Degradation::IconMissing);
            None
        }
    };

    Ok(Deployment {
        executable,
        icon,
        examples,
    })
}
