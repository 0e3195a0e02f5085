use std::path::{Path, PathBuf};

use crate::{config, error::InstallError};

/// Overrides the platform per-user data directory.
pub const DATA_ROOT_ENV: &str = "J_INSTALL_DATA_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub root: PathBuf,
    pub bin: PathBuf,
    pub examples: PathBuf,
    pub icon: Option<PathBuf>,
}

impl InstallLayout {
    pub fn resolve(data_root: &Path) -> Self {
        let root = data_root.join(config::PRODUCT_NAME);
        let icon = (!config::ICON.trim().is_empty()).then(|| root.join(config::ICON));
        Self {
            bin: root.join("bin"),
            examples: root.join("examples"),
            icon,
            root,
        }
    }

    pub fn executable(&self) -> PathBuf {
        self.bin.join(config::EXECUTABLE)
    }
}

pub fn data_root() -> Result<PathBuf, InstallError> {
    if let Ok(dev_root) = std::env::var(DATA_ROOT_ENV) {
        if !dev_root.trim().is_empty() {
            return Ok(PathBuf::from(dev_root));
        }
    }
    dirs::data_local_dir().ok_or(InstallError::DataRootUnavailable)
}

pub fn default_layout() -> Result<InstallLayout, InstallError> {
    Ok(InstallLayout::resolve(&data_root()?))
}
