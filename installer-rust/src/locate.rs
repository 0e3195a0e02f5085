use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{config, error::InstallError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    File,
    Dir,
}

impl Probe {
    fn matches(self, path: &Path) -> bool {
        match self {
            Probe::File => path.is_file(),
            Probe::Dir => path.is_dir(),
        }
    }
}

/// Source paths found for this run. Only the executable is mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub executable: PathBuf,
    pub icon: Option<PathBuf>,
    pub examples: Option<PathBuf>,
}

/// Returns the first candidate that exists, in list order. Relative
/// candidates are resolved against `base`; absolute ones are used as-is.
pub fn first_existing<S: AsRef<str>>(base: &Path, candidates: &[S], probe: Probe) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|c| base.join(c.as_ref()))
        .inspect(|path| debug!(path = %path.display(), "probing"))
        .find(|path| probe.matches(path))
}

pub fn locate(base: &Path) -> Result<ArtifactSet, InstallError> {
    locate_with(
        base,
        config::EXECUTABLE_CANDIDATES,
        config::ICON_CANDIDATES,
        config::EXAMPLES_CANDIDATES,
    )
}

pub fn locate_with(
    base: &Path,
    executable: &[&str],
    icon: &[&str],
    examples: &[&str],
) -> Result<ArtifactSet, InstallError> {
    let Some(executable_path) = first_existing(base, executable, Probe::File) else {
        return Err(InstallError::ExecutableMissing {
            name: config::EXECUTABLE.to_string(),
            searched: executable.iter().map(|c| base.join(c)).collect(),
        });
    };
    Ok(ArtifactSet {
        executable: executable_path,
        icon: first_existing(base, icon, Probe::File),
        examples: first_existing(base, examples, Probe::Dir),
    })
}
