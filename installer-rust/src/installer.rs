use std::path::PathBuf;

use tracing::{info, info_span, warn};

use crate::{
    association::{self, AssociationRecord, FileAssociation},
    deploy::{self, Deployment},
    error::{InstallError, Phase},
    locate,
    paths::{self, InstallLayout},
    search_path::{self, PathUpdate},
    store::EnvironmentStore,
    verify::{self, Verification},
};

/// Name of the JSON stand-in for the user registry on non-Windows hosts.
pub const PORTABLE_STORE_FILE: &str = "user-environment.json";

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory the candidate artifact paths are relative to.
    pub source_dir: PathBuf,
    pub verify: bool,
}

/// Optional steps that did not go through. Any of these still leaves a
/// working installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    IconMissing,
    IconCopyFailed(String),
    ExamplesMissing,
    ExamplesCopyFailed(String),
    SearchPathFailed(String),
    BroadcastFailed,
    AssociationRecordFailed {
        record: AssociationRecord,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub layout: InstallLayout,
    pub deployment: Deployment,
    pub search_path: Option<PathUpdate>,
    pub association: FileAssociation,
    pub verification: Option<Verification>,
    pub degraded: Vec<Degradation>,
}

impl InstallReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Installs into the platform's per-user location and registers with the
/// platform's user store.
pub fn run(opts: &RunOptions) -> Result<InstallReport, InstallError> {
    let layout = {
        let _span = info_span!("phase", phase = %Phase::Resolving).entered();
        paths::default_layout()?
    };
    let mut store = open_platform_store(&layout);
    run_with_store(&layout, opts, store.as_mut())
}

#[cfg(windows)]
fn open_platform_store(_layout: &InstallLayout) -> Box<dyn EnvironmentStore> {
    Box::new(crate::registry::RegistryStore::new())
}

#[cfg(not(windows))]
fn open_platform_store(layout: &InstallLayout) -> Box<dyn EnvironmentStore> {
    Box::new(LazyJsonStore::new(layout.root.join(PORTABLE_STORE_FILE)))
}

/// Opens the JSON store on first use so nothing is touched on disk before
/// the registering phase.
#[cfg(not(windows))]
struct LazyJsonStore {
    path: PathBuf,
    inner: Option<crate::store::JsonStore>,
}

#[cfg(not(windows))]
impl LazyJsonStore {
    fn new(path: PathBuf) -> Self {
        Self { path, inner: None }
    }

    fn get(&mut self) -> Result<&mut crate::store::JsonStore, crate::error::StoreError> {
        let store = match self.inner.take() {
            Some(store) => store,
            None => crate::store::JsonStore::open(&self.path)?,
        };
        Ok(self.inner.insert(store))
    }
}

#[cfg(not(windows))]
impl EnvironmentStore for LazyJsonStore {
    fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, crate::error::StoreError> {
        match &self.inner {
            Some(store) => store.read_string(key, name),
            None => crate::store::JsonStore::open(&self.path)?.read_string(key, name),
        }
    }

    fn write_string(
        &mut self,
        key: &str,
        name: &str,
        value: &str,
        kind: crate::store::ValueKind,
    ) -> Result<(), crate::error::StoreError> {
        self.get()?.write_string(key, name, value, kind)
    }

    fn broadcast_environment_change(&self) -> Result<(), crate::error::StoreError> {
        Ok(())
    }
}

/// Runs locate → deploy → register (→ verify) against an explicit layout and
/// store.
pub fn run_with_store(
    layout: &InstallLayout,
    opts: &RunOptions,
    store: &mut dyn EnvironmentStore,
) -> Result<InstallReport, InstallError> {
    info!(root = %layout.root.display(), "installing {}", crate::config::DISPLAY_NAME);

    let artifacts = {
        let _span = info_span!("phase", phase = %Phase::Locating).entered();
        locate::locate(&opts.source_dir)?
    };
    info!(executable = %artifacts.executable.display(), "found executable");

    let mut degraded = Vec::new();
    let deployment = {
        let _span = info_span!("phase", phase = %Phase::Deploying).entered();
        deploy::deploy(layout, &artifacts, &mut degraded)?
    };

    let (search_path, association) = {
        let _span = info_span!("phase", phase = %Phase::Registering).entered();
        register(layout, &deployment, store, &mut degraded)
    };

    let verification = if opts.verify {
        let _span = info_span!("phase", phase = %Phase::Verifying).entered();
        let outcome = verify::probe_version(&deployment.executable);
        verify::log_outcome(&outcome);
        Some(outcome)
    } else {
        None
    };

    for d in &degraded {
        warn!("degraded: {}", describe(d));
    }
    info!(phase = %Phase::Complete, "installation complete");

    Ok(InstallReport {
        layout: layout.clone(),
        deployment,
        search_path,
        association,
        verification,
        degraded,
    })
}

fn register(
    layout: &InstallLayout,
    deployment: &Deployment,
    store: &mut dyn EnvironmentStore,
    degraded: &mut Vec<Degradation>,
) -> (Option<PathUpdate>, FileAssociation) {
    let bin = layout.bin.display().to_string();
    let search_path = match search_path::ensure_on_search_path(store, &bin) {
        Ok(update) => {
            if matches!(update, PathUpdate::Added { broadcast: false }) {
                degraded.push(Degradation::BroadcastFailed);
            }
            Some(update)
        }
        Err(err) => {
            warn!("failed to update search path: {err}");
            degraded.push(Degradation::SearchPathFailed(err.to_string()));
            None
        }
    };

    let assoc = FileAssociation::new(&deployment.executable, deployment.icon_reference());
    for (record, err) in association::register(store, &assoc) {
        degraded.push(Degradation::AssociationRecordFailed {
            record,
            reason: err.to_string(),
        });
    }
    (search_path, assoc)
}

pub fn describe(d: &Degradation) -> String {
    match d {
        Degradation::IconMissing => "no icon found; using the executable's icon".to_string(),
        Degradation::IconCopyFailed(e) => format!("icon not copied ({e}); using the executable's icon"),
        Degradation::ExamplesMissing => "no examples found".to_string(),
        Degradation::ExamplesCopyFailed(e) => format!("examples not copied ({e})"),
        Degradation::SearchPathFailed(e) => format!("search path not updated ({e})"),
        Degradation::BroadcastFailed => {
            "running programs were not notified; new terminals will see the updated search path"
                .to_string()
        }
        Degradation::AssociationRecordFailed { record, reason } => {
            format!("file association {record} not written ({reason})")
        }
    }
}
