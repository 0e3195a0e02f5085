use j_installer::{
    association::AssociationRecord,
    config,
    installer::Degradation,
    paths::InstallLayout,
    run_with_store,
    search_path::PathUpdate,
    store::{read_document, EnvironmentStore, JsonStore, ValueKind, ENVIRONMENT_KEY, PATH_VALUE},
    InstallError, RunOptions,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

struct Fixture {
    _tmp: tempfile::TempDir,
    source: PathBuf,
    layout: InstallLayout,
    store_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("repo").join("installers");
        fs::create_dir_all(&source).unwrap();
        let layout = InstallLayout::resolve(&tmp.path().join("LocalAppData"));
        let store_path = tmp.path().join("hkcu.json");
        Self {
            _tmp: tmp,
            source,
            layout,
            store_path,
        }
    }

    fn put(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.source.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn with_release_build(self) -> Self {
        self.put(config::EXECUTABLE_CANDIDATES[0], "release build");
        self
    }

    fn with_assets(self) -> Self {
        self.put(config::ICON_CANDIDATES[0], "icon");
        let examples = config::EXAMPLES_CANDIDATES[0];
        self.put(&format!("{examples}/hello.j"), "out(\"hello\")");
        self.put(&format!("{examples}/std/lists.j"), "let xs = [1, 2]");
        self
    }

    fn store(&self) -> JsonStore {
        JsonStore::open(&self.store_path).unwrap()
    }

    fn opts(&self) -> RunOptions {
        RunOptions {
            source_dir: self.source.clone(),
            verify: false,
        }
    }
}

fn path_value(store: &JsonStore) -> String {
    store
        .read_string(ENVIRONMENT_KEY, PATH_VALUE)
        .unwrap()
        .unwrap_or_default()
}

fn occurrences(value: &str, dir: &Path) -> usize {
    let dir = dir.display().to_string();
    value.split(';').filter(|e| *e == dir).count()
}

#[test]
fn full_install_deploys_and_registers() {
    let fx = Fixture::new().with_release_build().with_assets();
    let mut store = fx.store();
    store
        .write_string(ENVIRONMENT_KEY, PATH_VALUE, r"C:\Windows;C:\Tools", ValueKind::ExpandString)
        .unwrap();

    let report = run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap();

    assert!(!report.is_degraded(), "{:?}", report.degraded);
    assert_eq!(
        fs::read_to_string(fx.layout.executable()).unwrap(),
        "release build"
    );
    assert!(fx.layout.examples.join("hello.j").exists());
    assert!(fx.layout.examples.join("std").join("lists.j").exists());

    let icon = fx.layout.icon.clone().unwrap();
    assert!(icon.exists());
    assert_eq!(report.association.icon, icon.display().to_string());

    assert_eq!(report.search_path, Some(PathUpdate::Added { broadcast: true }));
    assert_eq!(
        path_value(&store),
        format!(r"C:\Windows;C:\Tools;{}", fx.layout.bin.display())
    );

    let (key, value) = report.association.entry(AssociationRecord::OpenCommand);
    assert_eq!(key, r"Software\Classes\JSourceFile\shell\open\command");
    assert_eq!(
        value,
        format!("\"{}\" run \"%1\"", fx.layout.executable().display())
    );
}

#[test]
fn second_run_is_idempotent() {
    let fx = Fixture::new().with_release_build().with_assets();

    let mut store = fx.store();
    run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap();
    let after_first = read_document(&fx.store_path).unwrap();

    let mut store = fx.store();
    let report = run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap();
    let after_second = read_document(&fx.store_path).unwrap();

    assert_eq!(report.search_path, Some(PathUpdate::AlreadyPresent));
    assert_eq!(occurrences(&path_value(&store), &fx.layout.bin), 1);
    assert_eq!(after_first, after_second);
}

#[test]
fn missing_assets_still_succeed() {
    let fx = Fixture::new();
    fx.put(config::EXECUTABLE_CANDIDATES.last().unwrap(), "generic build");
    let mut store = fx.store();

    let report = run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap();

    assert!(report.degraded.contains(&Degradation::IconMissing));
    assert!(report.degraded.contains(&Degradation::ExamplesMissing));
    assert_eq!(report.deployment.icon, None);
    assert_eq!(report.deployment.examples, None);
    assert_eq!(
        report.association.icon,
        format!("{},0", fx.layout.executable().display())
    );
    let files: Vec<_> = fs::read_dir(&fx.layout.bin).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert_eq!(
        fs::read_to_string(fx.layout.executable()).unwrap(),
        "generic build"
    );
}

#[test]
fn missing_executable_aborts_before_any_change() {
    let fx = Fixture::new().with_assets();
    let mut store = fx.store();

    let err = run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap_err();

    assert!(matches!(err, InstallError::ExecutableMissing { .. }));
    assert_eq!(err.exit_code(), 4);
    assert!(!fx.layout.root.exists());
    assert!(!fx.store_path.exists());
}

#[test]
fn release_build_wins_over_generic_name() {
    let fx = Fixture::new().with_release_build();
    fx.put(config::EXECUTABLE_CANDIDATES.last().unwrap(), "stale");
    let mut store = fx.store();

    run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap();

    assert_eq!(
        fs::read_to_string(fx.layout.executable()).unwrap(),
        "release build"
    );
}

#[test]
fn rerun_after_rebuild_upgrades_in_place() {
    let fx = Fixture::new().with_release_build();
    let mut store = fx.store();
    run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap();

    fx.put(config::EXECUTABLE_CANDIDATES[0], "rebuilt");
    let mut store = fx.store();
    run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap();

    assert_eq!(fs::read_to_string(fx.layout.executable()).unwrap(), "rebuilt");
    assert_eq!(occurrences(&path_value(&store), &fx.layout.bin), 1);
}

#[test]
fn blocked_install_root_is_fatal_and_registers_nothing() {
    let fx = Fixture::new().with_release_build();
    fs::create_dir_all(fx.layout.root.parent().unwrap()).unwrap();
    fs::write(&fx.layout.root, "not a directory").unwrap();
    let mut store = fx.store();

    let err = run_with_store(&fx.layout, &fx.opts(), &mut store).unwrap_err();

    assert!(matches!(err, InstallError::CreateDir { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(fx.layout.root.is_file());
    assert!(!fx.store_path.exists());
    assert_eq!(path_value(&store), "");
}
