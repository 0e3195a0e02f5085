use std::{fmt, path::Path};

use tracing::{info, warn};

use crate::{
    config,
    error::StoreError,
    store::{EnvironmentStore, ValueKind, CLASSES_KEY, DEFAULT_VALUE},
};

/// The four linked entries that make up one file association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRecord {
    Extension,
    Description,
    Icon,
    OpenCommand,
}

impl AssociationRecord {
    pub const ALL: [AssociationRecord; 4] = [
        AssociationRecord::Extension,
        AssociationRecord::Description,
        AssociationRecord::Icon,
        AssociationRecord::OpenCommand,
    ];
}

impl fmt::Display for AssociationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssociationRecord::Extension => "extension",
            AssociationRecord::Description => "description",
            AssociationRecord::Icon => "icon",
            AssociationRecord::OpenCommand => "open command",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAssociation {
    pub extension: String,
    pub type_tag: String,
    pub description: String,
    pub icon: String,
    pub command: String,
}

impl FileAssociation {
    pub fn new(executable: &Path, icon: String) -> Self {
        Self {
            extension: config::EXTENSION.to_string(),
            type_tag: config::TYPE_TAG.to_string(),
            description: config::TYPE_DESCRIPTION.to_string(),
            icon,
            command: open_command(executable, config::OPEN_SUBCOMMAND),
        }
    }

    /// Store key and value for one record.
    pub fn entry(&self, record: AssociationRecord) -> (String, &str) {
        let class = format!(r"{CLASSES_KEY}\{}", self.type_tag);
        match record {
            AssociationRecord::Extension => {
                (format!(r"{CLASSES_KEY}\{}", self.extension), self.type_tag.as_str())
            }
            AssociationRecord::Description => (class, self.description.as_str()),
            AssociationRecord::Icon => (format!(r"{class}\DefaultIcon"), self.icon.as_str()),
            AssociationRecord::OpenCommand => {
                (format!(r"{class}\shell\open\command"), self.command.as_str())
            }
        }
    }
}

/// `"<exe>" <subcommand> "%1"`; the shell substitutes the activated file.
pub fn open_command(executable: &Path, subcommand: &str) -> String {
    format!("\"{}\" {subcommand} \"%1\"", executable.display())
}

/// Writes every record, continuing past failures. Returns the records that
/// could not be written.
pub fn register(
    store: &mut dyn EnvironmentStore,
    assoc: &FileAssociation,
) -> Vec<(AssociationRecord, StoreError)> {
    let mut failures = Vec::new();
    for record in AssociationRecord::ALL {
        let (key, value) = assoc.entry(record);
        match store.write_string(&key, DEFAULT_VALUE, value, ValueKind::String) {
            Ok(()) => {}
            Err(err) => {
                warn!(%record, key = %key, "association write failed: {err}");
                failures.push((record, err));
            }
        }
    }
    if failures.is_empty() {
        info!(extension = %assoc.extension, "registered file association");
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStore;
    use std::path::PathBuf;

    fn sample() -> FileAssociation {
        FileAssociation {
            extension: ".j".to_string(),
            type_tag: "JSourceFile".to_string(),
            description: "J Source File".to_string(),
            icon: r"C:\J\bin\j.exe,0".to_string(),
            command: open_command(Path::new(r"C:\J\bin\j.exe"), "run"),
        }
    }

    #[test]
    fn open_command_quotes_exe_and_argument() {
        let cmd = open_command(&PathBuf::from(r"C:\Users\me\J\bin\j.exe"), "run");
        assert_eq!(cmd, r#""C:\Users\me\J\bin\j.exe" run "%1""#);
    }

    #[test]
    fn entries_chain_through_type_tag() {
        let assoc = sample();
        assert_eq!(
            assoc.entry(AssociationRecord::Extension),
            (r"Software\Classes\.j".to_string(), "JSourceFile")
        );
        assert_eq!(
            assoc.entry(AssociationRecord::Description).0,
            r"Software\Classes\JSourceFile"
        );
        assert_eq!(
            assoc.entry(AssociationRecord::Icon).0,
            r"Software\Classes\JSourceFile\DefaultIcon"
        );
        assert_eq!(
            assoc.entry(AssociationRecord::OpenCommand).0,
            r"Software\Classes\JSourceFile\shell\open\command"
        );
    }

    #[test]
    fn new_uses_configured_policy() {
        let assoc = FileAssociation::new(Path::new("j.exe"), "j.exe,0".to_string());
        assert_eq!(assoc.extension, config::EXTENSION);
        assert_eq!(assoc.type_tag, config::TYPE_TAG);
        assert!(assoc.command.contains(config::OPEN_SUBCOMMAND));
    }

    #[test]
    fn register_overwrites_previous_values() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(&tmp.path().join("env.json")).unwrap();
        store
            .write_string(
                r"Software\Classes\JSourceFile\DefaultIcon",
                DEFAULT_VALUE,
                "old.ico",
                ValueKind::String,
            )
            .unwrap();

        let assoc = sample();
        assert!(register(&mut store, &assoc).is_empty());

        for record in AssociationRecord::ALL {
            let (key, value) = assoc.entry(record);
            assert_eq!(
                store.read_string(&key, DEFAULT_VALUE).unwrap().as_deref(),
                Some(value)
            );
        }
    }
}
