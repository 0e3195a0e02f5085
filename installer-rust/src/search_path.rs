use tracing::{debug, info, warn};

use crate::{
    error::RegistrarError,
    store::{EnvironmentStore, ValueKind, ENVIRONMENT_KEY, PATH_VALUE},
};

pub const SEPARATOR: char = ';';

/// Longest value the environment block accepts, in UTF-16 code units.
pub const MAX_SEARCH_PATH_LEN: usize = 32_767;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEdit {
    Unchanged,
    Appended(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathUpdate {
    AlreadyPresent,
    /// Written, but running processes may not have been told.
    Added { broadcast: bool },
}

fn normalize(entry: &str) -> &str {
    entry.trim().trim_end_matches(['\\', '/'])
}

pub fn contains_entry(value: &str, dir: &str) -> bool {
    let dir = normalize(dir);
    value
        .split(SEPARATOR)
        .map(normalize)
        .any(|entry| !entry.is_empty() && entry.eq_ignore_ascii_case(dir))
}

/// Computes the new search-path value. Existing entries keep their order;
/// `dir` goes last and a separator is added only when needed.
pub fn append_entry(current: &str, dir: &str) -> Result<PathEdit, RegistrarError> {
    if contains_entry(current, dir) {
        return Ok(PathEdit::Unchanged);
    }
    let mut updated = String::with_capacity(current.len() + dir.len() + 1);
    updated.push_str(current);
    if !current.is_empty() && !current.ends_with(SEPARATOR) {
        updated.push(SEPARATOR);
    }
    updated.push_str(dir);

    let len = updated.encode_utf16().count();
    if len > MAX_SEARCH_PATH_LEN {
        return Err(RegistrarError::SearchPathTooLong {
            len,
            limit: MAX_SEARCH_PATH_LEN,
        });
    }
    Ok(PathEdit::Appended(updated))
}

/// Adds `dir` to the per-user search path unless it is already there.
pub fn ensure_on_search_path(
    store: &mut dyn EnvironmentStore,
    dir: &str,
) -> Result<PathUpdate, RegistrarError> {
    let current = store.read_string(ENVIRONMENT_KEY, PATH_VALUE)?.unwrap_or_default();
    let updated = match append_entry(&current, dir)? {
        PathEdit::Unchanged => {
            debug!(dir, "already on search path");
            return Ok(PathUpdate::AlreadyPresent);
        }
        PathEdit::Appended(updated) => updated,
    };
    store.write_string(ENVIRONMENT_KEY, PATH_VALUE, &updated, ValueKind::ExpandString)?;
    info!(dir, "added to search path");

    let broadcast = match store.broadcast_environment_change() {
        Ok(()) => true,
        Err(err) => {
            warn!("environment change broadcast failed: {err}");
            false
        }
    };
    Ok(PathUpdate::Added { broadcast })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::StoreError, store::JsonStore};

    #[test]
    fn appends_after_existing_entries() {
        assert_eq!(
            append_entry("A;B", "C").unwrap(),
            PathEdit::Appended("A;B;C".to_string())
        );
    }

    #[test]
    fn empty_value_gets_no_leading_separator() {
        assert_eq!(append_entry("", "C").unwrap(), PathEdit::Appended("C".to_string()));
    }

    #[test]
    fn trailing_separator_is_not_doubled() {
        assert_eq!(
            append_entry("A;B;", "C").unwrap(),
            PathEdit::Appended("A;B;C".to_string())
        );
    }

    #[test]
    fn present_anywhere_is_unchanged() {
        for value in [
            r"C:\J\bin",
            r"C:\J\bin;A",
            r"A;C:\J\bin;B",
            r"A;B;C:\J\bin",
            r"A;c:\j\BIN\;B",
        ] {
            assert_eq!(append_entry(value, r"C:\J\bin").unwrap(), PathEdit::Unchanged, "{value}");
        }
    }

    #[test]
    fn prefix_of_other_entry_is_not_a_match() {
        assert_eq!(
            append_entry(r"C:\J\bin2", r"C:\J\bin").unwrap(),
            PathEdit::Appended(r"C:\J\bin2;C:\J\bin".to_string())
        );
    }

    #[test]
    fn oversized_value_is_rejected() {
        let current = "x".repeat(MAX_SEARCH_PATH_LEN - 2);
        let err = append_entry(&current, "abc").unwrap_err();
        match err {
            RegistrarError::SearchPathTooLong { len, limit } => {
                assert_eq!(len, MAX_SEARCH_PATH_LEN + 2);
                assert_eq!(limit, MAX_SEARCH_PATH_LEN);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn store_update_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(&tmp.path().join("env.json")).unwrap();
        store
            .write_string(ENVIRONMENT_KEY, PATH_VALUE, "A;B", ValueKind::ExpandString)
            .unwrap();

        let first = ensure_on_search_path(&mut store, "C").unwrap();
        let second = ensure_on_search_path(&mut store, "C").unwrap();

        assert_eq!(first, PathUpdate::Added { broadcast: true });
        assert_eq!(second, PathUpdate::AlreadyPresent);
        assert_eq!(
            store.read_string(ENVIRONMENT_KEY, PATH_VALUE).unwrap().as_deref(),
            Some("A;B;C")
        );
    }

    #[test]
    fn too_long_leaves_store_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(&tmp.path().join("env.json")).unwrap();
        let current = "y".repeat(MAX_SEARCH_PATH_LEN);
        store
            .write_string(ENVIRONMENT_KEY, PATH_VALUE, &current, ValueKind::ExpandString)
            .unwrap();

        assert!(ensure_on_search_path(&mut store, "C").is_err());
        assert_eq!(
            store.read_string(ENVIRONMENT_KEY, PATH_VALUE).unwrap(),
            Some(current)
        );
    }

    /// Reads of the search path fail; counts every write.
    #[derive(Default)]
    struct WrongTypeStore {
        writes: usize,
    }

    impl EnvironmentStore for WrongTypeStore {
        fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::NotAString {
                key: key.to_string(),
                name: name.to_string(),
            })
        }

        fn write_string(&mut self, _: &str, _: &str, _: &str, _: ValueKind) -> Result<(), StoreError> {
            self.writes += 1;
            Ok(())
        }

        fn broadcast_environment_change(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn unreadable_value_is_never_overwritten() {
        let mut store = WrongTypeStore::default();

        let err = ensure_on_search_path(&mut store, "C").unwrap_err();

        assert!(matches!(err, RegistrarError::Store(StoreError::NotAString { .. })));
        assert_eq!(store.writes, 0);
    }
}
