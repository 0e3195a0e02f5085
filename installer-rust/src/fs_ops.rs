use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use walkdir::WalkDir;

fn temp_path_for(dest: &Path) -> io::Result<PathBuf> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "dest has no parent"))?;
    let name = dest
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "dest has no filename"))?
        .to_string_lossy();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::from_millis(0))
        .as_nanos();
    Ok(parent.join(format!("{name}.tmp-{nonce}")))
}

fn replace_with(tmp: &Path, dest: &Path) -> io::Result<()> {
    if dest.exists() {
        fs::remove_file(dest)?;
    }
    fs::rename(tmp, dest)
}

/// Copies `src` over `dest`, replacing any existing file. The new content
/// lands under a temporary name first so a failed copy never leaves a
/// truncated `dest` behind.
pub fn copy_file_atomic(src: &Path, dest: &Path) -> io::Result<()> {
    let tmp = temp_path_for(dest)?;
    if let Err(err) = fs::copy(src, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    replace_with(&tmp, dest).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

pub fn write_bytes_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path_for(dest)?;
    fs::write(&tmp, bytes)?;
    replace_with(&tmp, dest)
}

/// Mirrors the tree under `src` into `dest`, overwriting same-named files.
/// Files present only in `dest` are left alone. Returns the number of files
/// copied.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
