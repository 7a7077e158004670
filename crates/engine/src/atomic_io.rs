use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes `text` beside `path` first and renames it into place, so readers
/// never observe a half-written store file.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging_path = staging_path_for(path);
    fs::write(&staging_path, text.as_bytes())?;
    if let Err(error) = swap_into_place(&staging_path, path) {
        let _ = fs::remove_file(&staging_path);
        return Err(error);
    }
    Ok(())
}

fn swap_into_place(staging_path: &Path, final_path: &Path) -> io::Result<()> {
    match fs::remove_file(final_path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }
    fs::rename(staging_path, final_path)
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store.json");
    path.with_file_name(format!("{file_name}.tmp"))
}
