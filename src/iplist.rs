use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

const LIST_FILE_SUFFIX: &str = "_servers.txt";

/// File name of a filter's IP list: the name lower-cased with every
/// non-alphanumeric character replaced by `_`, suffixed `_servers.txt`.
/// A blank name is a user-input error, not a fallback.
pub fn list_file_name(filter_name: &str) -> AppResult<String> {
    if filter_name.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "a filter name is required before any IP list operation".into(),
        ));
    }
    let mangled: String = filter_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    Ok(format!("{}{}", mangled, LIST_FILE_SUFFIX))
}

/// Deterministic path of a filter's IP list file
pub fn list_file_path(data_dir: &Path, filter_name: &str) -> AppResult<PathBuf> {
    Ok(data_dir.join(list_file_name(filter_name)?))
}

/// Write a filter's IP list (empty `contents` creates an empty list).
///
/// The data goes through a temporary file in the target directory that is
/// renamed into place on success and removed on any failure path, so a
/// half-written list never lands under the list path.
pub fn write_list(data_dir: &Path, filter_name: &str, contents: &str) -> AppResult<PathBuf> {
    let path = list_file_path(data_dir, filter_name)?;
    std::fs::create_dir_all(data_dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(data_dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(&path)
        .map_err(|e| AppError::StoreError(format!("failed to write {}: {}", path.display(), e)))?;
    Ok(path)
}
