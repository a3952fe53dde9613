use std::fs;
use std::io::Write;

use camino::Utf8Path;

use crate::error::CiteIdError;

/// Writes `content` next to `path` first and moves it into place.
pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CiteIdError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CiteIdError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = tempfile::Builder::new()
        .prefix("citeid-snapshot")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| CiteIdError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| CiteIdError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| CiteIdError::Filesystem(format!("write {path}: {err}")))?;
    Ok(())
}

pub fn read_optional(path: &Utf8Path) -> Result<Option<Vec<u8>>, CiteIdError> {
    match fs::read(path.as_std_path()) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(CiteIdError::Filesystem(format!("read {path}: {err}"))),
    }
}
