//! Common filesystem helpers

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{FetchError, Result};

/// Make sure `dir` exists as a directory, returning whether it was already there.
///
/// A missing directory is created with its parents and counts as success;
/// anything else at `dir` is a conflict. Stat failures other than "not found"
/// are reported as storage errors.
pub fn ensure_dir(dir: &Path) -> Result<bool> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(true),
        Ok(_) => Err(FetchError::Conflict {
            path: dir.to_path_buf(),
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            create_dir_all(dir)?;
            Ok(false)
        }
        Err(err) => Err(FetchError::storage("stat", dir, err)),
    }
}

/// Create `dir` and any missing parents with mode 0o777 (before umask)
fn create_dir_all(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    builder
        .create(dir)
        .map_err(|err| FetchError::storage("mkdir", dir, err))
}
