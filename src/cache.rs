//! On-disk image cache: `<base_dir>/<hex(image name)>/`

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::utils;

/// Directory name used under the system temp dir when no base dir is configured
const DEFAULT_CACHE_DIR_NAME: &str = "ctr-fetch";

/// A resolved cache directory for one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
    pub path: PathBuf,
    /// true if the directory was already present before this call
    pub existed: bool,
}

/// Default cache base directory: `<temp>/ctr-fetch`
pub fn default_base_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME)
}

/// Lossless, filesystem-safe encoding of an image name
pub fn cache_key(image_name: &str) -> String {
    hex::encode(image_name.as_bytes())
}

/// Map an image name to its cache directory, creating it if absent
pub fn resolve(image_name: &str, base_dir: &Path) -> Result<CacheDir> {
    let path = base_dir.join(cache_key(image_name));
    let existed = utils::ensure_dir(&path)?;
    debug!(image = image_name, path = %path.display(), existed, "resolved cache dir");
    Ok(CacheDir { path, existed })
}
