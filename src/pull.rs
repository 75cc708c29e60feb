use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cache;
use crate::error::{FetchError, Result};
use crate::manifest::{self, Manifest};
use crate::transfer::{ImageTransfer, TransferOptions};

/// Manifest file name inside a cache entry
pub const MANIFEST_FILE: &str = "manifest.json";

/// Options for [`fetch`]
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Cache base directory, already defaulted by the caller
    pub base_dir: PathBuf,
    /// Ignore an existing cache entry and pull again
    pub force: bool,
    pub transfer: TransferOptions,
}

/// A cache entry holding a validated manifest and its layer blobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulledImage {
    pub path: PathBuf,
    pub manifest: Manifest,
}

/// Fetch `image` into the cache, reusing a previous pull unless `force` is set.
///
/// A cached `manifest.json` is validated like a fresh one and never falls back
/// to the network when it is invalid. A missing or unreadable one counts as a miss.
pub fn fetch(
    image: &str,
    options: &FetchOptions,
    transfer: &dyn ImageTransfer,
) -> Result<PulledImage> {
    let cache_dir = cache::resolve(image, &options.base_dir)?;

    if cache_dir.existed && !options.force {
        let manifest_path = cache_dir.path.join(MANIFEST_FILE);
        if let Some(raw) = read_cached_manifest(&manifest_path) {
            let manifest =
                manifest::validate(&raw).map_err(|err| FetchError::CachedManifest {
                    path: manifest_path.clone(),
                    source: Box::new(err),
                })?;
            info!(image, path = %cache_dir.path.display(), "using cached image");
            return Ok(PulledImage {
                path: cache_dir.path,
                manifest,
            });
        }
    }

    let raw = transfer.transfer(image, &cache_dir.path, &options.transfer)?;
    let manifest = manifest::validate(&raw)?;
    info!(image, layers = manifest.layers.len(), "pulled image");

    Ok(PulledImage {
        path: cache_dir.path,
        manifest,
    })
}

fn read_cached_manifest(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Some(data),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no usable cached manifest");
            None
        }
    }
}
