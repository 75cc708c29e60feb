use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};

use crate::error::{FetchError, Result};
use crate::manifest::Manifest;
use crate::progress::Progress;
use crate::utils;

/// Extract every layer of `manifest` from the cache entry at `cache_path` into
/// `dest`, in manifest order, so later layers overwrite earlier ones.
///
/// Returns the total number of regular-file bytes written. Stops at the first
/// failing layer and leaves whatever was already written in place.
pub fn extract_all(
    cache_path: &Path,
    manifest: &Manifest,
    dest: &Path,
    progress: &mut dyn Progress,
) -> Result<u64> {
    let total = manifest.layers.len();
    let mut size = 0;
    progress.start(total);

    for (i, layer) in manifest.layers.iter().enumerate() {
        let id = layer.blob_name();
        progress.layer(i + 1, total, id);

        let blob_path = cache_path.join(id);
        let written = extract_one(&blob_path, dest).map_err(|err| FetchError::Layer {
            digest: id.to_string(),
            source: Box::new(err),
        })?;
        info!(layer = i, digest = %layer.digest, bytes = written, "extracted layer");
        size += written;
    }

    progress.finish();
    Ok(size)
}

/// Stream one gzip-compressed tar blob into `dest`.
///
/// Only regular files are written; directories, links and special files are
/// skipped. Returns the number of content bytes written.
pub fn extract_one(blob_path: &Path, dest: &Path) -> Result<u64> {
    let file = File::open(blob_path).map_err(|err| FetchError::storage("open blob", blob_path, err))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    let entries = archive
        .entries()
        .map_err(|err| FetchError::archive("read layer", blob_path, err))?;

    let mut size = 0;
    for entry in entries {
        let mut entry = entry.map_err(|err| FetchError::archive("read layer", blob_path, err))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry
            .path()
            .map_err(|err| FetchError::archive("read entry path", blob_path, err))?
            .into_owned();
        let target = match safe_join(dest, &name)? {
            Some(target) => target,
            None => continue,
        };
        let mode = entry
            .header()
            .mode()
            .map_err(|err| FetchError::archive("read entry mode", blob_path, err))?;

        if let Some(parent) = target.parent() {
            utils::ensure_dir(parent)?;
        }

        let mut out = create_file(&target, mode)?;
        let copied = copy_entry(&mut entry, &mut out, blob_path, &target)?;
        set_mode(&out, &target, mode)?;
        drop(out);

        debug!(path = %target.display(), bytes = copied, "wrote file");
        size += copied;
    }

    Ok(size)
}

/// Resolve an archive entry name under `dest`.
///
/// Leading `/` and `.` components are dropped and `..` pops the previous
/// component. A name that climbs above `dest` is an error; a name that
/// resolves to `dest` itself yields `None`.
fn safe_join(dest: &Path, name: &Path) -> Result<Option<PathBuf>> {
    let mut parts = Vec::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(FetchError::archive(
                        "unsafe entry",
                        name,
                        format!("escapes destination {}", dest.display()),
                    ));
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(dest.join(parts.iter().collect::<PathBuf>())))
}

/// Copy one entry's content, blaming read failures on the blob and write
/// failures on the destination file
fn copy_entry<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    blob_path: &Path,
    target: &Path,
) -> Result<u64> {
    let mut buf = [0u8; 64 * 1024];
    let mut copied = 0;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FetchError::archive("read entry", blob_path, err)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|err| FetchError::storage("write file", target, err))?;
        copied += n as u64;
    }
    writer
        .flush()
        .map_err(|err| FetchError::storage("write file", target, err))?;
    Ok(copied)
}

/// Create `path` fresh with the entry's permission bits.
///
/// Whatever an earlier layer left at `path` is removed first, so its mode
/// neither survives nor blocks the open.
fn create_file(path: &Path, mode: u32) -> Result<File> {
    match fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => {
            fs::remove_file(path).map_err(|err| FetchError::storage("remove file", path, err))?;
        }
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(FetchError::storage("stat", path, err)),
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode & 0o7777);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options
        .open(path)
        .map_err(|err| FetchError::storage("open file", path, err))
}

/// Apply the entry mode exactly, without the process umask
fn set_mode(file: &File, path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|err| FetchError::storage("chmod", path, err))?;
    }
    #[cfg(not(unix))]
    let _ = (file, path, mode);
    Ok(())
}
