//! Links a single file from an extracted package cache entry into a target prefix, and reverses
//! the operation during an unlink. Grounded in the teacher's `install/link.rs` and
//! `install/unlink.rs`, trimmed to the four placement kinds [`PathType`] already models (no
//! noarch-python renaming, no Apple codesigning — neither is named by this crate's scope).

use std::path::{Path, PathBuf};

use rattler_conda_types::{PathType, PathsEntry};

/// The historical conda prefix placeholder: packages built with a relocatable prefix bake this
/// string into text files in place of the real install path, to be rewritten at link time.
const PREFIX_PLACEHOLDER: &str = "/opt/anaconda1anaconda2anaconda3";

/// An error that can occur while linking or unlinking a single file.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The parent directory of the destination could not be created.
    #[error("failed to create parent directory for {path}")]
    CreateParentDir {
        /// The destination path.
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// The source file could not be read.
    #[error("failed to read {path}")]
    ReadSource {
        /// The source path.
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// The file could not be placed at the destination by the requested method.
    #[error("failed to link {path}")]
    Link {
        /// The destination path.
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// A pre-existing file occupies the destination and isn't owned by the package being
    /// installed.
    #[error("refusing to overwrite {0}, not owned by this package")]
    Conflict(PathBuf),

    /// The file could not be removed during unlink.
    #[error("failed to remove {path}")]
    Remove {
        /// The path that could not be removed.
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },
}

/// Links one file described by `entry` from `package_dir` (the extracted cache entry) into
/// `target_prefix`, using the placement kind recorded in `entry.path_type`.
pub fn link_file(entry: &PathsEntry, package_dir: &Path, target_prefix: &Path) -> Result<(), LinkError> {
    let source = package_dir.join(&entry.relative_path);
    let dest = target_prefix.join(&entry.relative_path);

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|cause| LinkError::CreateParentDir { path: dest.clone(), cause })?;
    }

    if dest.exists() {
        return Err(LinkError::Conflict(dest));
    }

    match entry.path_type {
        PathType::HardLink => std::fs::hard_link(&source, &dest).map_err(|cause| LinkError::Link { path: dest.clone(), cause })?,
        PathType::SoftLink => symlink(&source, &dest).map_err(|cause| LinkError::Link { path: dest.clone(), cause })?,
        PathType::Copy => {
            reflink_copy::reflink_or_copy(&source, &dest)
                .map_err(|cause| LinkError::Link { path: dest.clone(), cause })?;
        }
        PathType::PrefixReplacedText => {
            let contents = std::fs::read_to_string(&source).map_err(|cause| LinkError::ReadSource { path: source.clone(), cause })?;
            let prefix_str = target_prefix.to_string_lossy();
            let rewritten = contents.replace(PREFIX_PLACEHOLDER, prefix_str.as_ref());
            std::fs::write(&dest, rewritten).map_err(|cause| LinkError::Link { path: dest.clone(), cause })?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, dest)
}

/// Removes one previously-linked file. Missing files are not an error (a prior partial run, or
/// an out-of-band removal, may already have taken care of it).
pub fn unlink_file(entry: &PathsEntry, target_prefix: &Path) -> Result<(), LinkError> {
    let dest = target_prefix.join(&entry.relative_path);
    match std::fs::remove_file(&dest) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(cause) => Err(LinkError::Remove { path: dest, cause }),
    }
}

/// Reads the per-package manifest (`info/paths.json`) out of an extracted cache entry. The
/// format is exactly [`rattler_conda_types::PrefixPaths`]'s shape: this is the same list later
/// copied, unmodified, into the installed `conda-meta/<pkg>.json` record.
pub fn read_package_manifest(extracted_dir: &Path) -> Result<Vec<PathsEntry>, LinkError> {
    let manifest_path = extracted_dir.join("info").join("paths.json");
    if !manifest_path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(&manifest_path)
        .map_err(|cause| LinkError::ReadSource { path: manifest_path.clone(), cause })?;
    let paths: rattler_conda_types::PrefixPaths = serde_json::from_str(&contents)
        .map_err(|err| LinkError::ReadSource { path: manifest_path, cause: std::io::Error::new(std::io::ErrorKind::InvalidData, err) })?;
    Ok(paths.paths)
}
