//! Extracts or streams a package archive from anything implementing [`std::io::Read`].
//!
//! Use this module when the whole archive isn't yet seekable, e.g. while it's still being
//! written. [`crate::seek::stream_conda_info`] and [`crate::seek::stream_conda_content`] need
//! [`std::io::Seek`] too but can extract a single component of a `.conda` archive without
//! reading the rest.

use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;

use zip::read::read_zipfile_from_stream;

use crate::ExtractError;

/// Wraps `reader` in a bzip2-decompressing `tar::Archive`.
pub fn stream_tar_bz2(reader: impl Read) -> tar::Archive<impl Read + Sized> {
    tar::Archive::new(bzip2::read::BzDecoder::new(reader))
}

/// Wraps `reader` in a zstd-decompressing `tar::Archive`.
pub(crate) fn stream_tar_zst(reader: impl Read) -> Result<tar::Archive<impl Read + Sized>, ExtractError> {
    Ok(tar::Archive::new(zstd::stream::read::Decoder::new(reader)?))
}

/// Extracts a `.tar.bz2` package archive to `destination`, creating it if necessary.
pub fn extract_tar_bz2(reader: impl Read, destination: &Path) -> Result<(), ExtractError> {
    std::fs::create_dir_all(destination).map_err(ExtractError::CouldNotCreateDestination)?;
    stream_tar_bz2(reader).unpack(destination)?;
    Ok(())
}

/// Extracts a `.conda` package archive to `destination` by reading the outer zip container
/// entry-by-entry as it streams in, unpacking the `pkg-*.tar.zst` content tarball and skipping
/// everything else (notably the `info-*.tar.zst` metadata tarball, which callers needing it
/// should instead read up front with [`crate::seek::stream_conda_info`]).
pub fn extract_conda(mut reader: impl Read, destination: &Path) -> Result<(), ExtractError> {
    std::fs::create_dir_all(destination).map_err(ExtractError::CouldNotCreateDestination)?;

    while let Some(file) = read_zipfile_from_stream(&mut reader)? {
        let is_package_tarball = file
            .mangled_name()
            .file_name()
            .map(OsStr::to_string_lossy)
            .is_some_and(|name| name.starts_with("pkg-") && name.ends_with(".tar.zst"));
        if is_package_tarball {
            stream_tar_zst(file)?.unpack(destination)?;
        }
    }

    Ok(())
}

/// Extracts `reader` to `destination`, dispatching on `archive_type`.
pub fn extract(
    archive_type: crate::ArchiveType,
    reader: impl Read,
    destination: &Path,
) -> Result<(), ExtractError> {
    match archive_type {
        crate::ArchiveType::TarBz2 => extract_tar_bz2(reader, destination),
        crate::ArchiveType::Conda => extract_conda(reader, destination),
    }
}
