#![deny(missing_docs)]

//! Extracts conda package archives (`.tar.bz2` and `.conda`) to a destination directory.
//!
//! Packages arrive on disk already downloaded and integrity-checked by `rattler_networking`;
//! this crate's job starts at the archive file and ends at an extracted package directory.

pub mod fs;
pub mod read;
pub mod seek;
pub mod tokio;

use std::path::Path;

/// The two archive formats a conda package can be distributed in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ArchiveType {
    /// A `.tar.bz2` archive: a bzip2-compressed tarball of the whole package.
    TarBz2,
    /// A `.conda` archive: an uncompressed zip containing an `info-*.tar.zst` and a
    /// `pkg-*.tar.zst` entry.
    Conda,
}

impl ArchiveType {
    /// Determines the archive type from a file name's extension.
    pub fn try_from(path: impl AsRef<Path>) -> Option<ArchiveType> {
        let name = path.as_ref().to_string_lossy();
        if name.ends_with(".conda") {
            Some(ArchiveType::Conda)
        } else if name.ends_with(".tar.bz2") {
            Some(ArchiveType::TarBz2)
        } else {
            None
        }
    }

    /// The file extension for this archive type, including the leading dot(s).
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveType::TarBz2 => ".tar.bz2",
            ArchiveType::Conda => ".conda",
        }
    }
}

/// An error that can occur while extracting a package archive.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// An IO error occurred while reading the archive or writing its contents.
    #[error("an io error occurred")]
    Io(#[from] std::io::Error),

    /// The destination directory could not be created.
    #[error("could not create the destination path")]
    CouldNotCreateDestination(#[source] std::io::Error),

    /// The `.conda` zip container itself is malformed.
    #[error("invalid zip archive")]
    Zip(#[from] zip::result::ZipError),

    /// A `.conda` archive is missing its `info-*.tar.zst` or `pkg-*.tar.zst` entry.
    #[error("a component is missing from the package archive")]
    MissingComponent,

    /// A `.conda` archive's inner entry is compressed with something other than `Stored`,
    /// which would require decompressing the outer zip to find its boundaries.
    #[error("unsupported compression method for inner archive entry")]
    UnsupportedCompressionMethod,

    /// The file name's extension doesn't match a known package archive format.
    #[error("unsupported package archive format")]
    UnsupportedArchiveType,

    /// Extraction was cancelled, or the blocking task it ran on panicked.
    #[error("extraction was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_type_from_extension() {
        assert_eq!(ArchiveType::try_from("foo-1.0-0.conda"), Some(ArchiveType::Conda));
        assert_eq!(ArchiveType::try_from("foo-1.0-0.tar.bz2"), Some(ArchiveType::TarBz2));
        assert_eq!(ArchiveType::try_from("foo-1.0-0.whl"), None);
    }

    #[test]
    fn test_extension_roundtrip() {
        assert_eq!(ArchiveType::Conda.extension(), ".conda");
        assert_eq!(ArchiveType::TarBz2.extension(), ".tar.bz2");
    }
}
