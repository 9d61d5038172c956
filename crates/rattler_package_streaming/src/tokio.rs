//! Extracts a package archive on a blocking-pool thread, keeping the async runtime free while
//! the CPU-bound decompression and unpacking runs.

use std::path::Path;

use crate::{ArchiveType, ExtractError};

async fn spawn_extract(
    f: impl FnOnce() -> Result<(), ExtractError> + Send + 'static,
) -> Result<(), ExtractError> {
    match ::tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_error) => {
            if let Ok(reason) = join_error.try_into_panic() {
                std::panic::resume_unwind(reason);
            }
            Err(ExtractError::Cancelled)
        }
    }
}

/// Extracts a `.tar.bz2` package archive at `archive` to `destination` on a blocking-pool
/// thread.
pub async fn extract_tar_bz2(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
    let archive = archive.to_owned();
    let destination = destination.to_owned();
    spawn_extract(move || crate::fs::extract_tar_bz2(&archive, &destination)).await
}

/// Extracts a `.conda` package archive at `archive` to `destination` on a blocking-pool thread.
pub async fn extract_conda(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
    let archive = archive.to_owned();
    let destination = destination.to_owned();
    spawn_extract(move || crate::fs::extract_conda(&archive, &destination)).await
}

/// Extracts the package archive at `archive` to `destination` on a blocking-pool thread. The
/// archive format is determined from `archive`'s file name.
pub async fn extract(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
    match ArchiveType::try_from(archive).ok_or(ExtractError::UnsupportedArchiveType)? {
        ArchiveType::TarBz2 => extract_tar_bz2(archive, destination).await,
        ArchiveType::Conda => extract_conda(archive, destination).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_tar_bz2_fixture(path: &Path) {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::fast());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            let data = b"{}";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "info/index.json", &data[..]).unwrap();
            builder.finish().unwrap();
        }
        std::fs::write(path, encoder.finish().unwrap()).unwrap();
    }

    #[::tokio::test]
    async fn test_async_extract_offloads_to_blocking_pool() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("test-1.0-0.tar.bz2");
        write_tar_bz2_fixture(&archive_path);

        let dest = dir.path().join("extracted");
        extract(&archive_path, &dest).await.unwrap();
        assert!(dest.join("info/index.json").exists());
    }

    #[::tokio::test]
    async fn test_async_extract_rejects_unknown_extension() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("test.zip");
        std::fs::write(&archive_path, b"not a conda package").unwrap();

        let dest = dir.path().join("extracted");
        assert!(matches!(
            extract(&archive_path, &dest).await,
            Err(ExtractError::UnsupportedArchiveType)
        ));
    }
}
