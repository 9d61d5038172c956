//! Streams a single component out of a `.conda` archive without extracting the rest, for
//! anything implementing both [`std::io::Read`] and [`std::io::Seek`] (a [`std::fs::File`] or
//! an in-memory [`std::io::Cursor`]).

use std::io::{Read, Seek, SeekFrom};

use zip::CompressionMethod;

use crate::read::stream_tar_zst;
use crate::ExtractError;

fn stream_conda_zip_entry<'a>(
    mut archive: zip::ZipArchive<impl Read + Seek + 'a>,
    file_name: &str,
) -> Result<tar::Archive<impl Read + Sized + 'a>, ExtractError> {
    let (offset, size) = {
        let entry = archive.by_name(file_name)?;
        if entry.compression() != CompressionMethod::Stored {
            return Err(ExtractError::UnsupportedCompressionMethod);
        }
        (entry.data_start(), entry.size())
    };

    let mut reader = archive.into_inner();
    reader.seek(SeekFrom::Start(offset))?;

    stream_tar_zst(reader.take(size))
}

/// Streams the `info-*.tar.zst` metadata tarball out of a `.conda` archive.
pub fn stream_conda_info<'a>(
    reader: impl Read + Seek + 'a,
) -> Result<tar::Archive<impl Read + Sized + 'a>, ExtractError> {
    let archive = zip::ZipArchive::new(reader)?;
    let file_name = archive
        .file_names()
        .find(|name| name.starts_with("info-") && name.ends_with(".tar.zst"))
        .ok_or(ExtractError::MissingComponent)?
        .to_owned();
    stream_conda_zip_entry(archive, &file_name)
}

/// Streams the `pkg-*.tar.zst` content tarball out of a `.conda` archive.
pub fn stream_conda_content<'a>(
    reader: impl Read + Seek + 'a,
) -> Result<tar::Archive<impl Read + Sized + 'a>, ExtractError> {
    let archive = zip::ZipArchive::new(reader)?;
    let file_name = archive
        .file_names()
        .find(|name| name.starts_with("pkg-") && name.ends_with(".tar.zst"))
        .ok_or(ExtractError::MissingComponent)?
        .to_owned();
    stream_conda_zip_entry(archive, &file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_conda(info_entries: &[(&str, &[u8])], pkg_entries: &[(&str, &[u8])]) -> Vec<u8> {
        let tar_zst = |entries: &[(&str, &[u8])]| {
            let mut encoder = zstd::stream::write::Encoder::new(Vec::new(), 0).unwrap();
            {
                let mut builder = tar::Builder::new(&mut encoder);
                for (name, data) in entries {
                    let mut header = tar::Header::new_gnu();
                    header.set_size(data.len() as u64);
                    header.set_mode(0o644);
                    header.set_cksum();
                    builder.append_data(&mut header, name, *data).unwrap();
                }
                builder.finish().unwrap();
            }
            encoder.finish().unwrap()
        };

        let mut zip_bytes = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_bytes));
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);

            zip.start_file("info-test-1.0-0.tar.zst", options).unwrap();
            zip.write_all(&tar_zst(info_entries)).unwrap();

            zip.start_file("pkg-test-1.0-0.tar.zst", options).unwrap();
            zip.write_all(&tar_zst(pkg_entries)).unwrap();

            zip.finish().unwrap();
        }
        zip_bytes
    }

    #[test]
    fn test_stream_conda_info_finds_only_info_entry() {
        let archive = build_conda(&[("index.json", b"{\"name\":\"test\"}")], &[("lib/test.so", b"binary")]);
        let mut info = stream_conda_info(std::io::Cursor::new(archive)).unwrap();
        let mut entries = info.entries().unwrap();
        let mut first = entries.next().unwrap().unwrap();
        assert_eq!(first.path().unwrap().to_str().unwrap(), "index.json");
        let mut contents = String::new();
        first.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "{\"name\":\"test\"}");
    }

    #[test]
    fn test_stream_conda_content_finds_only_pkg_entry() {
        let archive = build_conda(&[("index.json", b"{}")], &[("lib/test.so", b"binary")]);
        let mut content = stream_conda_content(std::io::Cursor::new(archive)).unwrap();
        let mut entries = content.entries().unwrap();
        let first = entries.next().unwrap().unwrap();
        assert_eq!(first.path().unwrap().to_str().unwrap(), "lib/test.so");
    }

    #[test]
    fn test_stream_conda_info_missing_component() {
        let mut zip_bytes = Vec::new();
        {
            let zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_bytes));
            zip.finish().unwrap();
        }
        assert!(matches!(
            stream_conda_info(std::io::Cursor::new(zip_bytes)),
            Err(ExtractError::MissingComponent)
        ));
    }
}
