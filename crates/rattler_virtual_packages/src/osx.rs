//! Low-level functions to detect the macOS version of the system. See [`osx_version`].

use once_cell::sync::OnceCell;
use rattler_conda_types::{ParseVersionError, Version};

/// Returns the macOS version of the current platform.
///
/// Returns an error if determining the version resulted in an error. Returns `None` if the
/// current platform is not macOS.
pub fn osx_version() -> Result<Option<Version>, ParseOsxVersionError> {
    static DETECTED: OnceCell<Option<Version>> = OnceCell::new();
    DETECTED.get_or_try_init(try_detect_osx_version).cloned()
}

#[cfg(target_os = "macos")]
fn try_detect_osx_version() -> Result<Option<Version>, ParseOsxVersionError> {
    use std::str::FromStr;

    let file = std::fs::read_to_string("/System/Library/CoreServices/SystemVersion.plist")
        .map_err(ParseOsxVersionError::FailedToReadSystemVersion)?;
    let cursor = std::io::Cursor::new(file.as_bytes());
    let value =
        plist::Value::from_reader(cursor).map_err(|_| ParseOsxVersionError::CorruptedDictionary)?;

    let version = value
        .as_dictionary()
        .ok_or(ParseOsxVersionError::CorruptedDictionary)?
        .get("ProductVersion")
        .ok_or(ParseOsxVersionError::MissingProductVersion)?
        .as_string()
        .ok_or(ParseOsxVersionError::ProductVersionIsNotAString)?;

    Ok(Some(Version::from_str(version)?))
}

#[cfg(not(target_os = "macos"))]
const fn try_detect_osx_version() -> Result<Option<Version>, ParseOsxVersionError> {
    Ok(None)
}

/// An error that can occur while detecting the macOS version.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum ParseOsxVersionError {
    #[error("failed to read `/System/Library/CoreServices/SystemVersion.plist`")]
    FailedToReadSystemVersion(#[source] std::io::Error),
    #[error("SystemVersion.plist is not a dictionary")]
    CorruptedDictionary,
    #[error("SystemVersion.plist is missing the ProductVersion key")]
    MissingProductVersion,
    #[error("SystemVersion.plist's ProductVersion value is not a string")]
    ProductVersionIsNotAString,
    #[error("invalid version")]
    InvalidVersion(#[from] ParseVersionError),
}

#[cfg(test)]
mod test {
    #[test]
    #[cfg(target_os = "macos")]
    fn doesnt_crash() {
        let version = super::try_detect_osx_version();
        println!("macOS {version:?}");
    }
}
