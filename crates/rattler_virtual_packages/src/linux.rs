//! Low-level functions to detect the Linux kernel version on the system. See [`linux_version`].

use std::str::FromStr;

use once_cell::sync::OnceCell;
use rattler_conda_types::{ParseVersionError, Version};

/// Returns the Linux kernel version of the current platform.
///
/// Returns an error if determining the version resulted in an error. Returns `None` if the
/// current platform is not Linux.
pub fn linux_version() -> Result<Option<Version>, ParseLinuxVersionError> {
    static DETECTED: OnceCell<Option<Version>> = OnceCell::new();
    DETECTED.get_or_try_init(try_detect_linux_version).cloned()
}

#[cfg(target_os = "linux")]
fn try_detect_linux_version() -> Result<Option<Version>, ParseLinuxVersionError> {
    use std::{ffi::CStr, mem::MaybeUninit};

    mod ffi {
        use std::os::raw::{c_char, c_int};

        extern "C" {
            pub fn uname(buf: *mut utsname) -> c_int;
        }

        #[repr(C)]
        pub struct utsname {
            pub sysname: [c_char; 65],
            pub nodename: [c_char; 65],
            pub release: [c_char; 65],
            pub version: [c_char; 65],
            pub machine: [c_char; 65],
            pub domainname: [c_char; 65],
        }
    }

    let mut info = MaybeUninit::uninit();
    if unsafe { ffi::uname(info.as_mut_ptr()) } != 0 {
        return Ok(None);
    }
    let info: ffi::utsname = unsafe { info.assume_init() };
    let release = unsafe { CStr::from_ptr(info.release.as_ptr()) }.to_string_lossy();
    parse_linux_version(release.as_ref()).map(Some)
}

#[cfg(not(target_os = "linux"))]
const fn try_detect_linux_version() -> Result<Option<Version>, ParseLinuxVersionError> {
    Ok(None)
}

/// An error that can occur while detecting the Linux kernel version.
#[derive(Debug, Clone, thiserror::Error)]
#[allow(missing_docs)]
pub enum ParseLinuxVersionError {
    #[error("could not extract a version number from the kernel release string")]
    ParseError,
    #[error("invalid version")]
    InvalidVersion(#[from] ParseVersionError),
}

fn parse_linux_version(release: &str) -> Result<Version, ParseLinuxVersionError> {
    Ok(Version::from_str(
        extract_version_part(release).ok_or(ParseLinuxVersionError::ParseError)?,
    )?)
}

/// Takes the leading `major.minor[.patch[.patch]]` out of a kernel release string, e.g.
/// `"5.10.102.1-microsoft-standard-WSL2"` -> `"5.10.102.1"`.
fn extract_version_part(release: &str) -> Option<&str> {
    use nom::{
        character::complete::{char, digit1},
        combinator::{opt, recognize},
        sequence::{pair, tuple},
    };
    let result: Result<_, nom::Err<nom::error::Error<_>>> = recognize(tuple((
        digit1,
        char('.'),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(pair(char('.'), digit1)),
    )))(release);
    let (_rest, part) = result.ok()?;
    Some(part)
}

#[cfg(test)]
mod test {
    use super::extract_version_part;

    #[test]
    fn test_extract_version_part() {
        assert_eq!(
            extract_version_part("5.10.102.1-microsoft-standard-WSL2"),
            Some("5.10.102.1")
        );
        assert_eq!(
            extract_version_part("2.6.32-220.17.1.el6.i686"),
            Some("2.6.32")
        );
        assert_eq!(extract_version_part("3.16.0-31-generic"), Some("3.16.0"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn doesnt_crash() {
        let version = super::try_detect_linux_version();
        println!("Linux {version:?}");
    }
}
