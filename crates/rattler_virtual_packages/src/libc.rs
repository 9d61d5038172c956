//! Low-level functions to detect the libc family and version. See [`libc_family_and_version`].

use once_cell::sync::OnceCell;
use rattler_conda_types::{ParseVersionError, Version};

/// Returns the libc family (e.g. `"glibc"`) and version used by the current platform.
///
/// Returns `None` if the platform does not have a detectable libc (e.g. it isn't unix, or it's
/// statically linked musl).
pub fn libc_family_and_version() -> Result<Option<(String, Version)>, DetectLibCError> {
    static DETECTED: OnceCell<Option<(String, Version)>> = OnceCell::new();
    DETECTED.get_or_try_init(try_detect_libc_version).cloned()
}

#[cfg(unix)]
mod ffi {
    use std::os::raw::{c_char, c_int};

    pub const CS_GNU_LIBC_VERSION: c_int = 2;
    pub const CS_GNU_LIBPTHREAD_VERSION: c_int = 3;

    extern "C" {
        pub fn confstr(name: c_int, buf: *mut c_char, length: usize) -> usize;
    }
}

/// An error that can occur while detecting the libc version.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DetectLibCError {
    #[error("failed to parse the libc version reported by the system")]
    ParseLibCVersion(#[from] ParseVersionError),
}

#[cfg(unix)]
fn try_detect_libc_version() -> Result<Option<(String, Version)>, DetectLibCError> {
    use std::str::FromStr;

    let version = match [ffi::CS_GNU_LIBC_VERSION, ffi::CS_GNU_LIBPTHREAD_VERSION]
        .into_iter()
        .find_map(|name| confstr(name).unwrap_or(None))
    {
        Some(version) => version,
        None => return Ok(None),
    };

    let Some((family, version)) = version.split_once(' ') else {
        return Ok(None);
    };
    let version = Version::from_str(version)?;

    if family == "NPTL" {
        // NPTL is just the threading library's name; the version still refers to uClibc.
        let family = String::from("uClibc");
        tracing::warn!(
            "failed to detect non-glibc family precisely, assuming {} ({})",
            &family,
            &version
        );
        Ok(Some((family, version)))
    } else {
        Ok(Some((family.to_owned(), version)))
    }
}

#[cfg(not(unix))]
const fn try_detect_libc_version() -> Result<Option<(String, Version)>, DetectLibCError> {
    Ok(None)
}

#[cfg(unix)]
fn confstr(name: std::os::raw::c_int) -> Result<Option<String>, std::ffi::IntoStringError> {
    let len = match unsafe { ffi::confstr(name, std::ptr::null_mut(), 0) } {
        0 => return Ok(None),
        len => len,
    };
    let mut bytes = vec![0u8; len];
    if unsafe { ffi::confstr(name, bytes.as_mut_ptr().cast(), bytes.len()) } == 0 {
        return Ok(None);
    }
    // The buffer includes the trailing nul written by confstr.
    bytes.pop();
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

#[cfg(test)]
mod test {
    #[test]
    #[cfg(unix)]
    fn doesnt_crash() {
        let version = super::try_detect_libc_version().unwrap();
        println!("libc {version:?}");
    }
}
