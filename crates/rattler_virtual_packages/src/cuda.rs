//! Detects the maximum CUDA driver version supported by the host (the `__cuda` virtual package).
//!
//! Three methods are tried in order: the NVIDIA Management Library (`libnvidia-ml`), the CUDA
//! driver library (`libcuda`) directly, and, on musl where dynamic library loading isn't
//! supported, shelling out to `nvidia-smi`.

use std::{
    mem::MaybeUninit,
    os::raw::{c_int, c_uint, c_ulong},
    process::Command,
    str::FromStr,
};

use libloading::{Library, Symbol};
use once_cell::sync::{Lazy, OnceCell};
use rattler_conda_types::Version;

/// Returns the maximum CUDA driver version available on the current platform, or `None` if no
/// CUDA driver is installed.
pub fn cuda_version() -> Option<Version> {
    static DETECTED: OnceCell<Option<Version>> = OnceCell::new();
    DETECTED.get_or_init(detect_cuda_version).clone()
}

fn detect_cuda_version() -> Option<Version> {
    if cfg!(target_env = "musl") {
        detect_cuda_version_via_nvidia_smi()
    } else {
        detect_cuda_version_via_nvml().or_else(detect_cuda_version_via_libcuda)
    }
}

/// Detects the CUDA driver version via the NVIDIA Management Library. Preferred over
/// [`detect_cuda_version_via_libcuda`] because `libcuda`'s behavior depends on
/// `CUDA_VISIBLE_DEVICES`.
pub fn detect_cuda_version_via_nvml() -> Option<Version> {
    let library = nvml_library_paths()
        .iter()
        .find_map(|path| unsafe { Library::new(path).ok() })?;

    let nvml_init: Symbol<'_, unsafe extern "C" fn() -> c_int> = unsafe {
        library
            .get(b"nvmlInit_v2\0")
            .or_else(|_| library.get(b"nvmlInit\0"))
    }
    .ok()?;
    let nvml_shutdown: Symbol<'_, unsafe extern "C" fn() -> c_int> =
        unsafe { library.get(b"nvmlShutdown\0") }.ok()?;
    let get_cuda_driver_version: Symbol<'_, unsafe extern "C" fn(*mut c_int) -> c_int> = unsafe {
        library
            .get(b"nvmlSystemGetCudaDriverVersion_v2\0")
            .or_else(|_| library.get(b"nvmlSystemGetCudaDriverVersion\0"))
    }
    .ok()?;

    if unsafe { nvml_init() } != 0 {
        return None;
    }
    let mut raw = MaybeUninit::uninit();
    let result = unsafe { get_cuda_driver_version(raw.as_mut_ptr()) };
    let _ = unsafe { nvml_shutdown() };
    if result != 0 {
        return None;
    }
    version_from_packed(unsafe { raw.assume_init() })
}

/// Detects the CUDA driver version directly via `libcuda`'s driver API.
pub fn detect_cuda_version_via_libcuda() -> Option<Version> {
    let library = cuda_library_paths()
        .iter()
        .find_map(|path| unsafe { Library::new(path).ok() })?;

    let cu_init: Symbol<'_, unsafe extern "C" fn(c_uint) -> c_ulong> =
        unsafe { library.get(b"cuInit\0") }.ok()?;
    let cu_driver_get_version: Symbol<'_, unsafe extern "C" fn(*mut c_int) -> c_ulong> =
        unsafe { library.get(b"cuDriverGetVersion\0") }.ok()?;

    if unsafe { cu_init(0) } != 0 {
        return None;
    }
    let mut raw = MaybeUninit::uninit();
    if unsafe { cu_driver_get_version(raw.as_mut_ptr()) } != 0 {
        return None;
    }
    version_from_packed(unsafe { raw.assume_init() })
}

/// Shells out to `nvidia-smi`; used only where dynamic library loading isn't available (musl).
fn detect_cuda_version_via_nvidia_smi() -> Option<Version> {
    static CUDA_VERSION_RE: Lazy<regex::Regex> =
        Lazy::new(|| regex::Regex::new("<cuda_version>(.*)</cuda_version>").unwrap());

    let output = Command::new("nvidia-smi")
        .arg("--query")
        .arg("-u")
        .arg("-x")
        // libcuda/nvidia-smi's reported version depends on this variable; unset it for a
        // consistent result.
        .env_remove("CUDA_VISIBLE_DEVICES")
        .output()
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = CUDA_VERSION_RE.captures(&stdout)?.get(1)?.as_str();
    Version::from_str(version).ok()
}

fn version_from_packed(version: c_int) -> Option<Version> {
    Version::from_str(&format!("{}.{}", version / 1000, (version % 1000) / 10)).ok()
}

fn nvml_library_paths() -> &'static [&'static str] {
    #[cfg(target_os = "macos")]
    static FILENAMES: &[&str] = &[
        "libnvidia-ml.1.dylib",
        "libnvidia-ml.dylib",
        "/usr/local/cuda/lib/libnvidia-ml.1.dylib",
        "/usr/local/cuda/lib/libnvidia-ml.dylib",
    ];
    #[cfg(target_os = "linux")]
    static FILENAMES: &[&str] = &[
        "libnvidia-ml.so.1",
        "libnvidia-ml.so",
        "/usr/lib64/nvidia/libnvidia-ml.so.1",
        "/usr/lib64/nvidia/libnvidia-ml.so",
        "/usr/lib/x86_64-linux-gnu/libnvidia-ml.so.1",
        "/usr/lib/x86_64-linux-gnu/libnvidia-ml.so",
        "/usr/lib/wsl/lib/libnvidia-ml.so.1",
        "/usr/lib/wsl/lib/libnvidia-ml.so",
    ];
    #[cfg(windows)]
    static FILENAMES: &[&str] = &["nvml.dll"];
    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    static FILENAMES: &[&str] = &[];
    FILENAMES
}

fn cuda_library_paths() -> &'static [&'static str] {
    #[cfg(target_os = "macos")]
    static FILENAMES: &[&str] = &[
        "libcuda.1.dylib",
        "libcuda.dylib",
        "/usr/local/cuda/lib/libcuda.1.dylib",
        "/usr/local/cuda/lib/libcuda.dylib",
    ];
    #[cfg(target_os = "linux")]
    static FILENAMES: &[&str] = &[
        "libcuda.so.1",
        "libcuda.so",
        "/usr/lib64/nvidia/libcuda.so.1",
        "/usr/lib64/nvidia/libcuda.so",
        "/usr/lib/x86_64-linux-gnu/libcuda.so.1",
        "/usr/lib/x86_64-linux-gnu/libcuda.so",
        "/usr/lib/wsl/lib/libcuda.so.1",
        "/usr/lib/wsl/lib/libcuda.so",
    ];
    #[cfg(windows)]
    static FILENAMES: &[&str] = &["nvcuda.dll"];
    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    static FILENAMES: &[&str] = &[];
    FILENAMES
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn doesnt_crash() {
        let version = cuda_version();
        println!("CUDA {version:?}");
    }
}
