#![deny(missing_docs)]

//! Detects Conda virtual packages present on the host system.
//!
//! A virtual package represents a capability of the host — a kernel version, a libc family, a
//! CUDA driver, a CPU microarchitecture — that real packages can depend on without that
//! capability ever being installable itself. The solver driver (C12) computes the current set via
//! [`VirtualPackage::detect`] and inserts them as a synthetic installed record so constraints
//! against `__glibc`, `__cuda`, `__osx`, `__linux`, `__unix`, `__win`, and `__archspec` resolve.
//!
//! Use [`VirtualPackage::detect`] for the common case. The per-package structs ([`Linux`],
//! [`Osx`], [`LibC`], [`Cuda`], [`Archspec`]) are available directly if you need to detect or
//! override just one of them.

pub mod cuda;
pub mod libc;
pub mod linux;
pub mod osx;

use std::{
    env,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use archspec::cpu::Microarchitecture;
use rattler_conda_types::{GenericVirtualPackage, ParseVersionError, Platform, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{libc::DetectLibCError, linux::ParseLinuxVersionError, osx::ParseOsxVersionError};

/// Selects where a single virtual package's value comes from: autodetection, a named environment
/// variable, or a literal override value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Override {
    /// Use this type's default environment variable ([`EnvOverride::DEFAULT_ENV_NAME`]).
    #[default]
    DefaultEnvVar,
    /// Use a custom environment variable name.
    EnvVar(String),
    /// Use this literal string, bypassing both detection and the environment.
    String(String),
}

/// Implemented by virtual packages whose detected value can be overridden from the environment,
/// e.g. `CONDA_OVERRIDE_GLIBC=2.31`.
pub trait EnvOverride: Sized {
    /// Parses an override string (e.g. the contents of an environment variable) into `Self`.
    fn parse_version(value: &str) -> Result<Self, ParseVersionError>;

    /// Like [`EnvOverride::parse_version`] but treats an empty string as "explicitly disabled"
    /// (`Ok(None)`) rather than a parse error.
    fn parse_version_opt(value: &str) -> Result<Option<Self>, DetectVirtualPackageError> {
        if value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Self::parse_version(value)?))
        }
    }

    /// Reads `env_var_name`; if unset, falls back to `fallback`.
    fn from_env_var_name_or<F>(
        env_var_name: &str,
        fallback: F,
    ) -> Result<Option<Self>, DetectVirtualPackageError>
    where
        F: FnOnce() -> Result<Option<Self>, DetectVirtualPackageError>,
    {
        match env::var(env_var_name) {
            Ok(value) => Self::parse_version_opt(&value),
            Err(env::VarError::NotPresent) => fallback(),
            Err(e) => Err(DetectVirtualPackageError::VarError(e)),
        }
    }

    /// The environment variable name consulted when [`Override::DefaultEnvVar`] is in effect.
    const DEFAULT_ENV_NAME: &'static str;

    /// Detects this virtual package directly from the host, bypassing any override.
    fn detect_from_host() -> Result<Option<Self>, DetectVirtualPackageError>;

    /// Resolves `ov` to a value, calling `fallback` (typically [`EnvOverride::detect_from_host`])
    /// when `ov` asks for the default environment variable and it isn't set.
    fn detect_with_fallback<F>(
        ov: &Override,
        fallback: F,
    ) -> Result<Option<Self>, DetectVirtualPackageError>
    where
        F: FnOnce() -> Result<Option<Self>, DetectVirtualPackageError>,
    {
        match ov {
            Override::String(s) => Self::parse_version_opt(s),
            Override::DefaultEnvVar => Self::from_env_var_name_or(Self::DEFAULT_ENV_NAME, fallback),
            Override::EnvVar(name) => Self::from_env_var_name_or(name, fallback),
        }
    }

    /// Detects this virtual package, applying `ov` if given, else autodetecting from the host.
    fn detect(ov: Option<&Override>) -> Result<Option<Self>, DetectVirtualPackageError> {
        ov.map_or_else(Self::detect_from_host, |ov| {
            Self::detect_with_fallback(ov, Self::detect_from_host)
        })
    }
}

/// All virtual package types this crate can detect.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum VirtualPackage {
    /// `__win`: present on Windows.
    Win,
    /// `__unix`: present on any unix-like platform.
    Unix,
    /// `__linux`: the host's Linux kernel version.
    Linux(Linux),
    /// `__osx`: the host's macOS version.
    Osx(Osx),
    /// `__glibc` (or another libc family): the host's libc version.
    LibC(LibC),
    /// `__cuda`: the maximum CUDA driver version supported by the host.
    Cuda(Cuda),
    /// `__archspec`: the host's CPU microarchitecture.
    Archspec(Archspec),
}

impl From<VirtualPackage> for GenericVirtualPackage {
    fn from(package: VirtualPackage) -> Self {
        match package {
            VirtualPackage::Win => GenericVirtualPackage {
                name: rattler_conda_types::PackageName::new_unchecked("__win"),
                version: zero_version(),
                build_string: "0".into(),
            },
            VirtualPackage::Unix => GenericVirtualPackage {
                name: rattler_conda_types::PackageName::new_unchecked("__unix"),
                version: zero_version(),
                build_string: "0".into(),
            },
            VirtualPackage::Linux(linux) => linux.into(),
            VirtualPackage::Osx(osx) => osx.into(),
            VirtualPackage::LibC(libc) => libc.into(),
            VirtualPackage::Cuda(cuda) => cuda.into(),
            VirtualPackage::Archspec(spec) => spec.into(),
        }
    }
}

fn zero_version() -> Version {
    Version::from_str("0").expect("\"0\" is always a valid version")
}

impl VirtualPackage {
    /// Detects the virtual packages present on the current host, with the given overrides
    /// applied to the overridable ones (`__glibc`, `__osx`, `__cuda`).
    pub fn detect(
        overrides: &VirtualPackageOverrides,
    ) -> Result<Vec<Self>, DetectVirtualPackageError> {
        let mut result = Vec::new();
        let platform = Platform::current();

        if platform.is_unix() {
            result.push(VirtualPackage::Unix);
        }
        if platform.is_windows() {
            result.push(VirtualPackage::Win);
        }

        if platform.is_linux() {
            if let Some(linux) = Linux::current()? {
                result.push(linux.into());
            }
            if let Some(libc) = LibC::detect(overrides.libc.as_ref())? {
                result.push(libc.into());
            }
        }

        if platform.is_osx() {
            if let Some(osx) = Osx::detect(overrides.osx.as_ref())? {
                result.push(osx.into());
            }
        }

        if let Some(cuda) = Cuda::detect(overrides.cuda.as_ref())? {
            result.push(cuda.into());
        }

        if let Some(archspec) = Archspec::current() {
            result.push(archspec.into());
        }

        Ok(result)
    }
}

/// An error that can occur while detecting virtual packages.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum DetectVirtualPackageError {
    #[error(transparent)]
    ParseLinuxVersion(#[from] ParseLinuxVersionError),
    #[error(transparent)]
    ParseMacOsVersion(#[from] ParseOsxVersionError),
    #[error(transparent)]
    DetectLibC(#[from] DetectLibCError),
    #[error(transparent)]
    VarError(#[from] env::VarError),
    #[error(transparent)]
    VersionParseError(#[from] ParseVersionError),
}

/// Overrides consulted by [`VirtualPackage::detect`] for the virtual packages that support
/// overriding (`__glibc`, `__osx`, `__cuda`). `None` means autodetect.
#[derive(Default, Clone, Debug)]
pub struct VirtualPackageOverrides {
    /// Override for `__osx`.
    pub osx: Option<Override>,
    /// Override for `__glibc`.
    pub libc: Option<Override>,
    /// Override for `__cuda`.
    pub cuda: Option<Override>,
}

impl VirtualPackageOverrides {
    /// Applies `ov` to every overridable virtual package.
    pub fn all(ov: Override) -> Self {
        Self {
            osx: Some(ov.clone()),
            libc: Some(ov.clone()),
            cuda: Some(ov),
        }
    }

    /// Every overridable virtual package reads from its default environment variable
    /// (`CONDA_OVERRIDE_OSX`, `CONDA_OVERRIDE_GLIBC`, `CONDA_OVERRIDE_CUDA`).
    pub fn from_env() -> Self {
        Self::all(Override::DefaultEnvVar)
    }
}

/// `__linux`: the host's Linux kernel version.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Deserialize)]
pub struct Linux {
    /// The kernel version.
    pub version: Version,
}

impl Linux {
    /// Returns the Linux kernel version of the current platform, or `None` if not running Linux.
    pub fn current() -> Result<Option<Self>, ParseLinuxVersionError> {
        Ok(linux::linux_version()?.map(|version| Self { version }))
    }
}

impl From<Linux> for GenericVirtualPackage {
    fn from(linux: Linux) -> Self {
        GenericVirtualPackage {
            name: rattler_conda_types::PackageName::new_unchecked("__linux"),
            version: linux.version,
            build_string: "0".into(),
        }
    }
}

impl From<Linux> for VirtualPackage {
    fn from(linux: Linux) -> Self {
        VirtualPackage::Linux(linux)
    }
}

/// `__glibc` (or another libc family): the host's libc family and version.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Deserialize)]
pub struct LibC {
    /// The libc family, e.g. `"glibc"`.
    pub family: String,
    /// The libc version.
    pub version: Version,
}

impl LibC {
    /// Returns the libc family and version of the current platform, or `None` if undetectable.
    pub fn current() -> Result<Option<Self>, DetectLibCError> {
        Ok(libc::libc_family_and_version()?.map(|(family, version)| Self { family, version }))
    }
}

impl From<LibC> for GenericVirtualPackage {
    fn from(libc: LibC) -> Self {
        GenericVirtualPackage {
            name: format!("__{}", libc.family.to_lowercase())
                .try_into()
                .unwrap_or_else(|_| rattler_conda_types::PackageName::new_unchecked("__libc")),
            version: libc.version,
            build_string: "0".into(),
        }
    }
}

impl From<LibC> for VirtualPackage {
    fn from(libc: LibC) -> Self {
        VirtualPackage::LibC(libc)
    }
}

impl EnvOverride for LibC {
    const DEFAULT_ENV_NAME: &'static str = "CONDA_OVERRIDE_GLIBC";

    fn parse_version(value: &str) -> Result<Self, ParseVersionError> {
        Version::from_str(value).map(|version| Self {
            family: "glibc".into(),
            version,
        })
    }

    fn detect_from_host() -> Result<Option<Self>, DetectVirtualPackageError> {
        Ok(Self::current()?)
    }
}

/// `__cuda`: the maximum CUDA driver version supported by the host.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Deserialize)]
pub struct Cuda {
    /// The maximum supported CUDA version.
    pub version: Version,
}

impl Cuda {
    /// Returns the maximum CUDA version supported by the current platform, or `None` if no CUDA
    /// driver is installed.
    pub fn current() -> Option<Self> {
        cuda::cuda_version().map(|version| Self { version })
    }
}

impl EnvOverride for Cuda {
    const DEFAULT_ENV_NAME: &'static str = "CONDA_OVERRIDE_CUDA";

    fn parse_version(value: &str) -> Result<Self, ParseVersionError> {
        Version::from_str(value).map(|version| Self { version })
    }

    fn detect_from_host() -> Result<Option<Self>, DetectVirtualPackageError> {
        Ok(Self::current())
    }
}

impl From<Cuda> for GenericVirtualPackage {
    fn from(cuda: Cuda) -> Self {
        GenericVirtualPackage {
            name: rattler_conda_types::PackageName::new_unchecked("__cuda"),
            version: cuda.version,
            build_string: "0".into(),
        }
    }
}

impl From<Cuda> for VirtualPackage {
    fn from(cuda: Cuda) -> Self {
        VirtualPackage::Cuda(cuda)
    }
}

/// `__osx`: the host's macOS version.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Deserialize)]
pub struct Osx {
    /// The macOS version.
    pub version: Version,
}

impl Osx {
    /// Returns the macOS version of the current platform, or `None` if not running macOS.
    pub fn current() -> Result<Option<Self>, ParseOsxVersionError> {
        Ok(osx::osx_version()?.map(|version| Self { version }))
    }
}

impl From<Osx> for GenericVirtualPackage {
    fn from(osx: Osx) -> Self {
        GenericVirtualPackage {
            name: rattler_conda_types::PackageName::new_unchecked("__osx"),
            version: osx.version,
            build_string: "0".into(),
        }
    }
}

impl From<Osx> for VirtualPackage {
    fn from(osx: Osx) -> Self {
        VirtualPackage::Osx(osx)
    }
}

impl EnvOverride for Osx {
    const DEFAULT_ENV_NAME: &'static str = "CONDA_OVERRIDE_OSX";

    fn parse_version(value: &str) -> Result<Self, ParseVersionError> {
        Version::from_str(value).map(|version| Self { version })
    }

    fn detect_from_host() -> Result<Option<Self>, DetectVirtualPackageError> {
        Ok(Self::current()?)
    }
}

/// `__archspec`: the host's CPU microarchitecture.
#[derive(Clone, Debug)]
pub struct Archspec {
    /// The detected microarchitecture.
    pub spec: Arc<Microarchitecture>,
}

impl Serialize for Archspec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.spec.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Archspec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        let spec = Microarchitecture::known_targets()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Arc::new(Microarchitecture::generic(&name)));
        Ok(Self { spec })
    }
}

impl Hash for Archspec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.spec.name().hash(state);
    }
}

impl PartialEq for Archspec {
    fn eq(&self, other: &Self) -> bool {
        self.spec.name() == other.spec.name()
    }
}

impl Eq for Archspec {}

impl Archspec {
    /// Returns the current CPU's microarchitecture.
    pub fn current() -> Option<Self> {
        archspec::cpu::host().ok().map(|spec| Self { spec })
    }

    /// Returns the minimal microarchitecture a given [`Platform`] is known to support.
    #[allow(clippy::match_same_arms)]
    pub fn from_platform(platform: Platform) -> Option<Self> {
        let name = match platform {
            Platform::NoArch | Platform::Unknown => return None,
            Platform::EmscriptenWasm32 | Platform::WasiWasm32 => return None,
            Platform::Win32 | Platform::Linux32 => "x86",
            Platform::Win64 | Platform::Osx64 | Platform::Linux64 => "x86_64",
            Platform::LinuxAarch64 | Platform::LinuxArmV6l | Platform::LinuxArmV7l => "aarch64",
            Platform::LinuxPpc64le => "ppc64le",
            Platform::LinuxPpc64 => "ppc64",
            Platform::LinuxS390X => "s390x",
            Platform::LinuxRiscv32 => "riscv32",
            Platform::LinuxRiscv64 => "riscv64",
            Platform::ZosZ => return None,
            Platform::WinArm64 => "aarch64",
            Platform::OsxArm64 => "m1",
            _ => return None,
        };
        let spec = Microarchitecture::known_targets()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::new(Microarchitecture::generic(name)));
        Some(Self { spec })
    }
}

impl From<Archspec> for GenericVirtualPackage {
    fn from(archspec: Archspec) -> Self {
        GenericVirtualPackage {
            name: rattler_conda_types::PackageName::new_unchecked("__archspec"),
            version: Version::from_str("1").expect("\"1\" is always a valid version"),
            build_string: archspec.spec.name().into(),
        }
    }
}

impl From<Archspec> for VirtualPackage {
    fn from(archspec: Archspec) -> Self {
        VirtualPackage::Archspec(archspec)
    }
}

#[cfg(test)]
mod test {
    use std::{env, str::FromStr};

    use rattler_conda_types::Version;

    use crate::{Cuda, EnvOverride, LibC, Osx, Override, VirtualPackage, VirtualPackageOverrides};

    #[test]
    fn doesnt_crash() {
        let packages = VirtualPackage::detect(&VirtualPackageOverrides::default()).unwrap();
        println!("{packages:?}");
    }

    #[test]
    fn parse_libc() {
        let expected = LibC {
            version: Version::from_str("1.23").unwrap(),
            family: "glibc".into(),
        };
        let env_var_name = format!("{}_{}", LibC::DEFAULT_ENV_NAME, "test_parse_libc");
        env::set_var(&env_var_name, "1.23");
        assert_eq!(
            LibC::detect(Some(&Override::EnvVar(env_var_name.clone())))
                .unwrap()
                .unwrap(),
            expected
        );

        env::set_var(&env_var_name, "");
        assert_eq!(
            LibC::detect(Some(&Override::EnvVar(env_var_name.clone()))).unwrap(),
            None
        );

        env::remove_var(&env_var_name);
        assert_eq!(
            LibC::detect_with_fallback(&Override::DefaultEnvVar, || Ok(Some(expected.clone())))
                .unwrap()
                .unwrap(),
            expected
        );
        assert_eq!(
            LibC::detect_with_fallback(&Override::String("1.23".to_string()), || Ok(None))
                .unwrap()
                .unwrap(),
            expected
        );
    }

    #[test]
    fn parse_cuda() {
        let expected = Cuda {
            version: Version::from_str("11.4").unwrap(),
        };
        let env_var_name = format!("{}_{}", Cuda::DEFAULT_ENV_NAME, "test_parse_cuda");
        env::set_var(&env_var_name, "11.4");
        assert_eq!(
            Cuda::detect(Some(&Override::EnvVar(env_var_name.clone())))
                .unwrap()
                .unwrap(),
            expected
        );
        env::remove_var(&env_var_name);
        assert_eq!(
            Cuda::detect(Some(&Override::String("11.4".to_string())))
                .unwrap()
                .unwrap(),
            expected
        );
    }

    #[test]
    fn parse_osx() {
        let expected = Osx {
            version: Version::from_str("13.2").unwrap(),
        };
        let env_var_name = format!("{}_{}", Osx::DEFAULT_ENV_NAME, "test_parse_osx");
        env::set_var(&env_var_name, "13.2");
        assert_eq!(
            Osx::detect(Some(&Override::EnvVar(env_var_name.clone())))
                .unwrap()
                .unwrap(),
            expected
        );
        env::remove_var(&env_var_name);
    }

    #[test]
    fn glibc_is_overridden_env_var_wins_over_literal_default() {
        // Override::String always wins, bypassing the environment entirely.
        let v = Cuda::detect(Some(&Override::String("9.9".to_string())))
            .unwrap()
            .unwrap();
        assert_eq!(v.version, Version::from_str("9.9").unwrap());
    }
}
