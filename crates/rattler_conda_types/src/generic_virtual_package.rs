use crate::{PackageName, Version};

/// A type-erased virtual package description: just a `name`, `version`, and `build_string`, with
/// none of the detection logic that produced them. [`rattler_virtual_packages`] converts its
/// richly-typed `VirtualPackage` variants into this shape before they're inserted into a package
/// database as synthetic installed records.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct GenericVirtualPackage {
    /// The name of the virtual package, e.g. `__glibc`.
    pub name: PackageName,

    /// The detected version.
    pub version: Version,

    /// The build string, most commonly just `"0"`.
    pub build_string: String,
}
