#![deny(missing_docs)]
//! `rattler_conda_types` contains the core data model shared by every other crate in this
//! workspace: versions and match specs, channels, repodata records, and the on-disk prefix and
//! history formats. The crate itself performs no I/O beyond simple file reads; it parses and
//! represents, it doesn't fetch or solve.

mod build_spec;
mod channel;
mod environment_yaml;
mod generic_virtual_package;
mod history;
mod match_spec;
mod no_arch_type;
mod package_name;
mod platform;
mod prefix;
mod prefix_data;
mod prefix_record;
mod repo_data;
mod repo_data_record;
mod utils;
mod version;
pub mod version_spec;

pub use build_spec::{BuildNumber, BuildNumberSpec, ParseBuildNumberSpecError};
pub use channel::{
    Channel, ChannelResolver, ParseChannelError, UnresolvedChannel, UnresolvedChannelKind,
};
pub use environment_yaml::{EnvironmentYaml, MatchSpecOrSubSection};
pub use generic_virtual_package::GenericVirtualPackage;
pub use history::{History, HistoryError, HistoryRevision, HistoryWriter, ParsedHistory, Revision, UserRequest};
pub use match_spec::{
    matcher::{StringMatcher, StringMatcherParseError},
    package_name_matcher::{IntoPackageNameError, PackageNameMatcher, PackageNameMatcherParseError},
    parse::ParseMatchSpecError,
    MatchSpec, Matches, NamelessMatchSpec,
};
pub use no_arch_type::{NoArchKind, NoArchType};
pub use package_name::{InvalidPackageNameError, PackageName};
pub use platform::{Arch, ParseArchError, ParsePlatformError, Platform};
pub use prefix::Prefix;
pub use prefix_data::{PrefixData, PrefixDataError};
pub use prefix_record::{PathType, PathsEntry, PrefixPaths, PrefixRecord};
pub use repo_data::{compute_package_url, ChannelInfo, PackageRecord, RepoData, RepoDataError};
pub use repo_data_record::RepoDataRecord;
pub use utils::TimestampMs;
pub use version::{ParseVersionError, ParseVersionErrorKind, Version, VersionBumpError};
pub use version_spec::{ParseVersionSpecError, ParseVersionSpecErrorKind, VersionSpec};
