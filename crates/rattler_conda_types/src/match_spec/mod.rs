//! Query language for conda packages.
use crate::{build_spec::BuildNumberSpec, PackageName, PackageRecord, UnresolvedChannel};
use itertools::Itertools;
use rattler_digest::{serde::SerializableHash, Md5Hash, Sha256Hash};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, skip_serializing_none};
use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use url::Url;

/// Match a given string either by exact match, glob, or regex.
pub mod matcher;
/// Match package names either by exact match, glob, or regex.
pub mod package_name_matcher;
/// Parse a match spec from a string.
pub mod parse;

use matcher::StringMatcher;
use package_name_matcher::PackageNameMatcher;

/// A [`MatchSpec`] is a query over the fields of a [`PackageRecord`]. Any field left unset is a
/// wildcard match. The name is the only field that's always required.
///
/// The canonical string representation is
///
/// `channel(/subdir)::name version build [key=value, …]`
///
/// where parentheses mark optional parts. Parsing accepts several looser historical forms (see
/// [`parse`]); `to_string`/[`MatchSpec::conda_build_form`] always produces the canonical form.
#[skip_serializing_none]
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct MatchSpec {
    /// The name of the package.
    pub name: PackageNameMatcher,
    /// The version spec of the package (e.g. `1.2.3`, `>=1.2.3`, `1.2.*`).
    pub version: Option<crate::VersionSpec>,
    /// The build string of the package (e.g. `py37_0`, `py*`).
    pub build_string: Option<StringMatcher>,
    /// The build number of the package.
    pub build_number: Option<BuildNumberSpec>,
    /// The channel this package should come from. Unresolved: resolving it to a canonical
    /// [`crate::Channel`] is the responsibility of a [`crate::ChannelResolver`].
    pub channel: Option<UnresolvedChannel>,
    /// The subdir of the channel, e.g. `linux-64`.
    pub subdir: Option<String>,
    /// The namespace of the package (currently unused, reserved for a future feature).
    pub namespace: Option<String>,
    /// Match the specific filename of the package.
    pub filename: Option<String>,
    /// Match the specific package url.
    pub url: Option<Url>,
    /// The md5 hash of the package.
    #[serde_as(as = "Option<SerializableHash::<rattler_digest::Md5>>")]
    pub md5: Option<Md5Hash>,
    /// The sha256 hash of the package.
    #[serde_as(as = "Option<SerializableHash::<rattler_digest::Sha256>>")]
    pub sha256: Option<Sha256Hash>,
    /// The license of the package.
    pub license: Option<String>,
    /// The license family of the package.
    pub license_family: Option<String>,
    /// Optional features the package must provide.
    pub features: Option<Vec<String>>,
    /// Track features the package must have, as a set (order and duplicates don't matter).
    pub track_features: Option<BTreeSet<String>>,
    /// The set of subdirs this spec is allowed to resolve against; distinct from `subdir`, which
    /// pins a single one.
    pub subdirs: Option<BTreeSet<String>>,
    /// Whether this is an optional dependency: it constrains versions if present but does not
    /// require the package to be installed.
    pub optional: bool,
}

impl MatchSpec {
    /// Decomposes this instance into a name and a [`NamelessMatchSpec`].
    pub fn into_nameless(self) -> (PackageNameMatcher, NamelessMatchSpec) {
        (
            self.name,
            NamelessMatchSpec {
                version: self.version,
                build_string: self.build_string,
                build_number: self.build_number,
                channel: self.channel,
                subdir: self.subdir,
                namespace: self.namespace,
                filename: self.filename,
                url: self.url,
                md5: self.md5,
                sha256: self.sha256,
                license: self.license,
                license_family: self.license_family,
                features: self.features,
                track_features: self.track_features,
                subdirs: self.subdirs,
                optional: self.optional,
            },
        )
    }

    /// Constructs a [`MatchSpec`] from a [`NamelessMatchSpec`] and a name.
    pub fn from_nameless(spec: NamelessMatchSpec, name: PackageNameMatcher) -> Self {
        Self {
            name,
            version: spec.version,
            build_string: spec.build_string,
            build_number: spec.build_number,
            channel: spec.channel,
            subdir: spec.subdir,
            namespace: spec.namespace,
            filename: spec.filename,
            url: spec.url,
            md5: spec.md5,
            sha256: spec.sha256,
            license: spec.license,
            license_family: spec.license_family,
            features: spec.features,
            track_features: spec.track_features,
            subdirs: spec.subdirs,
            optional: spec.optional,
        }
    }

    /// Returns whether this spec names a virtual package (a package name starting with `__`).
    /// A spec that isn't an exact name match is never considered virtual.
    pub fn is_virtual(&self) -> bool {
        match &self.name {
            PackageNameMatcher::Exact(name) => name.as_normalized().starts_with("__"),
            _ => false,
        }
    }

    /// The canonical string form used for round-tripping into history entries and for the
    /// MatchSpec-identity property: every field that's set is rendered, `channel` as its
    /// canonical name/url, `version`/`build_string` following the rules in [`Display`].
    pub fn conda_build_form(&self) -> String {
        self.to_string()
    }
}

impl Display for MatchSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(channel) = &self.channel {
            write!(f, "{}", channel.location)?;
            if let Some(subdir) = &self.subdir {
                write!(f, "/{subdir}")?;
            }
            write!(f, "::")?;
        } else if let Some(namespace) = &self.namespace {
            write!(f, ":{namespace}:")?;
        }

        write!(f, "{}", self.name)?;

        if let Some(version) = &self.version {
            write!(f, " {version}")?;
        }

        if let Some(build) = &self.build_string {
            write!(f, " {build}")?;
        }

        let mut keys = Vec::new();

        if self.channel.is_none() {
            if let Some(subdir) = &self.subdir {
                keys.push(format!("subdir=\"{subdir}\""));
            }
        }
        if let Some(build_number) = &self.build_number {
            keys.push(format!("build_number=\"{build_number}\""));
        }
        if let Some(filename) = &self.filename {
            keys.push(format!("fn=\"{filename}\""));
        }
        if let Some(url) = &self.url {
            keys.push(format!("url=\"{url}\""));
        }
        if let Some(md5) = &self.md5 {
            keys.push(format!("md5=\"{md5:x}\""));
        }
        if let Some(sha256) = &self.sha256 {
            keys.push(format!("sha256=\"{sha256:x}\""));
        }
        if let Some(license) = &self.license {
            keys.push(format!("license=\"{license}\""));
        }
        if let Some(license_family) = &self.license_family {
            keys.push(format!("license_family=\"{license_family}\""));
        }
        if let Some(features) = &self.features {
            keys.push(format!("features=\"{}\"", features.iter().format(" ")));
        }
        if let Some(track_features) = &self.track_features {
            keys.push(format!(
                "track_features=\"{}\"",
                track_features.iter().format(" ")
            ));
        }
        if self.optional {
            keys.push("optional".to_string());
        }

        if !keys.is_empty() {
            write!(f, "[{}]", keys.join(", "))?;
        }

        Ok(())
    }
}

impl From<PackageName> for MatchSpec {
    fn from(value: PackageName) -> Self {
        let (name, nameless) = (PackageNameMatcher::Exact(value), NamelessMatchSpec::default());
        Self {
            name,
            version: nameless.version,
            build_string: nameless.build_string,
            build_number: nameless.build_number,
            channel: nameless.channel,
            subdir: nameless.subdir,
            namespace: nameless.namespace,
            filename: nameless.filename,
            url: nameless.url,
            md5: nameless.md5,
            sha256: nameless.sha256,
            license: nameless.license,
            license_family: nameless.license_family,
            features: nameless.features,
            track_features: nameless.track_features,
            subdirs: nameless.subdirs,
            optional: nameless.optional,
        }
    }
}

/// Like [`MatchSpec`] but without the package name, for places where the name is already known
/// (e.g. a dependency map keyed by name).
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct NamelessMatchSpec {
    /// The version spec of the package.
    pub version: Option<crate::VersionSpec>,
    /// The build string of the package.
    pub build_string: Option<StringMatcher>,
    /// The build number of the package.
    pub build_number: Option<BuildNumberSpec>,
    /// The channel this package should come from.
    pub channel: Option<UnresolvedChannel>,
    /// The subdir of the channel.
    pub subdir: Option<String>,
    /// The namespace of the package (currently unused).
    pub namespace: Option<String>,
    /// Match the specific filename of the package.
    pub filename: Option<String>,
    /// Match the specific package url.
    pub url: Option<Url>,
    /// The md5 hash of the package.
    #[serde_as(as = "Option<SerializableHash::<rattler_digest::Md5>>")]
    pub md5: Option<Md5Hash>,
    /// The sha256 hash of the package.
    #[serde_as(as = "Option<SerializableHash::<rattler_digest::Sha256>>")]
    pub sha256: Option<Sha256Hash>,
    /// The license of the package.
    pub license: Option<String>,
    /// The license family of the package.
    pub license_family: Option<String>,
    /// Optional features the package must provide.
    pub features: Option<Vec<String>>,
    /// Track features the package must have.
    pub track_features: Option<BTreeSet<String>>,
    /// The set of subdirs this spec is allowed to resolve against.
    pub subdirs: Option<BTreeSet<String>>,
    /// Whether this is an optional dependency.
    pub optional: bool,
}

impl From<MatchSpec> for NamelessMatchSpec {
    fn from(spec: MatchSpec) -> Self {
        Self {
            version: spec.version,
            build_string: spec.build_string,
            build_number: spec.build_number,
            channel: spec.channel,
            subdir: spec.subdir,
            namespace: spec.namespace,
            filename: spec.filename,
            url: spec.url,
            md5: spec.md5,
            sha256: spec.sha256,
            license: spec.license,
            license_family: spec.license_family,
            features: spec.features,
            track_features: spec.track_features,
            subdirs: spec.subdirs,
            optional: spec.optional,
        }
    }
}

/// A trait for matching a spec against a record.
pub trait Matches<T> {
    /// Returns whether `other` satisfies every field set on `self`.
    fn matches(&self, other: &T) -> bool;
}

impl Matches<PackageRecord> for NamelessMatchSpec {
    fn matches(&self, other: &PackageRecord) -> bool {
        nameless_matches_except_channel(self, other)
    }
}

impl Matches<PackageRecord> for MatchSpec {
    /// Matches every field, including `channel`/`subdir` against `other`'s channel id / subdir.
    fn matches(&self, other: &PackageRecord) -> bool {
        if !self.name.matches(&other.name) {
            return false;
        }
        self.matches_except_channel(other)
    }
}

impl MatchSpec {
    /// Matches every field except `channel`, as used by the solver-facing database filter that
    /// is intentionally channel-agnostic.
    pub fn matches_except_channel(&self, other: &PackageRecord) -> bool {
        if !self.name.matches(&other.name) {
            return false;
        }
        nameless_matches_except_channel(
            &NamelessMatchSpec {
                version: self.version.clone(),
                build_string: self.build_string.clone(),
                build_number: self.build_number.clone(),
                channel: None,
                subdir: self.subdir.clone(),
                namespace: self.namespace.clone(),
                filename: self.filename.clone(),
                url: self.url.clone(),
                md5: self.md5,
                sha256: self.sha256,
                license: self.license.clone(),
                license_family: self.license_family.clone(),
                features: self.features.clone(),
                track_features: self.track_features.clone(),
                subdirs: self.subdirs.clone(),
                optional: self.optional,
            },
            other,
        )
    }
}

fn nameless_matches_except_channel(spec: &NamelessMatchSpec, other: &PackageRecord) -> bool {
    if let Some(version) = spec.version.as_ref() {
        if !version.matches(&other.version) {
            return false;
        }
    }
    if let Some(build_string) = spec.build_string.as_ref() {
        if !build_string.matches(&other.build) {
            return false;
        }
    }
    if let Some(build_number) = spec.build_number.as_ref() {
        if !build_number.matches(&other.build_number) {
            return false;
        }
    }
    if let Some(filename) = spec.filename.as_ref() {
        if filename != &other.filename {
            return false;
        }
    }
    if let Some(md5) = spec.md5.as_ref() {
        if Some(md5) != other.md5.as_ref() {
            return false;
        }
    }
    if let Some(sha256) = spec.sha256.as_ref() {
        if Some(sha256) != other.sha256.as_ref() {
            return false;
        }
    }
    if let Some(license) = spec.license.as_ref() {
        if Some(license) != other.license.as_ref() {
            return false;
        }
    }
    if let Some(track_features) = spec.track_features.as_ref() {
        if !track_features
            .iter()
            .all(|feature| other.track_features.contains(feature))
        {
            return false;
        }
    }
    if let Some(subdirs) = spec.subdirs.as_ref() {
        if let Some(subdir) = spec.subdir.as_ref() {
            if !subdirs.contains(subdir) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_into_nameless_roundtrip() {
        let spec = MatchSpec::from_str("foo >=1.0.0 py37_0").unwrap();
        let (name, nameless) = spec.clone().into_nameless();
        let rebuilt = MatchSpec::from_nameless(nameless, name);
        assert_eq!(spec, rebuilt);
    }

    #[test]
    fn test_is_virtual() {
        let spec = MatchSpec::from_str("__cuda>=11").unwrap();
        assert!(spec.is_virtual());
        let spec = MatchSpec::from_str("numpy").unwrap();
        assert!(!spec.is_virtual());
    }

    #[test]
    fn test_display_roundtrip() {
        let spec = MatchSpec::from_str("conda-forge::numpy[version='>=1.20,<2', build=py*]").unwrap();
        assert_eq!(spec.name, PackageNameMatcher::Exact(PackageName::new_unchecked("numpy")));
        assert_eq!(
            spec.channel.as_ref().map(|c| c.location.as_str()),
            Some("conda-forge")
        );
        assert_eq!(
            spec.version,
            Some(crate::VersionSpec::from_str(">=1.20,<2").unwrap())
        );
        assert_eq!(spec.build_string, Some(StringMatcher::from_str("py*").unwrap()));
    }
}
