//! Channel resolution: turning a user-supplied channel name, URL, or path into one or more
//! canonical [`Channel`]s.
//!
//! This module separates the *unresolved* input a user types (`conda-forge`, `./local-channel`,
//! `https://example.com/my-channel[linux-64]`, a direct package URL) from the *resolved* result
//! a [`ChannelResolver`] produces. The two are different shapes: an [`UnresolvedChannel`] is just
//! whatever the user wrote down, while a [`Channel`] carries everything downstream code needs
//! (a canonical base url, mirrors, platform filters) without any back-reference to the resolver
//! that produced it.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::utils::path::is_path;
use crate::utils::url::parse_scheme;
use file_url::directory_path_to_url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use typed_path::{Utf8NativePathBuf, Utf8TypedPath, Utf8TypedPathBuf};
use url::Url;

use super::{ParsePlatformError, Platform};

const DEFAULT_CHANNEL_ALIAS: &str = "https://conda.anaconda.org";

/// Archive suffixes that mark a channel location as a direct package reference rather than a
/// subdirectory of packages.
const ARCHIVE_SUFFIXES: &[&str] = &[".conda", ".tar.bz2"];

/// The kind of location an [`UnresolvedChannel`] points at.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum UnresolvedChannelKind {
    /// A named channel, e.g. `conda-forge`, resolved relative to a channel alias.
    Name,
    /// A full URL to a channel directory.
    Url,
    /// A filesystem path to a single package archive (`.conda`/`.tar.bz2`).
    PackagePath,
    /// A URL to a single package archive.
    PackageUrl,
    /// A filesystem path to a channel directory.
    Path,
}

/// A channel the way a user wrote it down: a location, an optional set of platform filters, and
/// the syntactic kind of the location. Resolving an [`UnresolvedChannel`] against a
/// [`ChannelResolver`] produces one or more [`Channel`]s.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UnresolvedChannel {
    /// The raw location: a channel name, a URL, or a filesystem path, depending on `kind`.
    pub location: String,
    /// Platform filters explicitly requested via a `[plat1,plat2]` suffix, if any.
    pub platform_filters: Option<Vec<Platform>>,
    /// The syntactic kind of `location`.
    pub kind: UnresolvedChannelKind,
}

impl UnresolvedChannel {
    /// Parses an [`UnresolvedChannel`] from a string, classifying its location without resolving
    /// it to a base URL yet.
    pub fn parse(str: impl AsRef<str>) -> Result<Self, ParseChannelError> {
        let str = str.as_ref();
        let (platform_filters, location) = parse_platforms(str)?;
        let is_archive = ARCHIVE_SUFFIXES.iter().any(|suffix| location.ends_with(suffix));

        let kind = if parse_scheme(location).is_some() {
            if is_archive {
                UnresolvedChannelKind::PackageUrl
            } else {
                UnresolvedChannelKind::Url
            }
        } else if is_path(location) {
            if is_archive {
                UnresolvedChannelKind::PackagePath
            } else {
                UnresolvedChannelKind::Path
            }
        } else {
            UnresolvedChannelKind::Name
        };

        Ok(Self {
            location: location.to_owned(),
            platform_filters,
            kind,
        })
    }
}

impl FromStr for UnresolvedChannel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for UnresolvedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.location)?;
        if let Some(platforms) = &self.platform_filters {
            write!(
                f,
                "[{}]",
                platforms
                    .iter()
                    .map(Platform::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            )?;
        }
        Ok(())
    }
}

impl Serialize for UnresolvedChannel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnresolvedChannel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UnresolvedChannel::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Describes properties required to resolve channel names and paths into canonical channel URLs,
/// plus the multi-channel and custom-channel overrides a `.condarc`-equivalent configuration
/// would provide.
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    /// A url prefixed to channel names that aren't themselves URLs or paths. Defaults to
    /// `https://conda.anaconda.org`.
    pub channel_alias: Url,
    /// The root directory relative paths are resolved against.
    pub root_dir: PathBuf,
    /// Names that expand to several member channels, e.g. `defaults`.
    pub multi_channels: std::collections::HashMap<String, Vec<String>>,
    /// Names that resolve to an explicit override channel rather than `channel_alias`-relative.
    pub custom_channels: std::collections::HashMap<String, Url>,
}

impl ChannelResolver {
    /// Creates a resolver with the default channel alias, no multi-channels, and no custom
    /// channel overrides.
    pub fn default_with_root_dir(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            channel_alias: Url::from_str(DEFAULT_CHANNEL_ALIAS)
                .expect("could not parse default channel alias"),
            multi_channels: std::collections::HashMap::new(),
            custom_channels: std::collections::HashMap::new(),
        }
    }

    /// Resolves a channel name, URL, or path into one or more canonical [`Channel`]s.
    ///
    /// Resolution rules, applied in order:
    /// 1. A package archive location (URL or path ending in `.conda`/`.tar.bz2`) resolves to a
    ///    single channel with no platform filters.
    /// 2. A name matching a configured multi-channel recursively resolves every member and
    ///    concatenates the results. `local` is always a multi-channel that resolves to a
    ///    file-url under `<root_dir>/conda-bld` even if not explicitly configured.
    /// 3. A name matching a configured custom channel resolves to that override.
    /// 4. Otherwise the location is resolved directly: a URL or path as-is, a bare name prefixed
    ///    with `channel_alias`. Platform filters default to `{current_platform, noarch}` unless
    ///    an explicit `[plat,…]` suffix was present.
    pub fn resolve(&self, name_or_url: impl AsRef<str>) -> Result<Vec<Channel>, ParseChannelError> {
        let unresolved = UnresolvedChannel::parse(name_or_url)?;
        self.resolve_unresolved(&unresolved)
    }

    fn resolve_unresolved(&self, unresolved: &UnresolvedChannel) -> Result<Vec<Channel>, ParseChannelError> {
        match unresolved.kind {
            UnresolvedChannelKind::PackagePath | UnresolvedChannelKind::PackageUrl => {
                Ok(vec![self.resolve_single(unresolved)?])
            }
            UnresolvedChannelKind::Name if unresolved.location == "local" => {
                self.resolve_local()
            }
            UnresolvedChannelKind::Name if self.multi_channels.contains_key(&unresolved.location) => {
                let members = self.multi_channels[&unresolved.location].clone();
                let mut channels = Vec::with_capacity(members.len());
                for member in members {
                    channels.extend(self.resolve(&member)?);
                }
                Ok(channels)
            }
            UnresolvedChannelKind::Name if self.custom_channels.contains_key(&unresolved.location) => {
                let base_url = self.custom_channels[&unresolved.location].clone();
                Ok(vec![Channel::from_url(base_url, unresolved.platform_filters.clone())])
            }
            _ => Ok(vec![self.resolve_single(unresolved)?]),
        }
    }

    fn resolve_local(&self) -> Result<Vec<Channel>, ParseChannelError> {
        let conda_bld = self.root_dir.join("conda-bld");
        let path = if conda_bld.exists() {
            conda_bld
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| self.root_dir.clone())
                .join("conda-bld")
        };
        let path_str = path.to_string_lossy().into_owned();
        let url = directory_path_to_url(Utf8TypedPath::from(path_str.as_str()))
            .map_err(|_err| ParseChannelError::InvalidPath("local".to_owned()))?;
        Ok(vec![Channel::from_url(url, None)])
    }

    fn resolve_single(&self, unresolved: &UnresolvedChannel) -> Result<Channel, ParseChannelError> {
        let channel = match unresolved.kind {
            UnresolvedChannelKind::Url | UnresolvedChannelKind::PackageUrl => {
                let url = Url::parse(&unresolved.location)?;
                Channel::from_url(url, unresolved.platform_filters.clone())
            }
            UnresolvedChannelKind::Path | UnresolvedChannelKind::PackagePath => {
                let absolute_path = absolute_path(&unresolved.location, &self.root_dir)?;
                let url = directory_path_to_url(absolute_path.to_path())
                    .map_err(|_err| ParseChannelError::InvalidPath(unresolved.location.clone()))?;
                Channel {
                    id: url.to_string(),
                    canonical_base_url: url,
                    display_name: unresolved.location.clone(),
                    mirror_urls: Vec::new(),
                    platform_filters: unresolved.platform_filters.clone().unwrap_or_default(),
                }
            }
            UnresolvedChannelKind::Name => {
                Channel::from_name(&unresolved.location, self, unresolved.platform_filters.clone())
            }
        };
        Ok(channel)
    }
}

/// A resolved channel: a canonical base URL plus everything needed to address it, independent of
/// whatever resolver produced it.
#[derive(Debug, Clone, Serialize, Eq, PartialEq, Hash)]
pub struct Channel {
    /// A stable identifier for this channel. Currently the canonical base url's string form.
    pub id: String,
    /// The canonical base URL of the channel; everything else is relative to this.
    pub canonical_base_url: Url,
    /// A human-readable name: the bare channel name for alias-relative channels, or the url
    /// itself otherwise. Credentials are never included here.
    pub display_name: String,
    /// Additional URLs that mirror the same channel content, tried in order if the canonical url
    /// is unreachable.
    pub mirror_urls: Vec<Url>,
    /// The platforms to fetch subdirs for. Empty means "use the caller's default platform set".
    pub platform_filters: Vec<Platform>,
}

impl Channel {
    /// Constructs a channel directly from a base URL and explicit platform filters.
    pub fn from_url(url: Url, platform_filters: Option<Vec<Platform>>) -> Self {
        let path = url.path().trim_end_matches('/');
        let base_url = if url.path().ends_with('/') {
            url.clone()
        } else {
            let mut url = url.clone();
            url.set_path(&format!("{path}/"));
            url
        };

        let display_name = if base_url.has_host() {
            let name = path.trim_start_matches('/');
            if name.is_empty() {
                base_url.as_str().trim_end_matches('/').to_owned()
            } else {
                name.to_owned()
            }
        } else {
            let name = path
                .rsplit_once('/')
                .map_or_else(|| base_url.path(), |(_, path_part)| path_part);
            if name.is_empty() {
                base_url.as_str().to_owned()
            } else {
                name.to_owned()
            }
        };

        Self {
            id: base_url.to_string(),
            canonical_base_url: base_url,
            display_name,
            mirror_urls: Vec::new(),
            platform_filters: platform_filters.unwrap_or_default(),
        }
    }

    /// Constructs a channel from a bare name, the resolver's channel alias, and explicit platform
    /// filters (falling back to the current platform + `noarch` when none were given).
    pub fn from_name(
        name: &str,
        resolver: &ChannelResolver,
        platform_filters: Option<Vec<Platform>>,
    ) -> Self {
        let dir_name = if name.ends_with('/') {
            Cow::Borrowed(name)
        } else {
            Cow::Owned(format!("{name}/"))
        };
        let base_url = resolver
            .channel_alias
            .join(dir_name.as_ref())
            .expect("name is not a valid url fragment");
        let name = name.trim_end_matches('/');

        Self {
            id: base_url.to_string(),
            display_name: name.to_owned(),
            canonical_base_url: base_url,
            mirror_urls: Vec::new(),
            platform_filters: platform_filters.unwrap_or_else(|| default_platforms().to_vec()),
        }
    }

    /// Returns the URLs of this channel's subdir for the given platform.
    pub fn platform_url(&self, platform: Platform) -> Url {
        self.canonical_base_url
            .join(&format!("{}/", platform.as_str()))
            .expect("platform is a valid url fragment")
    }

    /// Returns the platforms to fetch, falling back to `{current_platform, noarch}` when no
    /// explicit filters were set.
    pub fn platforms_or_default(&self) -> Cow<'_, [Platform]> {
        if self.platform_filters.is_empty() {
            Cow::Borrowed(default_platforms())
        } else {
            Cow::Borrowed(&self.platform_filters)
        }
    }
}

/// Error that can occur while parsing or resolving a channel.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ParseChannelError {
    /// Error when the platform filters could not be parsed.
    #[error("could not parse the platforms")]
    ParsePlatformError(#[source] ParsePlatformError),
    /// Error when the url could not be parsed.
    #[error("could not parse url")]
    ParseUrlError(#[source] url::ParseError),
    /// Error when the path is invalid.
    #[error("invalid path '{0}'")]
    InvalidPath(String),
    /// The root directory is not an absolute path.
    #[error("root directory from channel config is not an absolute path")]
    NonAbsoluteRootDir(PathBuf),
    /// The root directory is not UTF-8 encoded.
    #[error("root directory of channel config is not utf8 encoded")]
    NotUtf8RootDir(PathBuf),
}

impl From<ParsePlatformError> for ParseChannelError {
    fn from(err: ParsePlatformError) -> Self {
        ParseChannelError::ParsePlatformError(err)
    }
}

impl From<url::ParseError> for ParseChannelError {
    fn from(err: url::ParseError) -> Self {
        ParseChannelError::ParseUrlError(err)
    }
}

/// Extracts the platforms from the given human readable channel, returning the remaining
/// location string with the `[plat,…]` suffix stripped.
#[allow(clippy::type_complexity)]
fn parse_platforms(channel: &str) -> Result<(Option<Vec<Platform>>, &str), ParsePlatformError> {
    if channel.rfind(']').is_some() {
        if let Some(start_platform_idx) = channel.find('[') {
            let platform_part = &channel[start_platform_idx + 1..channel.len() - 1];
            let platforms = platform_part
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(FromStr::from_str)
                .collect::<Result<Vec<_>, _>>()?;
            let platforms = if platforms.is_empty() { None } else { Some(platforms) };
            return Ok((platforms, &channel[0..start_platform_idx]));
        }
    }
    Ok((None, channel))
}

/// The default platforms: the platform this binary was built for, plus `noarch`.
pub(crate) const fn default_platforms() -> &'static [Platform] {
    const CURRENT_PLATFORMS: [Platform; 2] = [Platform::current(), Platform::NoArch];
    &CURRENT_PLATFORMS
}

/// Resolves a path relative to `root_dir` into an absolute, normalized path.
fn absolute_path(path: &str, root_dir: &Path) -> Result<Utf8TypedPathBuf, ParseChannelError> {
    let path = Utf8TypedPath::from(path);
    if path.is_absolute() {
        return Ok(path.normalize());
    }

    let root_dir_str = root_dir
        .to_str()
        .ok_or_else(|| ParseChannelError::NotUtf8RootDir(root_dir.to_path_buf()))?;
    let native_root_dir = Utf8NativePathBuf::from(root_dir_str);

    if !native_root_dir.is_absolute() {
        return Err(ParseChannelError::NonAbsoluteRootDir(root_dir.to_path_buf()));
    }

    Ok(native_root_dir.to_typed_path().join(path).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_channel_serde_roundtrip() {
        let unresolved = UnresolvedChannel::parse("conda-forge[linux-64,noarch]").unwrap();
        let json = serde_json::to_string(&unresolved).unwrap();
        let parsed: UnresolvedChannel = serde_json::from_str(&json).unwrap();
        assert_eq!(unresolved, parsed);
    }

    #[test]
    fn test_parse_platforms() {
        assert_eq!(
            parse_platforms("[noarch, linux-64]"),
            Ok((Some(vec![Platform::NoArch, Platform::Linux64]), ""))
        );
        assert_eq!(
            parse_platforms("sometext[noarch]"),
            Ok((Some(vec![Platform::NoArch]), "sometext"))
        );
        assert_eq!(parse_platforms("sometext[]"), Ok((None, "sometext")));
    }

    #[test]
    fn test_unresolved_channel_kinds() {
        assert_eq!(
            UnresolvedChannel::parse("conda-forge").unwrap().kind,
            UnresolvedChannelKind::Name
        );
        assert_eq!(
            UnresolvedChannel::parse("https://example.com/my-channel")
                .unwrap()
                .kind,
            UnresolvedChannelKind::Url
        );
        assert_eq!(
            UnresolvedChannel::parse("https://example.com/numpy-1.0-0.conda")
                .unwrap()
                .kind,
            UnresolvedChannelKind::PackageUrl
        );
        assert_eq!(
            UnresolvedChannel::parse("./local-channel").unwrap().kind,
            UnresolvedChannelKind::Path
        );
        assert_eq!(
            UnresolvedChannel::parse("./numpy-1.0-0.tar.bz2")
                .unwrap()
                .kind,
            UnresolvedChannelKind::PackagePath
        );
    }

    #[test]
    fn test_unresolved_channel_platform_filters() {
        let unresolved = UnresolvedChannel::parse("conda-forge[linux-64,noarch]").unwrap();
        assert_eq!(unresolved.location, "conda-forge");
        assert_eq!(
            unresolved.platform_filters,
            Some(vec![Platform::Linux64, Platform::NoArch])
        );
    }

    #[test]
    fn test_resolve_named_channel() {
        let resolver = ChannelResolver::default_with_root_dir(PathBuf::from("/"));
        let channels = resolver.resolve("conda-forge").unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(
            channels[0].canonical_base_url.as_str(),
            "https://conda.anaconda.org/conda-forge/"
        );
        assert_eq!(channels[0].display_name, "conda-forge");
    }

    #[test]
    fn test_resolve_multi_channel() {
        let mut resolver = ChannelResolver::default_with_root_dir(PathBuf::from("/"));
        resolver.multi_channels.insert(
            "defaults".to_string(),
            vec!["main".to_string(), "r".to_string()],
        );
        let channels = resolver.resolve("defaults").unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].display_name, "main");
        assert_eq!(channels[1].display_name, "r");
    }

    #[test]
    fn test_resolve_custom_channel() {
        let mut resolver = ChannelResolver::default_with_root_dir(PathBuf::from("/"));
        resolver.custom_channels.insert(
            "internal".to_string(),
            Url::parse("https://internal.example.com/channels/internal").unwrap(),
        );
        let channels = resolver.resolve("internal").unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(
            channels[0].canonical_base_url.as_str(),
            "https://internal.example.com/channels/internal/"
        );
    }

    #[test]
    fn test_resolve_idempotence() {
        let resolver = ChannelResolver::default_with_root_dir(PathBuf::from("/"));
        let first = resolver.resolve("conda-forge").unwrap();
        let second = resolver
            .resolve(first[0].canonical_base_url.as_str())
            .unwrap();
        assert_eq!(first[0].canonical_base_url, second[0].canonical_base_url);
    }

    #[test]
    fn test_absolute_path() {
        let current_dir = std::env::current_dir().expect("no current dir?");
        let native_current_dir = typed_path::utils::utf8_current_dir()
            .expect("")
            .to_typed_path_buf();
        assert_eq!(
            absolute_path(".", &current_dir).as_ref(),
            Ok(&native_current_dir)
        );
        assert_eq!(
            absolute_path("foo", &current_dir).as_ref(),
            Ok(&native_current_dir.join("foo"))
        );
    }
}
