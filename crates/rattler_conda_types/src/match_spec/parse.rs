//! Parsing support for [`super::MatchSpec`].
//!
//! Implements the deterministic pre-rewrite pipeline real-world MatchSpec strings require:
//! trim/reject-empty, collapse `"<op> "` spacing, expand `~=`, split off a `channel::` prefix,
//! scan a trailing bracketed attribute section, and finally split the bare `name version build`
//! remainder. Each step is a plain function so the pipeline reads top to bottom.

use std::collections::BTreeSet;
use std::str::FromStr;

use rattler_digest::{parse_digest_from_hex, Md5, Sha256};
use thiserror::Error;

use super::{
    matcher::{StringMatcher, StringMatcherParseError},
    package_name_matcher::{PackageNameMatcher, PackageNameMatcherParseError},
    MatchSpec,
};
use crate::build_spec::{BuildNumberSpec, ParseBuildNumberSpecError};
use crate::channel::{ParseChannelError, UnresolvedChannel};
use crate::version_spec::{ParseVersionSpecError, VersionSpec};

/// The relational operators that require `"<op> "` (a space right after the operator) to be
/// collapsed back to `"<op>"` before tokenizing, and that may not precede a bare, unquoted
/// version string (they're ambiguous with the `name version build` split).
const AMBIGUOUS_OPERATORS: &[&str] = &["==", "!=", "~=", ">=", "<=", ">", "<"];

/// Error parsing a [`MatchSpec`] from its string representation.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ParseMatchSpecError {
    /// The input was empty after trimming.
    #[error("empty match spec")]
    Empty,
    /// A version-like operator appeared right before the `name version build` remainder without
    /// being wrapped in a quoted `version=` attribute.
    #[error("ambiguous operator '{0}' in unquoted version position; use version='{0}...'")]
    AmbiguousOperator(String),
    /// The bracketed attribute section has unbalanced brackets or quotes.
    #[error("unbalanced brackets in attribute section")]
    UnbalancedBrackets,
    /// The package name could not be parsed.
    #[error("invalid package name: {0}")]
    InvalidName(#[source] PackageNameMatcherParseError),
    /// The version spec could not be parsed.
    #[error("invalid version spec: {0}")]
    InvalidVersion(#[source] ParseVersionSpecError),
    /// The build string matcher could not be parsed.
    #[error("invalid build string: {0}")]
    InvalidBuildString(#[source] StringMatcherParseError),
    /// The build number spec could not be parsed.
    #[error("invalid build number: {0}")]
    InvalidBuildNumber(#[source] ParseBuildNumberSpecError),
    /// The channel location could not be parsed.
    #[error("invalid channel: {0}")]
    InvalidChannel(#[source] ParseChannelError),
    /// An `md5=`/`sha256=` attribute was not a valid hex digest.
    #[error("invalid hash digest for key '{0}'")]
    InvalidHash(String),
    /// A `url=` attribute was not a valid url.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FromStr for MatchSpec {
    type Err = ParseMatchSpecError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // Step 1: trim, reject empty.
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseMatchSpecError::Empty);
        }

        // Step 2: collapse "<op> " to "<op>".
        let collapsed = collapse_operator_spacing(trimmed);

        // Step 3: expand `~=X.Y` into `>=X.Y,X.Y.*` wherever it appears as a bare version atom.
        // This is also handled structurally by `VersionSpec`'s own parser (see version_spec::parse),
        // so MatchSpec only needs to worry about `~=` appearing inside a quoted `version=` attribute,
        // which is passed through untouched to `VersionSpec::from_str`.

        // Step 5: split off a leading `channel(/subdir)::namespace:spec` or `channel::spec` prefix.
        let (channel, subdir, namespace, rest) = split_channel_prefix(&collapsed)?;

        // Step 6: scan for a trailing bracketed attribute section.
        let (rest, attrs) = split_attribute_section(rest)?;

        // Step 7/8: split `name version build`, rejecting ambiguous bare operators.
        let (name, version, build_string) = split_name_version_build(rest.trim())?;

        let mut spec = MatchSpec {
            name: PackageNameMatcher::from_str(name).map_err(ParseMatchSpecError::InvalidName)?,
            version: version
                .map(|v| VersionSpec::from_str(v).map_err(ParseMatchSpecError::InvalidVersion))
                .transpose()?,
            build_string: build_string
                .map(|b| StringMatcher::from_str(b).map_err(ParseMatchSpecError::InvalidBuildString))
                .transpose()?,
            build_number: None,
            channel,
            subdir,
            namespace,
            filename: None,
            url: None,
            md5: None,
            sha256: None,
            license: None,
            license_family: None,
            features: None,
            track_features: None,
            subdirs: None,
            optional: false,
        };

        for (key, value) in attrs {
            apply_attribute(&mut spec, &key, &value)?;
        }

        Ok(spec)
    }
}

/// Collapses `"<op> "` down to `"<op>"` for every operator in [`AMBIGUOUS_OPERATORS`] plus `=`.
fn collapse_operator_spacing(input: &str) -> String {
    let mut ops: Vec<&str> = AMBIGUOUS_OPERATORS.to_vec();
    ops.push("=");
    // Longest first so `>=` is matched before `>`.
    ops.sort_by_key(|op| std::cmp::Reverse(op.len()));

    let mut result = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    'outer: while let Some((idx, _)) = chars.peek().copied() {
        for op in &ops {
            if input[idx..].starts_with(op) {
                result.push_str(op);
                for _ in 0..op.chars().count() {
                    chars.next();
                }
                while chars.peek().is_some_and(|(_, c)| *c == ' ') {
                    chars.next();
                }
                continue 'outer;
            }
        }
        let (_, c) = chars.next().unwrap();
        result.push(c);
    }
    result
}

/// Splits a leading `channel(/subdir)::namespace:rest` or `channel::rest` prefix off. Either
/// prefix is optional; a bare `name` has neither.
#[allow(clippy::type_complexity)]
fn split_channel_prefix(
    input: &str,
) -> Result<(Option<UnresolvedChannel>, Option<String>, Option<String>, &str), ParseMatchSpecError> {
    let Some(sep) = input.find("::") else {
        return Ok((None, None, None, input));
    };

    let channel_part = &input[..sep];
    let mut rest = &input[sep + 2..];

    let (channel_part, subdir) = match channel_part.rsplit_once('/') {
        Some((channel, subdir)) if !channel.is_empty() && !subdir.contains(['[', ']']) => {
            (channel, Some(subdir.to_owned()))
        }
        _ => (channel_part, None),
    };

    let channel =
        Some(UnresolvedChannel::parse(channel_part).map_err(ParseMatchSpecError::InvalidChannel)?);

    // An optional `:namespace:` immediately following `channel::`.
    let namespace = if let Some(stripped) = rest.strip_prefix(':') {
        if let Some(end) = stripped.find(':') {
            let ns = &stripped[..end];
            rest = &stripped[end + 1..];
            Some(ns.to_owned())
        } else {
            None
        }
    } else {
        None
    };

    Ok((channel, subdir, namespace, rest))
}

/// Scans the remainder from the right for a bracketed `[k=v, k=v, …]` section, honoring nested
/// parentheses and single/double quotes inside values. Returns the remainder with the section
/// stripped, plus the parsed `(key, value)` pairs in source order.
fn split_attribute_section(
    input: &str,
) -> Result<(&str, Vec<(String, String)>), ParseMatchSpecError> {
    let trimmed = input.trim_end();
    if !trimmed.ends_with(']') {
        return Ok((trimmed, Vec::new()));
    }

    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = None;
    for (idx, c) in trimmed.char_indices().rev() {
        match quote {
            Some(q) if c != q => continue,
            Some(_) => {
                quote = None;
                continue;
            }
            None => {}
        }
        match c {
            '\'' | '"' => quote = Some(c),
            ']' => depth += 1,
            '[' => {
                depth -= 1;
                if depth == 0 {
                    start = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }

    let Some(start) = start else {
        return Err(ParseMatchSpecError::UnbalancedBrackets);
    };

    let body = &trimmed[start + 1..trimmed.len() - 1];
    let pairs = parse_attribute_pairs(body)?;
    Ok((&trimmed[..start], pairs))
}

/// Parses `k=v, k="v, with, commas", k='v'` into pairs, splitting on top-level commas only (a
/// comma inside a quoted value doesn't separate pairs).
fn parse_attribute_pairs(body: &str) -> Result<Vec<(String, String)>, ParseMatchSpecError> {
    let mut pairs = Vec::new();
    let mut quote: Option<char> = None;
    let mut current = String::new();
    let mut parts = Vec::new();

    for c in body.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == ',' => {
                parts.push(std::mem::take(&mut current));
            }
            None => current.push(c),
        }
    }
    if quote.is_some() {
        return Err(ParseMatchSpecError::UnbalancedBrackets);
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }

    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once('=') else {
            // A bare key (e.g. `optional`) with no value.
            pairs.push((part.to_owned(), String::new()));
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
            .unwrap_or(value);
        pairs.push((key.trim().to_owned(), value.to_owned()));
    }

    Ok(pairs)
}

/// Splits `name version build` from the already-channel/attribute-stripped remainder. The last
/// unquoted `=` not preceded by a relational operator separates version from build string;
/// whitespace can also serve as the separator.
#[allow(clippy::type_complexity)]
fn split_name_version_build(
    input: &str,
) -> Result<(&str, Option<&str>, Option<&str>), ParseMatchSpecError> {
    if input.is_empty() || input == "*" {
        return Ok(("*", None, None));
    }

    let mut parts = input.splitn(3, char::is_whitespace);
    let name = parts.next().unwrap_or(input).trim();
    let rest: Vec<&str> = parts.collect();

    let (version, build) = match rest.len() {
        0 => (None, None),
        1 => (Some(rest[0]), None),
        _ => (Some(rest[0]), Some(rest[1].trim())),
    };

    // A relational operator glued directly onto the name with no separating whitespace (e.g.
    // `foo>=1.0`, which whitespace-splitting alone would swallow whole into `name`) is ambiguous
    // per the grammar; the space-separated form or a quoted `version='>=1.0'` attribute must be
    // used instead.
    for op in AMBIGUOUS_OPERATORS {
        if name != "*" && name.contains(op) {
            return Err(ParseMatchSpecError::AmbiguousOperator((*op).to_string()));
        }
    }

    Ok((name, version, build))
}

fn apply_attribute(
    spec: &mut MatchSpec,
    key: &str,
    value: &str,
) -> Result<(), ParseMatchSpecError> {
    match key {
        "version" => {
            spec.version = Some(VersionSpec::from_str(value).map_err(ParseMatchSpecError::InvalidVersion)?);
        }
        "build" | "build_string" => {
            spec.build_string =
                Some(StringMatcher::from_str(value).map_err(ParseMatchSpecError::InvalidBuildString)?);
        }
        "build_number" => {
            spec.build_number =
                Some(BuildNumberSpec::from_str(value).map_err(ParseMatchSpecError::InvalidBuildNumber)?);
        }
        "channel" => {
            spec.channel = Some(UnresolvedChannel::parse(value).map_err(ParseMatchSpecError::InvalidChannel)?);
        }
        "subdir" => spec.subdir = Some(value.to_owned()),
        "fn" | "filename" => spec.filename = Some(value.to_owned()),
        "url" => {
            spec.url = Some(url::Url::parse(value).map_err(|_| ParseMatchSpecError::InvalidUrl(value.to_owned()))?);
        }
        "md5" => {
            spec.md5 = Some(
                parse_digest_from_hex::<Md5>(value)
                    .ok_or_else(|| ParseMatchSpecError::InvalidHash("md5".to_owned()))?,
            );
        }
        "sha256" => {
            spec.sha256 = Some(
                parse_digest_from_hex::<Sha256>(value)
                    .ok_or_else(|| ParseMatchSpecError::InvalidHash("sha256".to_owned()))?,
            );
        }
        "license" => spec.license = Some(value.to_owned()),
        "license_family" => spec.license_family = Some(value.to_owned()),
        "features" => {
            spec.features = Some(
                value
                    .split([',', ' '])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }
        "track_features" => {
            spec.track_features = Some(
                value
                    .split([',', ' '])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<BTreeSet<_>>(),
            );
        }
        "subdirs" => {
            spec.subdirs = Some(
                value
                    .split([',', ' '])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<BTreeSet<_>>(),
            );
        }
        "optional" => spec.optional = true,
        // Unknown keys are ignored, not rejected.
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PackageName;

    #[test]
    fn test_parse_bare_name() {
        let spec: MatchSpec = "numpy".parse().unwrap();
        assert_eq!(spec.name, PackageNameMatcher::Exact(PackageName::new_unchecked("numpy")));
        assert!(spec.version.is_none());
    }

    #[test]
    fn test_parse_name_version_build() {
        let spec: MatchSpec = "foo >=1.0.0 py37_0".parse().unwrap();
        assert_eq!(spec.name, PackageNameMatcher::Exact(PackageName::new_unchecked("foo")));
        assert_eq!(spec.version, Some(VersionSpec::from_str(">=1.0.0").unwrap()));
        assert_eq!(spec.build_string, Some(StringMatcher::from_str("py37_0").unwrap()));
    }

    #[test]
    fn test_parse_channel_and_subdir() {
        let spec: MatchSpec = "conda-forge/linux-64::foo >=1.0".parse().unwrap();
        assert_eq!(spec.channel.unwrap().location, "conda-forge");
        assert_eq!(spec.subdir.as_deref(), Some("linux-64"));
        assert_eq!(spec.version, Some(VersionSpec::from_str(">=1.0").unwrap()));
    }

    #[test]
    fn test_parse_bracket_attributes() {
        let spec: MatchSpec =
            "conda-forge::numpy[version='>=1.20,<2', build=py*]".parse().unwrap();
        assert_eq!(spec.name, PackageNameMatcher::Exact(PackageName::new_unchecked("numpy")));
        assert_eq!(spec.channel.unwrap().location, "conda-forge");
        assert_eq!(
            spec.version,
            Some(VersionSpec::from_str(">=1.20,<2").unwrap())
        );
        assert_eq!(spec.build_string, Some(StringMatcher::from_str("py*").unwrap()));
    }

    #[test]
    fn test_bracket_overrides_positional() {
        let spec: MatchSpec = "foo[version='>=2.0']".parse().unwrap();
        assert_eq!(spec.version, Some(VersionSpec::from_str(">=2.0").unwrap()));
    }

    #[test]
    fn test_operator_spacing_collapsed() {
        let a: MatchSpec = "foo >= 1.0".parse().unwrap();
        let b: MatchSpec = "foo >=1.0".parse().unwrap();
        assert_eq!(a.version, b.version);
    }

    #[test]
    fn test_optional_flag() {
        let spec: MatchSpec = "foo[optional]".parse().unwrap();
        assert!(spec.optional);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!("".parse::<MatchSpec>(), Err(ParseMatchSpecError::Empty));
        assert_eq!("   ".parse::<MatchSpec>(), Err(ParseMatchSpecError::Empty));
    }

    #[test]
    fn test_hash_only_spec() {
        let spec: MatchSpec =
            "*[sha256=01ba4719c80b6fe911b091a7c05124b64eeece964e09c058ef8f9805daca546b]"
                .parse()
                .unwrap();
        assert!(spec.sha256.is_some());
    }
}
