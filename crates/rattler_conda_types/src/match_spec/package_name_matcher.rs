use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{InvalidPackageNameError, PackageName};

/// Matches a package name either by exact match, glob, or regex (the `name` field of a
/// [`super::MatchSpec`]).
#[derive(Debug, Clone)]
pub enum PackageNameMatcher {
    /// Match the name exactly
    Exact(PackageName),
    /// Match the name by glob. A glob uses `*` to match any substring.
    Glob(glob::Pattern),
    /// Match the name by regex. A regex starts with `^`, ends with `$`, and is anchored against
    /// the whole string.
    Regex(regex::Regex),
}

impl Hash for PackageNameMatcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            PackageNameMatcher::Exact(s) => s.hash(state),
            PackageNameMatcher::Glob(pattern) => pattern.hash(state),
            PackageNameMatcher::Regex(regex) => regex.as_str().hash(state),
        }
    }
}

impl PartialEq for PackageNameMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PackageNameMatcher::Exact(s1), PackageNameMatcher::Exact(s2)) => s1 == s2,
            (PackageNameMatcher::Glob(s1), PackageNameMatcher::Glob(s2)) => {
                s1.as_str() == s2.as_str()
            }
            (PackageNameMatcher::Regex(s1), PackageNameMatcher::Regex(s2)) => {
                s1.as_str() == s2.as_str()
            }
            _ => false,
        }
    }
}

impl PackageNameMatcher {
    /// Match `other` against this matcher.
    pub fn matches(&self, other: &PackageName) -> bool {
        match self {
            PackageNameMatcher::Exact(s) => s == other,
            PackageNameMatcher::Glob(glob) => glob.matches(other.as_normalized()),
            PackageNameMatcher::Regex(regex) => regex.is_match(other.as_normalized()),
        }
    }

    /// Returns the exact [`PackageName`] this matcher resolves to, or `None` if it is a glob or
    /// regex matcher.
    pub fn as_exact(&self) -> Option<&PackageName> {
        match self {
            PackageNameMatcher::Exact(s) => Some(s),
            _ => None,
        }
    }
}

/// An error when parsing a [`PackageNameMatcher`].
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PackageNameMatcherParseError {
    /// The glob pattern was invalid.
    #[error("invalid glob: {glob}")]
    Glob {
        /// The invalid glob.
        glob: String,
    },
    /// The regex pattern was invalid.
    #[error("invalid regex: {regex}")]
    Regex {
        /// The invalid regex.
        regex: String,
    },
    /// The string was neither a glob nor a regex, and not a valid package name either.
    #[error("invalid package name {name}: {source}")]
    PackageName {
        /// The invalid package name.
        name: String,
        /// The underlying validation error.
        source: InvalidPackageNameError,
    },
}

impl FromStr for PackageNameMatcher {
    type Err = PackageNameMatcherParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('^') && s.ends_with('$') {
            Ok(PackageNameMatcher::Regex(regex::Regex::new(s).map_err(
                |_err| PackageNameMatcherParseError::Regex {
                    regex: s.to_string(),
                },
            )?))
        } else if s.contains('*') {
            Ok(PackageNameMatcher::Glob(glob::Pattern::new(s).map_err(
                |_err| PackageNameMatcherParseError::Glob {
                    glob: s.to_string(),
                },
            )?))
        } else {
            Ok(PackageNameMatcher::Exact(PackageName::from_str(s).map_err(
                |e| PackageNameMatcherParseError::PackageName {
                    name: s.to_string(),
                    source: e,
                },
            )?))
        }
    }
}

impl Display for PackageNameMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageNameMatcher::Exact(s) => write!(f, "{}", s.as_normalized()),
            PackageNameMatcher::Glob(s) => write!(f, "{}", s.as_str()),
            PackageNameMatcher::Regex(s) => write!(f, "{}", s.as_str()),
        }
    }
}

impl Eq for PackageNameMatcher {}

impl Serialize for PackageNameMatcher {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PackageNameMatcher::Exact(s) => s.serialize(serializer),
            PackageNameMatcher::Glob(s) => s.as_str().serialize(serializer),
            PackageNameMatcher::Regex(s) => s.as_str().serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PackageNameMatcher {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<'de, str>::deserialize(deserializer)?;
        PackageNameMatcher::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// An error converting a [`PackageNameMatcher`] to a [`PackageName`].
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum IntoPackageNameError {
    /// The matcher is a glob or regex, not an exact package name.
    #[error("not an exact package name")]
    NotExact,
}

impl TryFrom<PackageNameMatcher> for PackageName {
    type Error = IntoPackageNameError;
    fn try_from(value: PackageNameMatcher) -> Result<Self, Self::Error> {
        match value {
            PackageNameMatcher::Exact(name) => Ok(name),
            _ => Err(IntoPackageNameError::NotExact),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name_matcher() {
        assert_eq!(
            PackageNameMatcher::Exact(PackageName::from_str("foo").unwrap()),
            "foo".parse().unwrap()
        );
        assert_eq!(
            PackageNameMatcher::Glob(glob::Pattern::new("foo*").unwrap()),
            "foo*bar".parse().unwrap()
        );
        assert_eq!(
            PackageNameMatcher::Regex(regex::Regex::new("^foo.*$").unwrap()),
            "^foo.*$".parse().unwrap()
        );
    }

    #[test]
    fn test_as_exact() {
        let exact: PackageNameMatcher = "foo".parse().unwrap();
        assert_eq!(exact.as_exact().unwrap().as_normalized(), "foo");

        let glob: PackageNameMatcher = "foo*".parse().unwrap();
        assert!(glob.as_exact().is_none());
    }
}
