//! A [`VersionSpec`] is a boolean combination of relational atoms over [`Version`], e.g.
//! `>=3.4,<4.0` or `1.2.*`.

mod parse;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize, Serializer};
pub use parse::{ParseVersionSpecError, ParseVersionSpecErrorKind};

use crate::Version;

/// A relational range operator.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum RangeOperator {
    Greater,
    GreaterEquals,
    Less,
    LessEquals,
}

impl Display for RangeOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeOperator::Greater => write!(f, ">"),
            RangeOperator::GreaterEquals => write!(f, ">="),
            RangeOperator::Less => write!(f, "<"),
            RangeOperator::LessEquals => write!(f, "<="),
        }
    }
}

/// An operator testing for exact (in)equality.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EqualityOperator {
    Equals,
    NotEquals,
}

impl Display for EqualityOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EqualityOperator::Equals => write!(f, "=="),
            EqualityOperator::NotEquals => write!(f, "!="),
        }
    }
}

/// Logical operator used to combine groups of version constraints, e.g. `>=3.4,<4.0` (and) or
/// `>=3.4|<4.0` (or).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum LogicalOperator {
    /// All terms must match (`,`).
    And,
    /// Any term must match (`|`).
    Or,
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOperator::And => write!(f, ","),
            LogicalOperator::Or => write!(f, "|"),
        }
    }
}

/// A version specification: a boolean combination of relational atoms over [`Version`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum VersionSpec {
    /// Matches any version (`*`).
    Any,
    /// A relational range, e.g. `>=1.2.3`.
    Range(RangeOperator, Version),
    /// An exact (in)equality, e.g. `==1.2.3` or `!=1.2.3`.
    Exact(EqualityOperator, Version),
    /// `version` is a prefix of the tested version, e.g. `1.2.*` matches `1.2.0`, `1.2.5`, ...
    StartsWith(Version),
    /// The complement of [`VersionSpec::StartsWith`], e.g. `!=1.2.*`.
    NotStartsWith(Version),
    /// A PEP 440-style compatible release, e.g. `~=1.2.3` (matches `>=1.2.3,==1.2.*`).
    Compatible(Version),
    /// A group of version specifications combined with a [`LogicalOperator`].
    Group(LogicalOperator, Vec<VersionSpec>),
}

impl VersionSpec {
    /// Returns whether `version` satisfies this specification.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Exact(EqualityOperator::Equals, limit) => version == limit,
            VersionSpec::Exact(EqualityOperator::NotEquals, limit) => version != limit,
            VersionSpec::Range(RangeOperator::Greater, limit) => version > limit,
            VersionSpec::Range(RangeOperator::GreaterEquals, limit) => version >= limit,
            VersionSpec::Range(RangeOperator::Less, limit) => version < limit,
            VersionSpec::Range(RangeOperator::LessEquals, limit) => version <= limit,
            VersionSpec::StartsWith(prefix) => version.starts_with(prefix),
            VersionSpec::NotStartsWith(prefix) => !version.starts_with(prefix),
            VersionSpec::Compatible(limit) => version.compatible_with(limit),
            VersionSpec::Group(LogicalOperator::And, group) => {
                group.iter().all(|spec| spec.matches(version))
            }
            VersionSpec::Group(LogicalOperator::Or, group) => {
                group.iter().any(|spec| spec.matches(version))
            }
        }
    }
}

impl std::str::FromStr for VersionSpec {
    type Err = ParseVersionSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse_version_spec(s)
    }
}

impl Display for VersionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn write_inner(
            spec: &VersionSpec,
            f: &mut Formatter<'_>,
            parent_op: Option<LogicalOperator>,
        ) -> std::fmt::Result {
            match spec {
                VersionSpec::Any => write!(f, "*"),
                VersionSpec::Exact(op, version) => write!(f, "{op}{version}"),
                VersionSpec::Range(op, version) => write!(f, "{op}{version}"),
                VersionSpec::StartsWith(version) => write!(f, "{version}.*"),
                VersionSpec::NotStartsWith(version) => write!(f, "!={version}.*"),
                VersionSpec::Compatible(version) => write!(f, "~={version}"),
                VersionSpec::Group(op, group) => {
                    let needs_parens = matches!(
                        (op, parent_op),
                        (LogicalOperator::Or, Some(LogicalOperator::And))
                    );
                    if needs_parens {
                        write!(f, "(")?;
                    }
                    for (i, spec) in group.iter().enumerate() {
                        if i > 0 {
                            write!(f, "{op}")?;
                        }
                        write_inner(spec, f, Some(*op))?;
                    }
                    if needs_parens {
                        write!(f, ")")?;
                    }
                    Ok(())
                }
            }
        }
        write_inner(self, f, None)
    }
}

impl Serialize for VersionSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::Version;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn test_simple() {
        assert_eq!(
            VersionSpec::from_str("1.2.3").unwrap(),
            VersionSpec::Exact(EqualityOperator::Equals, v("1.2.3"))
        );
        assert_eq!(
            VersionSpec::from_str(">=1.2.3").unwrap(),
            VersionSpec::Range(RangeOperator::GreaterEquals, v("1.2.3"))
        );
    }

    #[test]
    fn test_group_and_or() {
        assert_eq!(
            VersionSpec::from_str(">=1.2.3,<2.0.0").unwrap(),
            VersionSpec::Group(
                LogicalOperator::And,
                vec![
                    VersionSpec::Range(RangeOperator::GreaterEquals, v("1.2.3")),
                    VersionSpec::Range(RangeOperator::Less, v("2.0.0")),
                ]
            )
        );
        assert_eq!(
            VersionSpec::from_str(">=1.2.3|<1.0.0").unwrap(),
            VersionSpec::Group(
                LogicalOperator::Or,
                vec![
                    VersionSpec::Range(RangeOperator::GreaterEquals, v("1.2.3")),
                    VersionSpec::Range(RangeOperator::Less, v("1.0.0")),
                ]
            )
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let spec = VersionSpec::from_str(">1.8,<2|==1.7,!=1.9,~=1.7.1").unwrap();
        assert!(spec.matches(&v("1.7.1")));
        assert!(!spec.matches(&v("1.8.0")));
    }

    #[test]
    fn test_starts_with_glob() {
        let spec = VersionSpec::from_str("1.2.*").unwrap();
        assert_eq!(spec, VersionSpec::StartsWith(v("1.2")));
        assert!(spec.matches(&v("1.2.0")));
        assert!(spec.matches(&v("1.2.5")));
        assert!(!spec.matches(&v("1.3.0")));
    }

    #[test]
    fn test_compatible_release() {
        let spec = VersionSpec::from_str("~=2.4").unwrap();
        assert!(spec.matches(&v("2.4")));
        assert!(spec.matches(&v("2.5")));
        assert!(!spec.matches(&v("2.1")));
        assert!(!spec.matches(&v("3.1")));
    }

    #[test]
    fn test_epoch_range() {
        let spec = VersionSpec::from_str(">=1!1.2,<1!2").unwrap();
        assert!(spec.matches(&v("1!1.2.3")));
        assert!(!spec.matches(&v("1.2.3")));
    }

    #[test]
    fn test_display_roundtrip() {
        let spec = VersionSpec::from_str("(>=1|<2),>3").unwrap();
        assert_eq!(spec.to_string(), "(>=1|<2),>3");
    }

    #[test]
    fn test_any() {
        assert_eq!(VersionSpec::from_str("*").unwrap(), VersionSpec::Any);
    }
}
