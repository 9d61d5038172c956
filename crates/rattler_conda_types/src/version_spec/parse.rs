use std::str::FromStr;

use thiserror::Error;

use super::{EqualityOperator, LogicalOperator, RangeOperator, VersionSpec};
use crate::ParseVersionError;

/// An error that occurred while parsing a [`VersionSpec`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("malformed version spec '{input}': {kind}")]
pub struct ParseVersionSpecError {
    input: String,
    kind: ParseVersionSpecErrorKind,
}

/// The type of error that occurred while parsing a [`VersionSpec`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseVersionSpecErrorKind {
    /// The input was empty.
    #[error("empty version spec")]
    Empty,
    /// Parentheses in the input are not balanced.
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    /// A group contained no terms, e.g. two consecutive separators.
    #[error("empty group")]
    EmptyGroup,
    /// An invalid or ambiguous relational operator was found.
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),
    /// The version part of a constraint was invalid.
    #[error("invalid version: {0}")]
    InvalidVersion(#[source] ParseVersionError),
    /// The `*` glob may only appear at the end, and not combined with `!=`/relational operators
    /// other than `=`.
    #[error("'*' is only valid by itself, or as a trailing '.*' after a version")]
    InvalidGlob,
}

fn err(input: &str, kind: ParseVersionSpecErrorKind) -> ParseVersionSpecError {
    ParseVersionSpecError {
        input: input.to_owned(),
        kind,
    }
}

/// Splits `input` on top-level occurrences of `sep` (i.e. not inside parentheses).
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

pub(super) fn parse_version_spec(input: &str) -> Result<VersionSpec, ParseVersionSpecError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(err(input, ParseVersionSpecErrorKind::Empty));
    }
    if count_parens(trimmed) != 0 {
        return Err(err(input, ParseVersionSpecErrorKind::UnbalancedParens));
    }
    parse_or(input, trimmed)
}

fn count_parens(s: &str) -> i32 {
    s.chars().fold(0i32, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

fn parse_or(original: &str, input: &str) -> Result<VersionSpec, ParseVersionSpecError> {
    let parts = split_top_level(input, '|');
    if parts.len() == 1 {
        return parse_and(original, parts[0]);
    }
    let specs = parts
        .into_iter()
        .map(|part| parse_and(original, part))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(VersionSpec::Group(LogicalOperator::Or, specs))
}

fn parse_and(original: &str, input: &str) -> Result<VersionSpec, ParseVersionSpecError> {
    let parts = split_top_level(input, ',');
    if parts.len() == 1 {
        return parse_term(original, parts[0]);
    }
    let specs = parts
        .into_iter()
        .map(|part| parse_term(original, part))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(VersionSpec::Group(LogicalOperator::And, specs))
}

fn parse_term(original: &str, input: &str) -> Result<VersionSpec, ParseVersionSpecError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(err(original, ParseVersionSpecErrorKind::EmptyGroup));
    }
    if let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        return parse_or(original, inner);
    }
    parse_constraint(original, trimmed)
}

const OPERATORS: &[(&str, fn(bool) -> ConstraintOp)] = &[
    ("==", |_| ConstraintOp::Exact(EqualityOperator::Equals)),
    ("!=", |glob| {
        if glob {
            ConstraintOp::NotStartsWith
        } else {
            ConstraintOp::Exact(EqualityOperator::NotEquals)
        }
    }),
    ("~=", |_| ConstraintOp::Compatible),
    (">=", |_| ConstraintOp::Range(RangeOperator::GreaterEquals)),
    (">", |glob| {
        ConstraintOp::Range(if glob {
            RangeOperator::GreaterEquals
        } else {
            RangeOperator::Greater
        })
    }),
    ("<=", |_| ConstraintOp::Range(RangeOperator::LessEquals)),
    ("<", |_| ConstraintOp::Range(RangeOperator::Less)),
    ("=", |_| ConstraintOp::StartsWith),
];

enum ConstraintOp {
    Exact(EqualityOperator),
    Range(RangeOperator),
    StartsWith,
    NotStartsWith,
    Compatible,
}

fn parse_constraint(original: &str, input: &str) -> Result<VersionSpec, ParseVersionSpecError> {
    if input == "*" {
        return Ok(VersionSpec::Any);
    }

    let (op_str, rest) = OPERATORS
        .iter()
        .find_map(|(op, make)| input.strip_prefix(op).map(|rest| ((*op, *make), rest)))
        .map_or((None, input), |((op, make), rest)| {
            (Some((op, make)), rest)
        });

    let (glob, version_str) = if let Some(stripped) = rest.strip_suffix(".*") {
        (true, stripped)
    } else if let Some(stripped) = rest.strip_suffix('*') {
        (true, stripped.trim_end_matches('.'))
    } else {
        (false, rest)
    };

    if version_str.is_empty() {
        // A bare glob with no version, e.g. `>=*` or `==*`. Operators that are compatible with
        // "any version" (startswith-style and inclusive-range operators) degrade to `Any`;
        // exclusive/negating operators combined with a bare glob are ambiguous.
        return match op_str.map(|(op, _)| op) {
            None | Some("=") | Some("==") | Some("~=") | Some(">=") | Some("<=") => {
                Ok(VersionSpec::Any)
            }
            _ => Err(err(original, ParseVersionSpecErrorKind::InvalidGlob)),
        };
    }
    if version_str.contains('*') {
        return Err(err(original, ParseVersionSpecErrorKind::InvalidGlob));
    }

    let version = crate::Version::from_str(version_str)
        .map_err(|e| err(original, ParseVersionSpecErrorKind::InvalidVersion(e)))?;

    let op = match op_str {
        Some((_, make)) => make(glob),
        None if glob => ConstraintOp::StartsWith,
        None => ConstraintOp::Exact(EqualityOperator::Equals),
    };

    Ok(match op {
        ConstraintOp::Exact(eq) => VersionSpec::Exact(eq, version),
        ConstraintOp::Range(range) => VersionSpec::Range(range, version),
        ConstraintOp::StartsWith => VersionSpec::StartsWith(version),
        ConstraintOp::NotStartsWith => VersionSpec::NotStartsWith(version),
        ConstraintOp::Compatible => VersionSpec::Compatible(version),
    })
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use crate::Version;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn test_glob_with_operators() {
        assert_eq!(
            VersionSpec::from_str("=1.2.*").unwrap(),
            VersionSpec::StartsWith(v("1.2"))
        );
        assert_eq!(
            VersionSpec::from_str("!=1.2.*").unwrap(),
            VersionSpec::NotStartsWith(v("1.2"))
        );
        assert_eq!(
            VersionSpec::from_str(">=1.2.*").unwrap(),
            VersionSpec::Range(RangeOperator::GreaterEquals, v("1.2"))
        );
        assert_eq!(
            VersionSpec::from_str(">1.2.*").unwrap(),
            VersionSpec::Range(RangeOperator::GreaterEquals, v("1.2"))
        );
    }

    #[test]
    fn test_bare_star_equals_any() {
        assert_eq!(VersionSpec::from_str(">=*"), VersionSpec::from_str("*"));
        assert_eq!(VersionSpec::from_str("==*"), VersionSpec::from_str("*"));
        assert_eq!(VersionSpec::from_str("~=*"), VersionSpec::from_str("*"));
    }

    #[test]
    fn test_bare_star_ambiguous_operators_rejected() {
        assert!(VersionSpec::from_str(">*").is_err());
        assert!(VersionSpec::from_str("!=*").is_err());
        assert!(VersionSpec::from_str("<*").is_err());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(VersionSpec::from_str("").is_err());
        assert!(VersionSpec::from_str("  ").is_err());
    }

    #[test]
    fn test_rejects_unbalanced_parens() {
        assert!(VersionSpec::from_str("(>=1.2").is_err());
    }

    #[test]
    fn test_rejects_mid_glob() {
        assert!(VersionSpec::from_str("1.*.3").is_err());
    }
}
