use super::{Component, Version, EPOCH_MASK};
use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{alpha1, char, digit1};
use nom::combinator::{map, opt, value};
use nom::error::{ErrorKind, FromExternalError, ParseError};
use nom::sequence::terminated;
use nom::IResult;
use smallvec::SmallVec;
use std::{
    error::Error,
    fmt::{Display, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;

/// An error that occurred while parsing a string into a [`Version`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseVersionError {
    /// The original string that was the input of the parser.
    pub version: String,

    /// The type of parse error that occurred.
    pub kind: ParseVersionErrorKind,
}

impl Display for ParseVersionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "malformed version string '{}': {}",
            &self.version, &self.kind
        )
    }
}

impl Error for ParseVersionError {}

impl ParseVersionError {
    /// Creates a new parse error.
    pub fn new(text: impl Into<String>, kind: ParseVersionErrorKind) -> Self {
        Self {
            version: text.into(),
            kind,
        }
    }
}

/// The type of parse error that occurred when parsing a version string.
#[derive(Debug, Eq, PartialEq, Clone, Error)]
pub enum ParseVersionErrorKind {
    /// The string was empty.
    #[error("empty string")]
    Empty,
    /// The epoch was not an integer value.
    #[error("epoch is not a number")]
    EpochMustBeInteger(ParseIntError),
    /// The string contained an invalid numeral.
    #[error("invalid number")]
    InvalidNumeral(ParseIntError),
    /// Too many segments for the local segment index to be encoded.
    #[error("the version string contains too many version segments")]
    TooManySegments,
    /// There are too many components in a single segment.
    #[error("there are too many components in a single segment")]
    TooManyComponentsInASegment,
    /// Expected a version component.
    #[error("expected a version component e.g. `2` or `rc`")]
    ExpectedComponent,
    /// Expected a segment separator.
    #[error("expected a '.', '-', or '_'")]
    ExpectedSegmentSeparator,
    /// Expected the end of the string.
    #[error("encountered more characters but expected none")]
    ExpectedEof,
    /// Nom's internal error kind, used when no more specific error applies.
    #[error("{0:?}")]
    Nom(ErrorKind),
}

impl<'i> ParseError<&'i str> for ParseVersionErrorKind {
    fn from_error_kind(_: &'i str, kind: ErrorKind) -> Self {
        ParseVersionErrorKind::Nom(kind)
    }

    fn append(_: &'i str, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'i> FromExternalError<&'i str, ParseVersionErrorKind> for ParseVersionErrorKind {
    fn from_external_error(_: &'i str, _: ErrorKind, e: ParseVersionErrorKind) -> Self {
        e
    }
}

/// Parses the epoch part of a version: a number followed by `!` at the start of the string.
fn epoch_parser(input: &str) -> IResult<&str, u64, ParseVersionErrorKind> {
    let (rest, digits) = terminated(digit1, char('!'))(input)?;
    let epoch = digits
        .parse()
        .map_err(ParseVersionErrorKind::EpochMustBeInteger)
        .map_err(nom::Err::Failure)?;
    Ok((rest, epoch))
}

/// Parses a numeral, failing if the digits overflow a `u64`.
fn numeral_parser(input: &str) -> IResult<&str, u64, ParseVersionErrorKind> {
    let (rest, digits) = digit1(input)?;
    match u64::from_str(digits) {
        Ok(numeral) => Ok((rest, numeral)),
        Err(e) => Err(nom::Err::Failure(ParseVersionErrorKind::InvalidNumeral(e))),
    }
}

/// Parses a single version [`Component`]: a run of digits, `post`/`dev`, a literal `*` (the
/// minimal atom, sorting below `dev`), or a run of letters.
fn component_parser(input: &str) -> IResult<&str, Component, ParseVersionErrorKind> {
    alt((
        map(numeral_parser, Component::Numeral),
        value(Component::Post, tag_no_case("post")),
        value(Component::Dev, tag_no_case("dev")),
        value(Component::Star, char('*')),
        map(alpha1, |alpha: &str| {
            Component::Iden(alpha.to_lowercase().into_boxed_str())
        }),
    ))(input)
}

/// Parses one `.`/`_`-delimited segment into one or more [`Component`]s, pushing them onto
/// `components` and returning how many were added. Inserts an implicit leading zero if the
/// segment doesn't start with a numeral, so that `beta15` becomes `[0, "beta", 15]`.
fn segment_parser<'i>(
    components: &mut SmallVec<[Component; 3]>,
    input: &'i str,
) -> IResult<&'i str, u16, ParseVersionErrorKind> {
    let (mut rest, first_component) = match component_parser(input) {
        Ok(result) => result,
        Err(nom::Err::Error(ParseVersionErrorKind::Nom(_))) => {
            return Err(nom::Err::Error(ParseVersionErrorKind::ExpectedComponent))
        }
        Err(e) => return Err(e),
    };

    let starts_with_number = matches!(first_component, Component::Numeral(_));
    let mut count: u16 = 0;
    if !starts_with_number {
        components.push(Component::default());
        count += 1;
    }
    components.push(first_component);
    count += 1;

    loop {
        match opt(component_parser)(rest) {
            Ok((remaining, Some(component))) => {
                components.push(component);
                count = count
                    .checked_add(1)
                    .ok_or_else(|| nom::Err::Failure(ParseVersionErrorKind::TooManyComponentsInASegment))?;
                rest = remaining;
            }
            Ok((remaining, None)) => return Ok((remaining, count)),
            Err(e) => {
                components.truncate(components.len() - count as usize);
                return Err(e);
            }
        }
    }
}

/// Parses a `.`/`_`-delimited run of segments (either the main version part or the local
/// version part). Pushes each segment's component count onto `segment_lengths`.
fn version_part_parser<'i>(
    components: &mut SmallVec<[Component; 3]>,
    segment_lengths: &mut SmallVec<[u16; 4]>,
    input: &'i str,
) -> IResult<&'i str, (), ParseVersionErrorKind> {
    let (mut input, first_len) = segment_parser(components, input)?;
    segment_lengths.push(first_len);

    loop {
        let Ok((rest, Some(_separator))) = opt(alt((char('.'), char('_'))))(input) else {
            return Ok((input, ()));
        };
        match segment_parser(components, rest) {
            Ok((remaining, len)) => {
                segment_lengths.push(len);
                input = remaining;
            }
            Err(nom::Err::Error(_)) => {
                return Err(nom::Err::Error(
                    ParseVersionErrorKind::ExpectedSegmentSeparator,
                ))
            }
            Err(e) => return Err(e),
        }
    }
}

/// Normalizes dashes to underscores (but only if the input contains no underscores of its own)
/// and lowercases the result, matching the documented [`Version`] normalization rule.
fn normalize(input: &str) -> String {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    if lower.contains('_') {
        lower
    } else {
        lower.replace('-', "_")
    }
}

fn version_parser(input: &str) -> IResult<&str, Version, ParseVersionErrorKind> {
    let mut components = SmallVec::default();
    let mut segment_lengths = SmallVec::default();
    let mut flags = 0u8;

    if input.is_empty() {
        return Err(nom::Err::Error(ParseVersionErrorKind::Empty));
    }

    let (input, epoch) = opt(epoch_parser)(input)?;
    if let Some(epoch) = epoch {
        components.push(epoch.into());
        flags |= EPOCH_MASK;
    }

    let (rest, ()) = version_part_parser(&mut components, &mut segment_lengths, input)?;

    let rest = if let Ok((local_part, _)) = char::<_, (&str, ErrorKind)>('+')(rest) {
        let local_segment_start = segment_lengths.len();
        // The local segment index is encoded in the upper 7 bits of `flags`, so at most 127
        // release segments can precede a local version.
        if local_segment_start == 0 || local_segment_start > 127 {
            return Err(nom::Err::Error(ParseVersionErrorKind::TooManySegments));
        }
        flags |= (local_segment_start as u8) << 1;

        let (rest, ()) = version_part_parser(&mut components, &mut segment_lengths, local_part)?;
        rest
    } else {
        rest
    };

    Ok((
        rest,
        Version {
            norm: Box::default(),
            components,
            segment_lengths,
            flags,
        },
    ))
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseVersionError::new(s, ParseVersionErrorKind::Empty));
        }
        let normalized = normalize(s);
        match version_parser(&normalized) {
            Ok(("", mut version)) => {
                version.norm = normalized.into_boxed_str();
                Ok(version)
            }
            Ok(_) => Err(ParseVersionError::new(
                s,
                ParseVersionErrorKind::ExpectedEof,
            )),
            Err(nom::Err::Failure(e) | nom::Err::Error(e)) => Err(ParseVersionError::new(s, e)),
            Err(nom::Err::Incomplete(_)) => {
                unreachable!("not a streaming parser, so no other error possible")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::Version;
    use std::str::FromStr;

    #[test]
    fn test_parse_simple() {
        assert_eq!(Version::from_str("1.2.3").unwrap().to_string(), "1.2.3");
        assert_eq!(Version::from_str(" 1.2.3 ").unwrap().to_string(), "1.2.3");
        assert_eq!(Version::from_str("1.2.3-4").unwrap().to_string(), "1.2.3_4");
    }

    #[test]
    fn test_parse_epoch() {
        let version = Version::from_str("1!2.3").unwrap();
        assert_eq!(version.epoch(), 1);
        assert!(version.has_epoch());
    }

    #[test]
    fn test_parse_local() {
        let version = Version::from_str("1.2+3.4").unwrap();
        assert!(version.has_local());
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(Version::from_str("").is_err());
        assert!(Version::from_str("   ").is_err());
    }

    #[test]
    fn test_parse_implicit_leading_zero() {
        assert_eq!(
            Version::from_str("1.2.beta15").unwrap(),
            Version::from_str("1.2.0beta15").unwrap()
        );
    }

    #[test]
    fn test_parse_trailing_star() {
        assert_eq!(Version::from_str("0.5*").unwrap().to_string(), "0.5*");
        assert!(Version::from_str("0.5*").unwrap() < Version::from_str("0.5a1").unwrap());
    }

    #[test]
    fn test_parse_rejects_double_dot() {
        assert!(Version::from_str("1..2").is_err());
    }

    #[test]
    fn test_parse_rejects_leading_dot() {
        assert!(Version::from_str(".1.2").is_err());
    }
}
