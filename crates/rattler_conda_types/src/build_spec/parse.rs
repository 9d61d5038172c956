//! Parsing support for [`super::BuildNumberSpec`].

use super::{BuildNumber, BuildNumberSpec, OrdOperator};

use nom::{bytes::complete::take_while1, character::complete::digit1, Finish, IResult};
use std::str::FromStr;
use thiserror::Error;

impl FromStr for BuildNumberSpec {
    type Err = ParseBuildNumberSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parser(s).finish()? {
            ("", spec) => Ok(spec),
            (_, _) => Err(ParseBuildNumberSpecError::ExpectedEof),
        }
    }
}

impl BuildNumberSpec {
    /// Parses a build number spec: an optional preceding operator followed by a whole number.
    /// A bare number without an operator is treated as `==`.
    pub fn parser(input: &str) -> IResult<&str, BuildNumberSpec, ParseBuildNumberSpecError> {
        let (input, op) = match OrdOperator::parser(input) {
            Err(
                nom::Err::Failure(ParseOrdOperatorError::InvalidOperator(op))
                | nom::Err::Error(ParseOrdOperatorError::InvalidOperator(op)),
            ) => {
                return Err(nom::Err::Failure(
                    ParseBuildNumberSpecError::InvalidOperator(
                        ParseOrdOperatorError::InvalidOperator(op),
                    ),
                ))
            }
            Err(nom::Err::Error(_)) => (input, None),
            Ok((rest, op)) => (rest, Some(op)),
            Err(nom::Err::Incomplete(_)) => unreachable!("not a streaming parser"),
        };

        let (rest, build_num) = digit1(input)
            .map(|(rest, digits): (&str, &str)| {
                (
                    rest,
                    digits
                        .parse::<BuildNumber>()
                        .expect("nom found at least one digit"),
                )
            })
            .map_err(|_err: nom::Err<nom::error::Error<&str>>| {
                nom::Err::Error(ParseBuildNumberSpecError::InvalidBuildNumber(
                    ParseBuildNumberError,
                ))
            })?;

        match op {
            Some(op) => Ok((rest, BuildNumberSpec::new(op, build_num))),
            None => Ok((rest, BuildNumberSpec::new(OrdOperator::Eq, build_num))),
        }
    }
}

/// Errors when parsing the [`OrdOperator`] that precedes the digits in a build number spec.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ParseOrdOperatorError {
    /// Operator-like symbols were captured but not interpretable as an [`OrdOperator`].
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),
    /// No operator symbols were found.
    #[error("expected version operator")]
    ExpectedOperator,
    /// Data remained after the operator was read.
    #[error("expected EOF")]
    ExpectedEof,
}

/// Error parsing the digits of a build number spec.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("could not parse build number")]
pub struct ParseBuildNumberError;

/// Composition of errors that can occur while parsing a [`BuildNumberSpec`].
#[allow(clippy::enum_variant_names, missing_docs)]
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ParseBuildNumberSpecError {
    #[error("invalid build number: {0}")]
    InvalidBuildNumber(#[source] ParseBuildNumberError),
    #[error("invalid build number constraint: {0}")]
    InvalidOperator(#[source] ParseOrdOperatorError),
    #[error("expected EOF")]
    ExpectedEof,
}

impl FromStr for OrdOperator {
    type Err = ParseOrdOperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parser(s).finish()? {
            ("", spec) => Ok(spec),
            (_, _) => Err(ParseOrdOperatorError::ExpectedEof),
        }
    }
}

impl OrdOperator {
    /// Parses a relational operator, erroring if it is not recognized or not found.
    fn parser(input: &str) -> IResult<&str, OrdOperator, ParseOrdOperatorError> {
        let (rest, operator_str) = take_while1(|c| "=!<>".contains(c))(input).map_err(
            |_err: nom::Err<nom::error::Error<&str>>| {
                nom::Err::Error(ParseOrdOperatorError::ExpectedOperator)
            },
        )?;

        let op = match operator_str {
            "==" => OrdOperator::Eq,
            "!=" => OrdOperator::Ne,
            "<=" => OrdOperator::Le,
            ">=" => OrdOperator::Ge,
            "<" => OrdOperator::Lt,
            ">" => OrdOperator::Gt,
            _ => {
                return Err(nom::Err::Failure(ParseOrdOperatorError::InvalidOperator(
                    operator_str.to_string(),
                )))
            }
        };

        Ok((rest, op))
    }
}

#[cfg(test)]
mod test {
    use super::{BuildNumberSpec, OrdOperator, ParseOrdOperatorError};

    use nom::Finish;

    #[test]
    fn parse_operator_from_spec() {
        let test_params = vec![
            (">3.1", OrdOperator::Gt),
            (">=3.1", OrdOperator::Ge),
            ("<3.1", OrdOperator::Lt),
            ("<=3.1", OrdOperator::Le),
            ("==3.1", OrdOperator::Eq),
            ("!=3.1", OrdOperator::Ne),
        ];

        for (s, op) in test_params {
            assert_eq!(OrdOperator::parser(s), Ok(("3.1", op)));
        }

        assert_eq!(
            OrdOperator::parser("<==>3.1"),
            Err(nom::Err::Failure(ParseOrdOperatorError::InvalidOperator(
                "<==>".to_string()
            )))
        );
        assert_eq!(
            OrdOperator::parser("3.1"),
            Err(nom::Err::Error(ParseOrdOperatorError::ExpectedOperator))
        );
    }

    #[test]
    fn parse_spec() {
        let test_params = vec![
            (">1", OrdOperator::Gt),
            (">=1", OrdOperator::Ge),
            ("<1", OrdOperator::Lt),
            ("<=1", OrdOperator::Le),
            ("==1", OrdOperator::Eq),
            ("!=1", OrdOperator::Ne),
        ];

        for (s, op) in test_params {
            assert_eq!(
                BuildNumberSpec::parser(s),
                Ok(("", BuildNumberSpec::new(op, 1)))
            );
        }

        assert_eq!(
            BuildNumberSpec::parser(">=1.1"),
            Ok((".1", BuildNumberSpec::new(OrdOperator::Ge, 1)))
        );

        assert!(BuildNumberSpec::parser(">=build3").finish().is_err());
    }
}
