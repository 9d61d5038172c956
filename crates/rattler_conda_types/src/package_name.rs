use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// A conda package name. Stores both the source string from which this instance was created and
/// a normalized (lowercased) form used for comparison, lookup, and hashing.
///
/// Conda package names may only contain ascii alphanumerics, `-`, `_`, and `.`.
///
/// This struct explicitly does not implement [`std::fmt::Display`] because it would be
/// ambiguous whether that should show the source or the normalized form; call [`Self::as_source`]
/// or [`Self::as_normalized`] to make the distinction explicit.
#[derive(Debug, Clone, Eq)]
pub struct PackageName {
    normalized: Option<String>,
    source: String,
}

/// An error returned when a string is not a valid conda package name.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidPackageNameError {
    /// The package name contains illegal characters.
    #[error("'{0}' is not a valid package name: package names can only contain 0-9, a-z, A-Z, -, _, or .")]
    InvalidCharacters(String),
}

impl PackageName {
    /// Constructs a new `PackageName` from a string without checking whether it is a valid
    /// normalized conda package name. Only use this if the input is already known to be valid.
    pub fn new_unchecked(source: impl Into<String>) -> Self {
        Self {
            normalized: None,
            source: source.into(),
        }
    }

    /// Returns the source representation of the package name: the string from which this
    /// instance was created.
    pub fn as_source(&self) -> &str {
        &self.source
    }

    /// Returns the normalized (lowercased) form of the package name, guaranteed to be a valid
    /// conda package name.
    pub fn as_normalized(&self) -> &str {
        self.normalized.as_deref().unwrap_or(&self.source)
    }
}

impl TryFrom<String> for PackageName {
    type Error = InvalidPackageNameError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        if !source
            .chars()
            .all(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.'))
            || source.is_empty()
        {
            return Err(InvalidPackageNameError::InvalidCharacters(source));
        }

        // Only allocate a normalized copy if the source actually contains uppercase letters.
        let normalized = if source.chars().any(|c| c.is_ascii_uppercase()) {
            Some(source.to_ascii_lowercase())
        } else {
            None
        };

        Ok(Self { normalized, source })
    }
}

impl<'a> TryFrom<&'a str> for PackageName {
    type Error = InvalidPackageNameError;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        value.to_owned().try_into()
    }
}

impl FromStr for PackageName {
    type Err = InvalidPackageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.to_owned().try_into()
    }
}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_normalized().hash(state);
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.as_normalized() == other.as_normalized()
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_normalized().cmp(other.as_normalized())
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        self.as_normalized()
    }
}

impl Serialize for PackageName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_source().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_package_name_basics() {
        let name1 = PackageName::try_from("cuDNN").unwrap();
        assert_eq!(name1.as_source(), "cuDNN");
        assert_eq!(name1.as_normalized(), "cudnn");

        let name2 = PackageName::try_from("cudnn").unwrap();
        assert_eq!(name2.as_source(), "cudnn");
        assert_eq!(name2.as_normalized(), "cudnn");

        assert_eq!(name1, name2);

        assert!(PackageName::try_from("invalid$").is_err());
        assert!(PackageName::try_from("").is_err());
    }

    #[test]
    fn test_package_name_ord_uses_normalized() {
        let mut names: Vec<PackageName> = ["Zlib", "abseil-cpp", "BOOST"]
            .iter()
            .map(|s| PackageName::try_from(*s).unwrap())
            .collect();
        names.sort();
        let normalized: Vec<_> = names.iter().map(PackageName::as_normalized).collect();
        assert_eq!(normalized, vec!["abseil-cpp", "boost", "zlib"]);
    }
}
