//! Serde helpers shared across conda types.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::Error as _, ser::Error, Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DeserializeAs, SerializeAs};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};
use url::Url;

/// Serializes paths in a normalized way: backslashes are replaced with forward-slashes.
pub(crate) struct NormalizedPath;

impl<P: AsRef<Path>> SerializeAs<P> for NormalizedPath {
    fn serialize_as<S>(source: &P, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match source.as_ref().to_str() {
            Some(s) => s.replace('\\', "/").serialize(serializer),
            None => Err(S::Error::custom("path contains invalid UTF-8 characters")),
        }
    }
}

impl<'de> DeserializeAs<'de, PathBuf> for NormalizedPath {
    fn deserialize_as<D>(deserializer: D) -> Result<PathBuf, D::Error>
    where
        D: Deserializer<'de>,
    {
        PathBuf::deserialize(deserializer)
    }
}

/// Deserialize a sequence into `Vec<T>`, filtering out `None` values.
pub(crate) struct VecSkipNone<T>(PhantomData<T>);

impl<'de, T, I> DeserializeAs<'de, Vec<T>> for VecSkipNone<I>
where
    I: DeserializeAs<'de, Vec<Option<T>>>,
{
    fn deserialize_as<D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(I::deserialize_as(deserializer)?
            .into_iter()
            .flatten()
            .collect())
    }
}

/// Parses a URL that could be malformed, returning `None` and logging a warning instead of
/// failing the whole deserialization.
pub(crate) struct LossyUrl;

impl<'de> DeserializeAs<'de, Option<Url>> for LossyUrl {
    fn deserialize_as<D>(deserializer: D) -> Result<Option<Url>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let str = match Option::<String>::deserialize(deserializer)? {
            Some(url) => url,
            None => return Ok(None),
        };
        let url = match Url::parse(&str) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("unable to parse '{}' as an URL: {e}. Skipping...", str);
                return Ok(None);
            }
        };
        Ok(Some(url))
    }
}

/// Parses a string either as a plain string or a vector of strings joined by newlines.
pub(crate) struct MultiLineString;

impl<'de> DeserializeAs<'de, String> for MultiLineString {
    fn deserialize_as<D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Inner {
            String(String),
            Multi(Vec<String>),
        }

        Ok(match Inner::deserialize(deserializer)? {
            Inner::String(s) => s,
            Inner::Multi(s) => s.join("\n"),
        })
    }
}

/// A timestamp that preserves whether it was originally serialized in seconds or milliseconds
/// since the Unix epoch, so that round-tripping repodata doesn't change its representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimestampMs {
    timestamp: DateTime<Utc>,
    is_millis: bool,
}

impl TimestampMs {
    /// Creates a `TimestampMs` that will serialize with millisecond precision.
    pub fn from_timestamp_millis(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            is_millis: true,
        }
    }

    /// Creates a `TimestampMs` that will serialize with second precision.
    pub fn from_timestamp_seconds(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            is_millis: false,
        }
    }

    /// Returns the wrapped timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the timestamp as seconds since the Unix epoch.
    pub fn as_secs(&self) -> i64 {
        self.timestamp.timestamp()
    }

    /// Returns the timestamp as milliseconds since the Unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

impl PartialOrd for TimestampMs {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimestampMs {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

impl From<DateTime<Utc>> for TimestampMs {
    fn from(timestamp: DateTime<Utc>) -> Self {
        Self::from_timestamp_millis(timestamp)
    }
}

impl From<TimestampMs> for DateTime<Utc> {
    fn from(ts: TimestampMs) -> Self {
        ts.timestamp
    }
}

impl<'de> Deserialize<'de> for TimestampMs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let timestamp = i64::deserialize(deserializer)?;

        // Some repodata.json files encode timestamps in seconds, others in milliseconds. Year
        // 9999 in seconds is 253_402_300_799, so anything larger must be milliseconds.
        let (ts, is_millis) = if timestamp > 253_402_300_799 {
            let ts = Utc
                .timestamp_millis_opt(timestamp)
                .single()
                .ok_or_else(|| D::Error::custom("got invalid millisecond timestamp"))?;
            (ts, true)
        } else {
            let ts = Utc
                .timestamp_opt(timestamp, 0)
                .single()
                .ok_or_else(|| D::Error::custom("got invalid timestamp"))?;
            (ts, false)
        };

        Ok(Self {
            timestamp: ts,
            is_millis,
        })
    }
}

impl Serialize for TimestampMs {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let timestamp = if self.is_millis {
            self.timestamp.timestamp_millis()
        } else {
            self.timestamp.timestamp()
        };
        timestamp.serialize(serializer)
    }
}

/// Used to sort a `HashMap` alphabetically when serializing, for reproducible output.
pub(crate) fn sort_map_alphabetically<T: Serialize, H, S: serde::Serializer>(
    value: &HashMap<String, T, H>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    value
        .iter()
        .collect::<BTreeMap<_, _>>()
        .serialize(serializer)
}

/// Serializes and deserializes `track_features`, which is a space-separated list in current
/// repodata but was historically emitted as a JSON array of strings.
pub(crate) struct Features;

impl SerializeAs<Vec<String>> for Features {
    fn serialize_as<S>(source: &Vec<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        source.join(" ").serialize(serializer)
    }
}

impl<'de> DeserializeAs<'de, Vec<String>> for Features {
    fn deserialize_as<D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Inner<'a> {
            String(Cow<'a, str>),
            Seq(Vec<Cow<'a, str>>),
        }

        let parts: Vec<String> = match Inner::deserialize(deserializer)? {
            Inner::String(s) => s
                .split([',', ' '])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Inner::Seq(seq) => seq
                .iter()
                .map(Cow::as_ref)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        };
        Ok(parts)
    }
}

pub(crate) fn is_none_or_empty_string(opt: &Option<String>) -> bool {
    opt.as_deref().is_none_or(str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ms_preserves_seconds() {
        let json = "1640000000";
        let ts: TimestampMs = serde_json::from_str(json).unwrap();
        assert!(!ts.is_millis);
        assert_eq!(serde_json::to_string(&ts).unwrap(), json);
    }

    #[test]
    fn test_timestamp_ms_preserves_milliseconds() {
        let json = "1640000000000";
        let ts: TimestampMs = serde_json::from_str(json).unwrap();
        assert!(ts.is_millis);
        assert_eq!(serde_json::to_string(&ts).unwrap(), json);
    }

    #[test]
    fn test_timestamp_ms_conversion() {
        let timestamp = Utc.timestamp_opt(1_640_000_000, 0).single().unwrap();
        let ts: TimestampMs = timestamp.into();
        assert!(ts.is_millis);
        let converted: DateTime<Utc> = ts.into();
        assert_eq!(converted, timestamp);
    }

    #[test]
    fn test_features_accepts_string_and_seq() {
        #[serde_with::serde_as]
        #[derive(Deserialize, Serialize)]
        struct Wrapper(#[serde_as(as = "Features")] Vec<String>);

        let from_string: Wrapper = serde_json::from_str("\"a, b\"").unwrap();
        assert_eq!(from_string.0, vec!["a".to_string(), "b".to_string()]);

        let from_seq: Wrapper = serde_json::from_str("[\"a\", \"b\"]").unwrap();
        assert_eq!(from_seq.0, vec!["a".to_string(), "b".to_string()]);

        assert_eq!(serde_json::to_string(&from_string).unwrap(), "\"a b\"");
    }
}
