//! Defines [`Version`], an order relation between version strings as used throughout the Conda
//! ecosystem (PyPI's PEP 440 shares the same lineage but diverges on several edge cases).

use std::hash::{Hash, Hasher};
use std::{
    cmp::Ordering,
    fmt,
    fmt::{Debug, Display, Formatter},
    iter,
};

use itertools::{Either, EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize, Serializer};
use smallvec::SmallVec;

pub use parse::{ParseVersionError, ParseVersionErrorKind};

mod parse;

/// Bitmask that should be applied to `Version::flags` to determine if the version contains an
/// epoch.
const EPOCH_MASK: u8 = 0b0000_0001;

/// The bitmask to apply to `Version::flags` to get only the local version index.
const LOCAL_VERSION_MASK: u8 = !EPOCH_MASK;

/// The offset in bits where the bits of the local version index start.
const LOCAL_VERSION_OFFSET: u8 = 1;

/// An order relation between version strings. Version strings can contain the usual
/// alphanumeric characters (A-Za-z0-9), separated into segments by dots and underscores. Empty
/// segments (i.e. two consecutive dots, a leading/trailing underscore) are not permitted. An
/// optional epoch number - an integer followed by `!` - can precede the actual version string
/// (this is useful to indicate a change in the versioning scheme itself). Version comparison is
/// case-insensitive.
///
/// Rattler supports six types of version strings:
///
/// * Release versions contain only integers, e.g. `1.0`, `2.3.5`.
/// * Pre-release versions use additional letters such as `a` or `rc`, for example `1.0a1`.
/// * Development versions are indicated by the string `dev`, for example `1.0dev42`.
/// * Post-release versions are indicated by the string `post`, for example `1.0post1`.
/// * Tagged versions have a suffix that specifies a particular property of interest, e.g.
///   `1.1.parallel`. As far as sorting is concerned, tags are treated like strings in
///   pre-release versions.
/// * An optional local version string separated by `+` can be appended to the main (upstream)
///   version string. It is only considered in comparisons when the main versions are equal, but
///   otherwise handled in exactly the same manner.
///
/// Before comparison, version strings are parsed as follows:
///
/// * They are first split into epoch, version number, and local version number at `!` and `+`
///   respectively. If there is no `!`, the epoch is set to 0. If there is no `+`, the local
///   version is empty.
/// * The version part is then split into segments at `.` and `_`.
/// * Each segment is split again into runs of numerals and non-numerals.
/// * Subcomponents containing only numerals are converted to integers.
/// * Strings are converted to lower case, with special treatment for `dev` and `post`.
/// * When a segment starts with a letter, the fill value `0` is inserted to keep numbers and
///   strings in phase, resulting in `1.1.a1 == 1.1.0a1`.
///
/// The resulting order is:
///
/// ```txt
///        0.4
///      < 0.4.1.rc
///     == 0.4.1.RC   # case-insensitive comparison
///      < 0.4.1
///      < 0.5a1
///      < 0.5b3
///      < 0.5
///      < 1.0
///      < 1.1dev1    # special case 'dev'
///      < 1.1a1
///      < 1.1.0dev1  # special case 'dev'
///     == 1.1.dev1   # 0 is inserted before string
///      < 1.1.0
///     == 1.1
///      < 1.1.0post1 # special case 'post'
///     == 1.1.post1
///      < 1!0.4.1    # epoch increased
/// ```
#[derive(Clone, Eq, Deserialize)]
pub struct Version {
    /// A normalized copy of the original version string, lowercased, with dashes rewritten to
    /// underscores if the original did not itself contain underscores.
    norm: Box<str>,

    /// Individual components of the version.
    ///
    /// We store a maximum of 3 components on the stack. If a version consists of more components
    /// they are stored on the heap instead. We choose 3 here because most versions only consist
    /// of 3 components.
    ///
    /// So for the version `1.2g.beta15.rc` this stores:
    ///
    /// `[1, 2, 'g', 0, 'beta', 15, 0, 'rc']`
    components: SmallVec<[Component; 3]>,

    /// The length of each individual segment. Segments group different components together.
    ///
    /// So for the version `1.2g.beta15.rc` this stores:
    ///
    /// `[1, 2, 3, 2]`
    segment_lengths: SmallVec<[u16; 4]>,

    /// Flags to indicate edge cases. The first bit indicates whether this version has an
    /// epoch. The rest of the bits indicate from which segment the local version starts, or 0
    /// if there is no local version.
    flags: u8,
}

impl Version {
    /// Returns true if this version has an epoch.
    pub fn has_epoch(&self) -> bool {
        (self.flags & EPOCH_MASK) != 0
    }

    /// Returns true if this version has a local version defined.
    pub fn has_local(&self) -> bool {
        ((self.flags & LOCAL_VERSION_MASK) >> LOCAL_VERSION_OFFSET) > 0
    }

    /// Returns the index of the first segment that belongs to the local version, or `None` if
    /// there is no local version.
    fn local_segment_index(&self) -> Option<usize> {
        let index = ((self.flags & LOCAL_VERSION_MASK) >> LOCAL_VERSION_OFFSET) as usize;
        if index > 0 {
            Some(index)
        } else {
            None
        }
    }

    /// Returns the epoch part of the version. If the version did not specify an epoch `0` is
    /// returned.
    pub fn epoch(&self) -> u64 {
        self.epoch_opt().unwrap_or(0)
    }

    /// Returns the epoch part of the version, or `None` if the version did not specify an epoch.
    pub fn epoch_opt(&self) -> Option<u64> {
        if self.has_epoch() {
            Some(
                self.components[0]
                    .as_number()
                    .expect("if there is an epoch it must be the first component"),
            )
        } else {
            None
        }
    }

    /// Returns the individual (release) segments of the version.
    fn segments(
        &self,
    ) -> impl Iterator<Item = &'_ [Component]> + DoubleEndedIterator + ExactSizeIterator + '_ {
        let mut idx = usize::from(self.has_epoch());
        let version_segments = if let Some(local_index) = self.local_segment_index() {
            &self.segment_lengths[..local_index]
        } else {
            &self.segment_lengths[..]
        };
        version_segments.iter().map(move |&count| {
            let start = idx;
            let end = idx + count as usize;
            idx += count as usize;
            &self.components[start..end]
        })
    }

    /// Returns the number of release segments in this version.
    pub fn segment_count(&self) -> usize {
        self.segments().len()
    }

    /// Returns a new version where the release segment at `segment_index` has been incremented
    /// by one and every following segment has been truncated.
    ///
    /// This is used to expand `~=X.Y` into `>=X.Y,==X.*` and by callers that need "next release"
    /// semantics (e.g. an upper pin one minor version above the resolved version).
    pub fn bump(&self, segment_index: usize) -> Result<Self, VersionBumpError> {
        let segment_starts: SmallVec<[usize; 4]> = {
            let mut idx = usize::from(self.has_epoch());
            self.segments()
                .map(|segment| {
                    let start = idx;
                    idx += segment.len();
                    start
                })
                .collect()
        };

        let Some(&segment_start) = segment_starts.get(segment_index) else {
            return Err(VersionBumpError::InvalidSegment {
                segment: segment_index,
                segment_count: segment_starts.len(),
            });
        };

        let mut bumped = self.clone();

        // Drop the local version entirely (a bump invalidates any local qualifier) and every
        // release segment after the one we're bumping.
        bumped.flags &= EPOCH_MASK;
        bumped.segment_lengths.truncate(segment_index + 1);
        bumped.segment_lengths[segment_index] = 1;
        bumped.components.truncate(segment_start + 1);

        match bumped.components.get_mut(segment_start) {
            Some(Component::Numeral(n)) => *n += 1,
            _ => {
                return Err(VersionBumpError::NonNumericSegment {
                    segment: segment_index,
                })
            }
        }

        bumped.norm = bumped.canonical().into_boxed_str();
        Ok(bumped)
    }

    /// Returns the segments that belong to the local part of the version.
    ///
    /// The local part of a version is the part behind the (optional) `+`. E.g.:
    ///
    /// ```text
    /// 1.2+3.2.1-alpha0
    ///     ^^^^^^^^^^^^ This is the local part of the version
    /// ```
    fn local_segments(
        &self,
    ) -> impl Iterator<Item = &'_ [Component]> + DoubleEndedIterator + ExactSizeIterator + '_ {
        if let Some(start) = self.local_segment_index() {
            let mut idx = usize::from(self.has_epoch());
            idx += self.segment_lengths[..start].iter().sum::<u16>() as usize;
            let version_segments = &self.segment_lengths[start..];
            Either::Left(version_segments.iter().map(move |&count| {
                let start = idx;
                let end = idx + count as usize;
                idx += count as usize;
                &self.components[start..end]
            }))
        } else {
            Either::Right(iter::empty())
        }
    }

    /// Tries to extract the major and minor release segments from the version. Returns `None`
    /// if this instance doesn't appear to contain a major and minor version.
    pub fn as_major_minor(&self) -> Option<(u64, u64)> {
        let mut segments = self.segments();
        let major_segment = segments.next()?;
        let minor_segment = segments.next()?;

        if major_segment.len() == 1 && minor_segment.len() == 1 {
            Some((major_segment[0].as_number()?, minor_segment[0].as_number()?))
        } else {
            None
        }
    }

    /// Returns true if this is considered a dev version.
    ///
    /// If a version has a component named "dev" it is considered to be a dev version.
    pub fn is_dev(&self) -> bool {
        self.segments()
            .flatten()
            .any(|component| component.as_string() == Some("dev"))
    }

    /// Checks whether this version and its local part start with the same components as
    /// `other`. Used by the `=X.Y.*` and loose-equal match kinds.
    pub fn starts_with(&self, other: &Self) -> bool {
        self.epoch() == other.epoch()
            && segments_starts_with(self.segments(), other.segments())
            && segments_starts_with(self.local_segments(), other.local_segments())
    }

    /// Returns true if this version is compatible with the given `other`, in the sense of the
    /// `~=` compatible-release operator: this version must be greater than or equal to `other`
    /// and must not differ from `other` in any segment before the last one.
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.ge(other)
            && self.epoch() == other.epoch()
            && segments_starts_with(self.segments(), other.segments().rev().skip(1).rev())
            && segments_starts_with(self.local_segments(), other.local_segments())
    }

    /// Returns the canonical string representation of the version: all segments joined by dots,
    /// with the epoch and local qualifiers restored if present.
    pub fn canonical(&self) -> String {
        fn format_components(components: &[Component]) -> impl Display + '_ {
            // Skip the first component if it's the default fill value and is followed by a
            // non-numeral (this undoes the implicit leading zero we insert at parse time).
            let components = if components.len() > 1
                && components[0] == Component::default()
                && components[1].as_number().is_none()
            {
                &components[1..]
            } else {
                components
            };
            components.iter().join("")
        }

        fn format_segments<'i, I: Iterator<Item = &'i [Component]> + 'i>(
            segments: I,
        ) -> impl Display + 'i {
            segments.format_with(".", |components, f| f(&format_components(components)))
        }

        let epoch = self.epoch();
        let epoch_display = if epoch != 0 {
            format!("{epoch}!")
        } else {
            String::new()
        };
        let segments_display = format_segments(self.segments());
        let local_display = if self.has_local() {
            format!("+{}", format_segments(self.local_segments()))
        } else {
            String::new()
        };

        format!("{epoch_display}{segments_display}{local_display}")
    }
}

/// An error that can occur when calling [`Version::bump`].
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VersionBumpError {
    /// The requested segment does not exist in this version.
    #[error("cannot bump segment {segment} because the version only has {segment_count} release segments")]
    InvalidSegment {
        /// The requested (0-indexed) segment.
        segment: usize,
        /// The number of release segments the version actually has.
        segment_count: usize,
    },
    /// The requested segment is not purely numeric and cannot be incremented.
    #[error("cannot bump segment {segment} because it does not start with a number")]
    NonNumericSegment {
        /// The requested (0-indexed) segment.
        segment: usize,
    },
}

/// Returns true if the specified segments are considered to start with the other segments.
fn segments_starts_with<
    'a,
    'b,
    A: Iterator<Item = &'a [Component]> + 'a,
    B: Iterator<Item = &'b [Component]> + 'a,
>(
    a: A,
    b: B,
) -> bool {
    for ranges in a.zip_longest(b) {
        let (left, right) = match ranges {
            EitherOrBoth::Both(left, right) => (left, right),
            EitherOrBoth::Left(_) => return true,
            EitherOrBoth::Right(_) => return false,
        };
        for values in left.iter().zip_longest(right.iter()) {
            if !match values {
                EitherOrBoth::Both(a, b) => a == b,
                EitherOrBoth::Left(_) => return true,
                EitherOrBoth::Right(_) => return false,
            } {
                return false;
            }
        }
    }
    true
}

impl PartialEq<Self> for Version {
    fn eq(&self, other: &Self) -> bool {
        fn segments_equal<'i, I: Iterator<Item = &'i [Component]>>(a: I, b: I) -> bool {
            for ranges in a.zip_longest(b) {
                let (a_range, b_range) = ranges.or_default();
                let default = Component::default();
                for components in a_range.iter().zip_longest(b_range.iter()) {
                    let (a_component, b_component) = match components {
                        EitherOrBoth::Left(l) => (l, &default),
                        EitherOrBoth::Right(r) => (&default, r),
                        EitherOrBoth::Both(l, r) => (l, r),
                    };
                    if a_component != b_component {
                        return false;
                    }
                }
            }
            true
        }

        self.epoch() == other.epoch()
            && segments_equal(self.segments(), other.segments())
            && segments_equal(self.local_segments(), other.local_segments())
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fn hash_segments<'i, I: Iterator<Item = &'i [Component]>, H: Hasher>(
            state: &mut H,
            segments: I,
        ) {
            let default = Component::default();
            for segment in segments {
                // `1.0` and `1` are considered equal because a version has an infinite number
                // of default components in each segment. To get an equivalent hash we skip
                // trailing default components when hashing.
                segment
                    .iter()
                    .rev()
                    .skip_while(|c| **c == default)
                    .for_each(|c| c.hash(state));
            }
        }

        self.epoch().hash(state);
        hash_segments(state, self.segments());
        hash_segments(state, self.local_segments());
    }
}

fn format_segments<'i, I: Iterator<Item = &'i [Component]>>(
    segments: I,
) -> impl fmt::Display + fmt::Debug {
    format!(
        "[{}]",
        segments.format_with(", ", |components, f| f(&format_args!(
            "[{}]",
            components.iter().format(", ")
        )))
    )
}

impl Debug for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Version")
            .field("norm", &self.norm)
            .field(
                "version",
                &format_segments(
                    iter::once([Component::Numeral(self.epoch())].as_slice())
                        .chain(self.segments()),
                ),
            )
            .field("local", &format_segments(self.local_segments()))
            .finish()
    }
}

/// Either a number, a literal, or one of the special pre-/post-release markers.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
enum Component {
    Numeral(u64),

    /// `post` should always be ordered greater than anything else.
    Post,

    /// `dev` should always be ordered less than anything else, except [`Component::Star`].
    Dev,

    /// A literal `*`, the minimal atom: ordered less than everything, including `dev`.
    Star,

    /// A generic string identifier. Identifiers are compared lexicographically. They are always
    /// ordered less than numbers (except for the `dev`/`post`/`*` special cases above).
    Iden(Box<str>),
}

impl Component {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Component::Numeral(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Component::Iden(value) => Some(value.as_ref()),
            _ => None,
        }
    }
}

impl From<u64> for Component {
    fn from(num: u64) -> Self {
        Component::Numeral(num)
    }
}

impl Default for Component {
    fn default() -> Self {
        Component::Numeral(0)
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // `*` is always compared less than anything else, even `dev`.
            (Component::Star, Component::Star) => Ordering::Equal,
            (Component::Star, _) => Ordering::Less,
            (_, Component::Star) => Ordering::Greater,

            // Dev is always compared less than anything else remaining.
            (Component::Dev, Component::Dev) => Ordering::Equal,
            (Component::Dev, _) => Ordering::Less,
            (_, Component::Dev) => Ordering::Greater,

            // Post is always compared greater than anything else remaining.
            (Component::Post, Component::Post) => Ordering::Equal,
            (Component::Post, _) => Ordering::Greater,
            (_, Component::Post) => Ordering::Less,

            // Numbers are always ordered higher than strings.
            (Component::Numeral(_), Component::Iden(_)) => Ordering::Greater,
            (Component::Iden(_), Component::Numeral(_)) => Ordering::Less,

            // Compare numbers and identifiers normally amongst themselves.
            (Component::Numeral(a), Component::Numeral(b)) => a.cmp(b),
            (Component::Iden(a), Component::Iden(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Component::Numeral(n) => write!(f, "{n}"),
            Component::Iden(s) => write!(f, "{s}"),
            Component::Post => write!(f, "post"),
            Component::Dev => write!(f, "dev"),
            Component::Star => write!(f, "*"),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        fn cmp_segments<'i, I: Iterator<Item = &'i [Component]>>(a: I, b: I) -> Ordering {
            for ranges in a.zip_longest(b) {
                let (a_range, b_range) = ranges.or_default();
                for components in a_range.iter().zip_longest(b_range.iter()) {
                    let default = Component::default();
                    let (a_component, b_component) = match components {
                        EitherOrBoth::Left(l) => (l, &default),
                        EitherOrBoth::Right(r) => (&default, r),
                        EitherOrBoth::Both(l, r) => (l, r),
                    };
                    match a_component.cmp(b_component) {
                        Ordering::Less => return Ordering::Less,
                        Ordering::Equal => {}
                        Ordering::Greater => return Ordering::Greater,
                    }
                }
            }
            Ordering::Equal
        }

        self.epoch()
            .cmp(&other.epoch())
            .then_with(|| cmp_segments(self.segments(), other.segments()))
            .then_with(|| cmp_segments(self.local_segments(), other.local_segments()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.norm.as_ref())
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.norm)
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;
    use std::str::FromStr;

    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use rand::seq::SliceRandom;

    use super::Version;

    // Tests are inspired by: https://github.com/conda/conda/blob/main/tests/models/test_version.py

    #[test]
    fn valid_versions() {
        let versions = [
            "   0.4",
            "== 0.4.0",
            " < 0.4.1.rc",
            "== 0.4.1.RC",
            " < 0.4.1",
            " < 0.5a1",
            " < 0.5b3",
            " < 0.5C1",
            " < 0.5",
            " < 0.9.6",
            " < 0.960923",
            " < 1.0",
            " < 1.1dev1",
            " < 1.1a1",
            " < 1.1.0dev1",
            "== 1.1.dev1",
            " < 1.1.a1",
            " < 1.1.0rc1",
            " < 1.1.0",
            "== 1.1",
            " < 1.1.0post1",
            "== 1.1.post1",
            " < 1.1post1",
            " < 1996.07.12",
            " < 1!0.4.1",
            " < 1!3.1.1.6",
            " < 2!0.4.1",
        ];

        enum CmpOp {
            Less,
            Equal,
            Restart,
        }

        let ops = versions.iter().map(|&v| {
            let (op, version) = if let Some((op, version)) = v.trim().split_once(' ') {
                (op, version)
            } else {
                ("", v)
            };
            let version: Version = version.parse().unwrap();
            let op = match op {
                "<" => CmpOp::Less,
                "==" => CmpOp::Equal,
                _ => CmpOp::Restart,
            };
            (op, version)
        });

        let mut previous: Option<Version> = None;
        for (op, version) in ops {
            match op {
                CmpOp::Less => {
                    let comparison = previous.as_ref().map(|previous| previous.cmp(&version));
                    assert_eq!(
                        Some(Ordering::Less),
                        comparison,
                        "{:?} is not less than {}",
                        previous.as_ref().map(ToString::to_string),
                        version
                    );
                }
                CmpOp::Equal => {
                    let comparison = previous.as_ref().map(|previous| previous.cmp(&version));
                    assert_eq!(
                        Some(Ordering::Equal),
                        comparison,
                        "{:?} is not equal to {}",
                        previous.as_ref().map(ToString::to_string),
                        version
                    );
                }
                CmpOp::Restart => {}
            }
            previous = Some(version);
        }
    }

    #[test]
    fn star_is_the_minimal_atom() {
        // A trailing/standalone `*` is a version component in its own right (the glob forms like
        // `X.Y.*` are stripped before reaching `Version::from_str`; this is the raw atom used
        // directly in a version string, e.g. conda's own `0.5*` release marker) and sorts below
        // everything, including `dev`.
        let versions = [
            "0.4",
            "== 0.4.0",
            "< 0.4.1a",
            "< 0.4.1",
            "< 0.5*",
            "< 0.5a1",
            "< 0.5b3",
            "< 0.5",
            "< 1.0a1",
            "< 1.0",
            "< 1!0.4.1",
            "< 2!0.4.1",
        ];

        enum CmpOp {
            Less,
            Equal,
            Restart,
        }

        let ops = versions.iter().map(|&v| {
            let (op, version) = if let Some((op, version)) = v.trim().split_once(' ') {
                (op, version)
            } else {
                ("", v)
            };
            let version: Version = version.parse().unwrap();
            let op = match op {
                "<" => CmpOp::Less,
                "==" => CmpOp::Equal,
                _ => CmpOp::Restart,
            };
            (op, version)
        });

        let mut previous: Option<Version> = None;
        for (op, version) in ops {
            match op {
                CmpOp::Less => {
                    assert_eq!(
                        Some(Ordering::Less),
                        previous.as_ref().map(|previous| previous.cmp(&version)),
                        "{:?} is not less than {}",
                        previous.as_ref().map(ToString::to_string),
                        version
                    );
                }
                CmpOp::Equal => {
                    assert_eq!(
                        Some(Ordering::Equal),
                        previous.as_ref().map(|previous| previous.cmp(&version)),
                        "{:?} is not equal to {}",
                        previous.as_ref().map(ToString::to_string),
                        version
                    );
                }
                CmpOp::Restart => {}
            }
            previous = Some(version);
        }
    }

    #[test]
    fn openssl_convention() {
        let version_strs = [
            "1.0.1dev",
            "1.0.1_",
            "1.0.1a",
            "1.0.1b",
            "1.0.1c",
            "1.0.1d",
            "1.0.1r",
            "1.0.1rc",
            "1.0.1rc1",
            "1.0.1rc2",
            "1.0.1s",
            "1.0.1",
            "1.0.1post.a",
            "1.0.1post.b",
            "1.0.1post.z",
            "1.0.1post.za",
            "1.0.2",
        ];
        let parsed_versions: Vec<Version> =
            version_strs.iter().map(|v| v.parse().unwrap()).collect();
        let mut random_versions = parsed_versions.clone();
        random_versions.shuffle(&mut rand::thread_rng());
        random_versions.sort();
        assert_eq!(random_versions, parsed_versions);
    }

    #[test]
    fn starts_with() {
        assert!(Version::from_str("1.2.3")
            .unwrap()
            .starts_with(&Version::from_str("1.2").unwrap()));
        assert!(!Version::from_str("1.3.0")
            .unwrap()
            .starts_with(&Version::from_str("1.2").unwrap()));
    }

    #[test]
    fn compatible_with() {
        assert!(Version::from_str("1.2.5")
            .unwrap()
            .compatible_with(&Version::from_str("1.2.3").unwrap()));
        assert!(!Version::from_str("1.3.0")
            .unwrap()
            .compatible_with(&Version::from_str("1.2.3").unwrap()));
        assert!(!Version::from_str("1.1.9")
            .unwrap()
            .compatible_with(&Version::from_str("1.2.3").unwrap()));
    }

    #[test]
    fn bump() {
        assert_eq!(
            Version::from_str("1.1").unwrap().bump(1).unwrap(),
            Version::from_str("1.2").unwrap()
        );
        assert_eq!(
            Version::from_str("1.1.5").unwrap().bump(0).unwrap(),
            Version::from_str("2").unwrap()
        );
        assert!(Version::from_str("1.1").unwrap().bump(5).is_err());
    }

    fn get_hash(spec: &Version) -> u64 {
        let mut s = DefaultHasher::new();
        spec.hash(&mut s);
        s.finish()
    }

    #[test]
    fn hash() {
        let v1 = Version::from_str("1.2.0").unwrap();
        let vx2 = Version::from_str("1.2.0").unwrap();
        assert_eq!(get_hash(&v1), get_hash(&vx2));
        let vx2 = Version::from_str("1.2.0.0.0").unwrap();
        assert_eq!(get_hash(&v1), get_hash(&vx2));
        let vx2 = Version::from_str("1!1.2.0").unwrap();
        assert_ne!(get_hash(&v1), get_hash(&vx2));

        let v2 = Version::from_str("1.2.3").unwrap();
        assert_ne!(get_hash(&v1), get_hash(&v2));
    }

    #[test]
    fn as_major_minor() {
        assert_eq!(
            Version::from_str("1.2.3").unwrap().as_major_minor(),
            Some((1, 2))
        );
        assert_eq!(
            Version::from_str("5!1.2.3").unwrap().as_major_minor(),
            Some((1, 2))
        );
        assert_eq!(Version::from_str("1").unwrap().as_major_minor(), None);
    }

    #[test]
    fn canonical() {
        assert_eq!(Version::from_str("1.2.3").unwrap().canonical(), "1.2.3");
        assert_eq!(Version::from_str("1!1.2.3").unwrap().canonical(), "1!1.2.3");
        assert_eq!(
            Version::from_str("1.2.3-alpha.2").unwrap().canonical(),
            "1.2.3.alpha.2"
        );
    }
}
