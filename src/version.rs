//! macOS release ordering and the inclusive ranges that gate default settings.
//!
//! [`MacVersion`] is totally ordered by release date, so a value built from a
//! name token compares correctly against one built from a dotted version
//! string.  [`VersionRange`] treats a missing bound as unbounded in that
//! direction.
use std::fmt;
use std::str::FromStr;

use crate::error::VersionError;

/// A named macOS release.
///
/// Variant order is release order; the derived [`Ord`] relies on it.
///
/// # Examples
///
/// ```
/// use dotmodules::version::MacVersion;
///
/// let sierra = MacVersion::from_name("SIERRA").unwrap();
/// let mojave = MacVersion::from_version_str("10.14.6").unwrap();
/// assert!(sierra < mojave);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MacVersion {
    /// 10.10
    Yosemite,
    /// 10.11
    ElCapitan,
    /// 10.12
    Sierra,
    /// 10.13
    HighSierra,
    /// 10.14
    Mojave,
    /// 10.15
    Catalina,
    /// 11
    BigSur,
    /// 12
    Monterey,
    /// 13
    Ventura,
    /// 14
    Sonoma,
    /// 15
    Sequoia,
}

impl MacVersion {
    /// Every known release, oldest first.
    pub const ALL: [Self; 11] = [
        Self::Yosemite,
        Self::ElCapitan,
        Self::Sierra,
        Self::HighSierra,
        Self::Mojave,
        Self::Catalina,
        Self::BigSur,
        Self::Monterey,
        Self::Ventura,
        Self::Sonoma,
        Self::Sequoia,
    ];

    /// Look up a release by its name token, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::UnknownVersionName`] if no release uses `token`.
    pub fn from_name(token: &str) -> Result<Self, VersionError> {
        Self::ALL
            .into_iter()
            .find(|v| v.token().eq_ignore_ascii_case(token))
            .ok_or_else(|| VersionError::UnknownVersionName(token.to_string()))
    }

    /// Look up the release matching a structured version, ignoring the patch
    /// component.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::UnsupportedVersionString`] if the
    /// `(major, minor)` pair belongs to no known release.
    pub fn from_version(version: &OsVersion) -> Result<Self, VersionError> {
        Self::ALL
            .into_iter()
            .find(|v| {
                let (major, minor) = v.numbers();
                major == version.major && minor.is_none_or(|m| m == version.minor)
            })
            .ok_or_else(|| VersionError::UnsupportedVersionString(version.to_string()))
    }

    /// Parse a dotted `major.minor[.patch]` string and look up its release.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::UnsupportedVersionString`] if the string is not
    /// a dotted version or names no known release.
    pub fn from_version_str(version: &str) -> Result<Self, VersionError> {
        Self::from_version(&version.parse()?)
    }

    /// The lowercase name token used in settings documents (e.g. `high_sierra`).
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Yosemite => "yosemite",
            Self::ElCapitan => "el_capitan",
            Self::Sierra => "sierra",
            Self::HighSierra => "high_sierra",
            Self::Mojave => "mojave",
            Self::Catalina => "catalina",
            Self::BigSur => "big_sur",
            Self::Monterey => "monterey",
            Self::Ventura => "ventura",
            Self::Sonoma => "sonoma",
            Self::Sequoia => "sequoia",
        }
    }

    /// `(major, minor)`; releases from 11 onward are identified by major alone.
    const fn numbers(self) -> (u32, Option<u32>) {
        match self {
            Self::Yosemite => (10, Some(10)),
            Self::ElCapitan => (10, Some(11)),
            Self::Sierra => (10, Some(12)),
            Self::HighSierra => (10, Some(13)),
            Self::Mojave => (10, Some(14)),
            Self::Catalina => (10, Some(15)),
            Self::BigSur => (11, None),
            Self::Monterey => (12, None),
            Self::Ventura => (13, None),
            Self::Sonoma => (14, None),
            Self::Sequoia => (15, None),
        }
    }

    const fn display_name(self) -> &'static str {
        match self {
            Self::Yosemite => "Yosemite",
            Self::ElCapitan => "El Capitan",
            Self::Sierra => "Sierra",
            Self::HighSierra => "High Sierra",
            Self::Mojave => "Mojave",
            Self::Catalina => "Catalina",
            Self::BigSur => "Big Sur",
            Self::Monterey => "Monterey",
            Self::Ventura => "Ventura",
            Self::Sonoma => "Sonoma",
            Self::Sequoia => "Sequoia",
        }
    }
}

impl fmt::Display for MacVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for MacVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// A structured `major.minor[.patch]` operating-system version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsVersion {
    /// Major component.
    pub major: u32,
    /// Minor component (`0` when the source string had none).
    pub minor: u32,
    /// Patch component, if present.
    pub patch: Option<u32>,
}

impl OsVersion {
    /// Build a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: Option<u32>) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for OsVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || VersionError::UnsupportedVersionString(s.to_string());
        let parts = s
            .trim()
            .split('.')
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| unsupported())?;
        match parts.as_slice() {
            [major] => Ok(Self::new(*major, 0, None)),
            [major, minor] => Ok(Self::new(*major, *minor, None)),
            [major, minor, patch] => Ok(Self::new(*major, *minor, Some(*patch))),
            _ => Err(unsupported()),
        }
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        Ok(())
    }
}

/// An inclusive range of releases; a missing bound is unbounded.
///
/// # Examples
///
/// ```
/// use dotmodules::version::{MacVersion, VersionRange};
///
/// let range = VersionRange::new(Some(MacVersion::Sierra), None).unwrap();
/// assert!(range.is_in_range(MacVersion::Sierra));
/// assert!(range.is_in_range(MacVersion::Mojave));
/// assert!(!range.is_in_range(MacVersion::ElCapitan));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionRange {
    start: Option<MacVersion>,
    end: Option<MacVersion>,
}

impl VersionRange {
    /// Build a range, rejecting one whose start is after its end.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvertedRange`] if both bounds are set and
    /// `start > end`.
    pub fn new(start: Option<MacVersion>, end: Option<MacVersion>) -> Result<Self, VersionError> {
        if let (Some(s), Some(e)) = (start, end)
            && s > e
        {
            return Err(VersionError::InvertedRange { start: s, end: e });
        }
        Ok(Self { start, end })
    }

    /// A range that admits every release.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Build a range from optional release-name tokens.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidRangeBound`] if a token names no release,
    /// or [`VersionError::InvertedRange`] if the bounds are out of order.
    pub fn from_tokens(start: Option<&str>, end: Option<&str>) -> Result<Self, VersionError> {
        let bound = |token: Option<&str>| {
            token
                .map(|t| {
                    MacVersion::from_name(t)
                        .map_err(|_| VersionError::InvalidRangeBound(t.to_string()))
                })
                .transpose()
        };
        Self::new(bound(start)?, bound(end)?)
    }

    /// Lower bound, if any.
    #[must_use]
    pub const fn start(&self) -> Option<MacVersion> {
        self.start
    }

    /// Upper bound, if any.
    #[must_use]
    pub const fn end(&self) -> Option<MacVersion> {
        self.end
    }

    /// Whether `version` lies within the range, bounds included.
    #[must_use]
    pub fn is_in_range(&self, version: MacVersion) -> bool {
        self.start.is_none_or(|s| s <= version) && self.end.is_none_or(|e| version <= e)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |b: Option<MacVersion>| b.map_or_else(|| "*".to_string(), |v| v.to_string());
        write!(f, "{}..={}", show(self.start), show(self.end))
    }
}
