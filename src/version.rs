//! Version parsing and ordering across tagging conventions
//!
//! Upstream projects tag their releases inconsistently, so parsing never fails:
//! - Calendar versions (`20230105`, `2023-01-05`) compare as dates
//! - Semantic versions (`1.2.3`, `v2.0-rc1`, `curl-7_75_0`) compare numerically
//! - Anything else falls back to lexical comparison of the raw string
//!
//! Across schemes the order is lexical < semantic < calendar.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use semver::Prerelease;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Tag prefixes such as `v`, `release-`, `curl-` or `R_` in front of the first digit
static TAG_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[vV]|[A-Za-z][A-Za-z0-9]*(?:[-_][A-Za-z][A-Za-z0-9]*)*[-_][vV]?)(\d.*)$")
        .expect("valid tag prefix regex")
});

/// Numeric components separated by underscores (`7_75_0`)
static UNDERSCORE_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:_\d+)+$").expect("valid underscore regex"));

static CALENDAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(?:(\d{2})(\d{2})|([-.])(\d{2})[-.](\d{2}))$").expect("valid calendar regex")
});

static SEMANTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+(?:\.\d+){0,3})(?:-([0-9A-Za-z][0-9A-Za-z.-]*)|\.?([A-Za-z][0-9A-Za-z.-]*))?(?:\+[0-9A-Za-z.-]+)?$",
    )
    .expect("valid semantic regex")
});

/// Earliest year accepted as a calendar version
const MIN_CALENDAR_YEAR: i32 = 1990;

/// Latest year accepted as a calendar version
const MAX_CALENDAR_YEAR: i32 = 2200;

/// Versioning convention a string was recognized as
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Unrecognized format, compared by raw string
    Lexical,
    /// Numeric components with optional pre-release
    Semantic,
    /// Date-based version
    Calendar,
}

#[derive(Debug, Clone)]
enum Parsed {
    Semantic { release: Vec<u64>, pre: Prerelease },
    Calendar(NaiveDate),
    Lexical,
}

/// A parsed, totally ordered version
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    normalized: String,
    parsed: Parsed,
}

/// Identifier of a tracked version line (`1.x`, `date`, `other`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Create a line identifier from its display form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Version {
    /// Parse a version string. Never fails; unknown shapes become lexical.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = TAG_PREFIX
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(trimmed);
        let body = if UNDERSCORE_NUMERIC.is_match(body) {
            body.replace('_', ".")
        } else {
            body.to_string()
        };

        if let Some(date) = parse_calendar(&body) {
            return Self {
                raw: raw.to_string(),
                normalized: body,
                parsed: Parsed::Calendar(date),
            };
        }

        if let Some((release, pre)) = parse_semantic(&body) {
            return Self {
                raw: raw.to_string(),
                normalized: body,
                parsed: Parsed::Semantic { release, pre },
            };
        }

        Self {
            raw: raw.to_string(),
            normalized: trimmed.to_string(),
            parsed: Parsed::Lexical,
        }
    }

    /// The string this version was parsed from (e.g. the upstream tag)
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The version with tag prefixes stripped, used as the recipe pin key
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Returns the recognized scheme
    pub fn scheme(&self) -> Scheme {
        match self.parsed {
            Parsed::Semantic { .. } => Scheme::Semantic,
            Parsed::Calendar(_) => Scheme::Calendar,
            Parsed::Lexical => Scheme::Lexical,
        }
    }

    /// Returns true for semantic versions carrying a pre-release segment
    pub fn is_prerelease(&self) -> bool {
        matches!(&self.parsed, Parsed::Semantic { pre, .. } if !pre.is_empty())
    }

    /// The line this version belongs to
    pub fn line(&self) -> LineId {
        match &self.parsed {
            Parsed::Semantic { release, .. } => LineId(format!("{}.x", release[0])),
            Parsed::Calendar(_) => LineId::new("date"),
            Parsed::Lexical => LineId::new("other"),
        }
    }

    /// Total order across all schemes
    pub fn compare(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (
                Parsed::Semantic { release: ra, pre: pa },
                Parsed::Semantic { release: rb, pre: pb },
            ) => compare_release(ra, rb).then_with(|| compare_prerelease(pa, pb)),
            (Parsed::Calendar(a), Parsed::Calendar(b)) => a.cmp(b),
            (Parsed::Lexical, Parsed::Lexical) => self.raw.cmp(&other.raw),
            _ => self.scheme().cmp(&other.scheme()),
        }
    }
}

fn parse_calendar(body: &str) -> Option<NaiveDate> {
    let caps = CALENDAR.captures(body)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let (month, day) = match (caps.get(2), caps.get(3)) {
        (Some(m), Some(d)) => (m.as_str(), d.as_str()),
        _ => (caps.get(5)?.as_str(), caps.get(6)?.as_str()),
    };
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;
    if (MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&date.year()) {
        Some(date)
    } else {
        None
    }
}

fn parse_semantic(body: &str) -> Option<(Vec<u64>, Prerelease)> {
    let caps = SEMANTIC.captures(body)?;
    let release = caps
        .get(1)?
        .as_str()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let pre = match caps.get(2).or_else(|| caps.get(3)) {
        Some(m) => Prerelease::new(m.as_str().trim_end_matches(['.', '-'])).ok()?,
        None => Prerelease::EMPTY,
    };
    Some((release, pre))
}

fn compare_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_prerelease(a: &Prerelease, b: &Prerelease) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Version::parse(raw)
    }
}
