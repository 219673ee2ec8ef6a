//! Lenient version parsing and total ordering.
//!
//! Release tags in the wild are messy: `v1.2.3`, `0.9.6-beta`, `1.0.0-rc.2`,
//! `nightly-20251122`. Parsing here never fails; anything unrecognizable
//! collapses to a sentinel low value so a garbage tag is never preferred over
//! a well-formed one. Ordering is total: a plain release outranks any
//! pre-release sharing its numeric core, and pre-release tags compare
//! component-wise, case-insensitively, with alphabetic identifiers ordering
//! before numeric ones.

use std::cmp::Ordering;

/// A parsed, totally ordered release version.
///
/// Constructed from a tag string via [`ReleaseVersion::parse`]; never mutated.
/// The original string is retained for display.
#[derive(Debug, Clone)]
pub struct ReleaseVersion {
    raw: String,
    core: [u64; 3],
    pre: Option<String>,
}

impl ReleaseVersion {
    /// Parse a version from a tag string. Never fails.
    ///
    /// A single leading `v`/`V` is stripped, build metadata after `+` is
    /// ignored, the numeric core is padded to three components (and truncated
    /// past three), and everything after the first `-` is the pre-release tag.
    /// Non-numeric core components keep their leading digit run, or become 0.
    ///
    /// Date-stamped tags with a digit-less core (`nightly-20251122`) take the
    /// first digit run of the pre-release tag as their major component, so a
    /// fresh nightly outranks the stable release it was cut after.
    pub fn parse(tag: &str) -> Self {
        let raw = tag.to_string();
        let trimmed = tag.trim();
        let stripped = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let no_meta = stripped.split('+').next().unwrap_or_default();

        let (core_str, pre) = match no_meta.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (no_meta, None),
        };

        let mut core = [0u64; 3];
        for (slot, component) in core.iter_mut().zip(core_str.split('.')) {
            *slot = leading_digits(component);
        }

        // Digit-less cores (nightly/date dialects) order by the numeric run
        // in their pre-release tag.
        if !core_str.chars().any(|c| c.is_ascii_digit()) {
            if let Some(pre) = &pre {
                if let Some(run) = pre
                    .split(|c: char| !c.is_ascii_digit())
                    .find(|run| !run.is_empty())
                {
                    core[0] = run.parse().unwrap_or(0);
                }
            }
        }

        Self { raw, core, pre }
    }

    /// Whether this version carries a pre-release tag.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// The original tag string this version was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Strip a single leading `v`/`V` from a tag when it prefixes a digit
/// (`v0.9.5` becomes `0.9.5`; `nightly-20251122` is untouched).
pub fn strip_tag_prefix(tag: &str) -> &str {
    match tag.strip_prefix('v').or_else(|| tag.strip_prefix('V')) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => tag,
    }
}

fn leading_digits(component: &str) -> u64 {
    let digits: &str = component
        .split_once(|c: char| !c.is_ascii_digit())
        .map_or(component, |(head, _)| head);
    digits.parse().unwrap_or(0)
}

impl From<&str> for ReleaseVersion {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl std::fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let key = |v: &Self| (v.core, u8::from(v.pre.is_none()));
        match key(self).cmp(&key(other)) {
            Ordering::Equal => match (&self.pre, &other.pre) {
                (Some(a), Some(b)) => cmp_prerelease(a, b),
                _ => Ordering::Equal,
            },
            ord => ord,
        }
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReleaseVersion {}

/// Compare two pre-release tags component-wise (split on `.`), ignoring case.
fn cmp_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match cmp_identifier(x, y) {
                Ordering::Equal => {}
                ord => return ord,
            },
        }
    }
}

/// A run of digits or a run of non-digits within a pre-release identifier.
#[derive(Debug, PartialEq, Eq)]
enum Run<'a> {
    Alpha(&'a str),
    Numeric(u64),
}

/// Compare identifiers run-by-run so `beta2 < beta10` while alphabetic runs
/// still order before numeric ones (`alpha < 1`).
fn cmp_identifier(a: &str, b: &str) -> Ordering {
    let mut left = runs(a);
    let mut right = runs(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Run::Alpha(p), Run::Alpha(q)) => {
                        let p = p.to_ascii_lowercase();
                        let q = q.to_ascii_lowercase();
                        p.cmp(&q)
                    }
                    (Run::Numeric(p), Run::Numeric(q)) => p.cmp(&q),
                    (Run::Alpha(_), Run::Numeric(_)) => Ordering::Less,
                    (Run::Numeric(_), Run::Alpha(_)) => Ordering::Greater,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn runs(identifier: &str) -> impl Iterator<Item = Run<'_>> {
    let bytes = identifier.as_bytes();
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= bytes.len() {
            return None;
        }
        let digit = bytes[start].is_ascii_digit();
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() == digit {
            end += 1;
        }
        let run = &identifier[start..end];
        start = end;
        Some(if digit {
            Run::Numeric(run.parse().unwrap_or(0))
        } else {
            Run::Alpha(run)
        })
    })
}
