//! Package version ordering.
//!
//! Versions are compared component-wise: the string is split on `.` (with `-`
//! and `_` treated as `.`), each component is split into numeric and
//! alphabetic runs, and runs are compared pairwise with missing runs padded by
//! `0`. Alphabetic runs sort before numbers, `dev` sorts before every other
//! run and `post` after every other run, so `1.0rc1 < 1.0 < 1.0.post1`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("empty version string")]
    Empty,
    #[error("invalid character '{ch}' in version '{raw}'")]
    InvalidChar { raw: String, ch: char },
    #[error("invalid epoch in version '{0}'")]
    InvalidEpoch(String),
}

/// A single run inside a version component.
///
/// Variant order defines the run ordering: `Dev < Str < Num < Post`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Run {
    Dev,
    Str(String),
    Num(u64),
    Post,
}

const ZERO: Run = Run::Num(0);

/// A parsed, totally ordered package version.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
    epoch: u64,
    components: Vec<Vec<Run>>,
    local: Vec<Vec<Run>>,
}

impl PackageVersion {
    pub fn parse(raw: &str) -> Result<Self, VersionParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }
        let normalized = trimmed.to_lowercase().replace(['-', '_'], ".");
        if let Some(ch) = normalized
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | '!')))
        {
            return Err(VersionParseError::InvalidChar {
                raw: trimmed.to_string(),
                ch,
            });
        }

        let (epoch, rest) = match normalized.split_once('!') {
            Some((epoch, rest)) => {
                let epoch = epoch
                    .parse::<u64>()
                    .map_err(|_| VersionParseError::InvalidEpoch(trimmed.to_string()))?;
                (epoch, rest)
            }
            None => (0, normalized.as_str()),
        };
        let (main, local) = match rest.split_once('+') {
            Some((main, local)) => (main, local),
            None => (rest, ""),
        };
        if main.is_empty() {
            return Err(VersionParseError::Empty);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            epoch,
            components: split_components(main),
            local: split_components(local),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn split_components(segment: &str) -> Vec<Vec<Run>> {
    segment
        .split('.')
        .filter(|part| !part.is_empty())
        .map(split_runs)
        .collect()
}

fn split_runs(component: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = None;
    for ch in component.chars() {
        let is_digit = ch.is_ascii_digit();
        if current_is_digit.is_some_and(|prev| prev != is_digit) {
            runs.push(to_run(&current));
            current.clear();
        }
        current.push(ch);
        current_is_digit = Some(is_digit);
    }
    if !current.is_empty() {
        runs.push(to_run(&current));
    }
    // A component that starts with letters sorts as if it had a leading zero,
    // so `1.0.rc1` and `1.0rc1` compare the same way against `1.0`.
    if matches!(runs.first(), Some(Run::Str(_) | Run::Dev | Run::Post)) {
        runs.insert(0, ZERO);
    }
    runs
}

fn to_run(text: &str) -> Run {
    if text.chars().all(|ch| ch.is_ascii_digit()) {
        return Run::Num(text.parse().unwrap_or(u64::MAX));
    }
    match text {
        "dev" => Run::Dev,
        "post" => Run::Post,
        other => Run::Str(other.to_string()),
    }
}

fn cmp_components(left: &[Vec<Run>], right: &[Vec<Run>]) -> Ordering {
    let zero_component = vec![ZERO];
    let len = left.len().max(right.len());
    for idx in 0..len {
        let l = left.get(idx).unwrap_or(&zero_component);
        let r = right.get(idx).unwrap_or(&zero_component);
        let ord = cmp_runs(l, r);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn cmp_runs(left: &[Run], right: &[Run]) -> Ordering {
    let len = left.len().max(right.len());
    for idx in 0..len {
        let l = left.get(idx).unwrap_or(&ZERO);
        let r = right.get(idx).unwrap_or(&ZERO);
        let ord = l.cmp(r);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_components(&self.components, &other.components))
            .then_with(|| cmp_components(&self.local, &other.local))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl FromStr for PackageVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// True if `candidate` sorts strictly after `current`.
pub fn is_newer(candidate: &str, current: &str) -> Result<bool, VersionParseError> {
    Ok(PackageVersion::parse(candidate)? > PackageVersion::parse(current)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> PackageVersion {
        PackageVersion::parse(raw).expect("parse version")
    }

    #[test]
    fn numeric_components_compare_numerically() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0") > v("1.99.99"));
        assert!(v("0.13") < v("0.14.0"));
    }

    #[test]
    fn trailing_zero_components_are_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0"));
    }

    #[test]
    fn hyphen_and_underscore_act_as_dots() {
        assert_eq!(v("2021-05-01"), v("2021.05.01"));
        assert_eq!(v("1_2_3"), v("1.2.3"));
    }

    #[test]
    fn prerelease_sorts_before_release() {
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0a1") < v("1.0b1"));
        assert!(v("1.0.rc1") < v("1.0"));
    }

    #[test]
    fn dev_and_post_are_extremes() {
        assert!(v("1.0dev1") < v("1.0a1"));
        assert!(v("1.0.dev1") < v("1.0"));
        assert!(v("1.0.post1") > v("1.0"));
        assert!(v("1.0.post1") < v("1.1"));
    }

    #[test]
    fn alphabetic_suffix_increments_sort_up() {
        assert!(v("9e") > v("9d"));
        assert!(v("9e") < v("10"));
    }

    #[test]
    fn epoch_dominates() {
        assert!(v("1!0.1") > v("2.0"));
    }

    #[test]
    fn local_version_breaks_ties_only() {
        assert!(v("1.0+2") > v("1.0+1"));
        assert!(v("1.0+9") < v("1.1"));
    }

    #[test]
    fn comparison_is_case_insensitive() {
        assert_eq!(v("1.0RC1"), v("1.0rc1"));
    }

    #[test]
    fn rejects_empty_and_invalid() {
        assert_eq!(PackageVersion::parse("  "), Err(VersionParseError::Empty));
        assert!(matches!(
            PackageVersion::parse("1.0 beta"),
            Err(VersionParseError::InvalidChar { ch: ' ', .. })
        ));
        assert!(matches!(
            PackageVersion::parse("x!1.0"),
            Err(VersionParseError::InvalidEpoch(_))
        ));
    }

    #[test]
    fn is_newer_is_strict() {
        assert!(is_newer("1.1", "1.0").expect("compare"));
        assert!(!is_newer("1.0", "1.0").expect("compare"));
        assert!(!is_newer("1.0", "1.1").expect("compare"));
    }

    #[test]
    fn display_keeps_original_text() {
        assert_eq!(v(" 1.2-3 ").to_string(), "1.2-3");
    }
}
