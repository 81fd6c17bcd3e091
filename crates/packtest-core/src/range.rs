//! Package-manager version ranges and range intersection
//!
//! Ranges use the npm grammar, parsed loosely:
//!
//! ```text
//! range-set  ::= range ( '||' range )*
//! range      ::= hyphen | simple ( ' ' simple )* | ''
//! hyphen     ::= partial ' - ' partial
//! simple     ::= ( '<' | '<=' | '>' | '>=' | '=' | '~' | '~>' | '^' )? partial
//! partial    ::= xr ( '.' xr ( '.' xr pre? build? )? )?
//! xr         ::= 'x' | 'X' | '*' | number
//! ```
//!
//! Every range desugars to a union of comparator sets, each set being a
//! single interval of versions. Two ranges intersect when some pair of
//! their intervals overlaps.

use semver::{BuildMetadata, Prerelease, Version};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Invalid comparator '{0}'")]
    InvalidComparator(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Op::Eq => "",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Eq => version == &self.version,
            Op::Gt => version > &self.version,
            Op::Gte => version >= &self.version,
            Op::Lt => version < &self.version,
            Op::Lte => version <= &self.version,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// Conjunction of comparators; empty means any version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparatorSet {
    pub comparators: Vec<Comparator>,
}

/// One end of an interval.
#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

impl ComparatorSet {
    pub fn matches(&self, version: &Version) -> bool {
        self.comparators.iter().all(|c| c.matches(version))
    }

    /// Whether any version satisfies every comparator of the set.
    pub fn is_satisfiable(&self) -> bool {
        let mut lower = Bound {
            version: lowest_version(),
            inclusive: true,
        };
        let mut upper: Option<Bound> = None;

        for comparator in &self.comparators {
            let (is_lower, is_upper, inclusive) = match comparator.op {
                Op::Eq => (true, true, true),
                Op::Gt => (true, false, false),
                Op::Gte => (true, false, true),
                Op::Lt => (false, true, false),
                Op::Lte => (false, true, true),
            };
            if is_lower {
                match comparator.version.cmp(&lower.version) {
                    Ordering::Greater => {
                        lower = Bound {
                            version: comparator.version.clone(),
                            inclusive,
                        }
                    }
                    Ordering::Equal => lower.inclusive &= inclusive,
                    Ordering::Less => {}
                }
            }
            if is_upper {
                upper = match upper.take() {
                    None => Some(Bound {
                        version: comparator.version.clone(),
                        inclusive,
                    }),
                    Some(current) => match comparator.version.cmp(&current.version) {
                        Ordering::Less => Some(Bound {
                            version: comparator.version.clone(),
                            inclusive,
                        }),
                        Ordering::Equal => Some(Bound {
                            inclusive: current.inclusive && inclusive,
                            ..current
                        }),
                        Ordering::Greater => Some(current),
                    },
                };
            }
        }

        match upper {
            None => true,
            Some(upper) => match lower.version.cmp(&upper.version) {
                Ordering::Less => true,
                Ordering::Equal => lower.inclusive && upper.inclusive,
                Ordering::Greater => false,
            },
        }
    }

    fn intersect(&self, other: &ComparatorSet) -> ComparatorSet {
        let mut comparators = self.comparators.clone();
        comparators.extend(other.comparators.iter().cloned());
        ComparatorSet { comparators }
    }
}

impl fmt::Display for ComparatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparators.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self.comparators.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// A parsed range: a union of comparator sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub sets: Vec<ComparatorSet>,
}

impl VersionRange {
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let sets = input
            .split("||")
            .map(parse_comparator_set)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { sets })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| set.matches(version))
    }

    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.sets.iter().any(|ours| {
            ours.is_satisfiable()
                && other
                    .sets
                    .iter()
                    .any(|theirs| ours.intersect(theirs).is_satisfiable())
        })
    }
}

impl FromStr for VersionRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.sets.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(" || "))
    }
}

/// Whether two range strings admit a common version.
pub fn ranges_intersect(a: &str, b: &str) -> Result<bool, RangeError> {
    Ok(VersionRange::parse(a)?.intersects(&VersionRange::parse(b)?))
}

/// `0.0.0-0`, below every other version.
fn lowest_version() -> Version {
    with_zero_pre(0, 0, 0)
}

/// `n + 1`, or an error when the component is already at `u64::MAX`.
fn bump(n: u64) -> Result<u64, RangeError> {
    n.checked_add(1)
        .ok_or_else(|| RangeError::InvalidVersion(n.to_string()))
}

fn with_zero_pre(major: u64, minor: u64, patch: u64) -> Version {
    Version {
        major,
        minor,
        patch,
        pre: Prerelease::new("0").unwrap_or(Prerelease::EMPTY),
        build: BuildMetadata::EMPTY,
    }
}

/// A version with possibly missing (wildcard) components.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn is_any(&self) -> bool {
        self.major.is_none()
    }

    /// Missing components filled with zero.
    fn floor(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
            build: BuildMetadata::EMPTY,
        }
    }

    /// Exclusive upper bound of the versions this partial stands for,
    /// `None` when it is a full version.
    fn ceiling(&self) -> Result<Option<Version>, RangeError> {
        Ok(match (self.major, self.minor, self.patch) {
            (Some(major), None, _) => Some(with_zero_pre(bump(major)?, 0, 0)),
            (Some(major), Some(minor), None) => Some(with_zero_pre(major, bump(minor)?, 0)),
            _ => None,
        })
    }
}

fn parse_partial(input: &str) -> Result<Partial, RangeError> {
    let invalid = || RangeError::InvalidVersion(input.to_string());
    let trimmed = input.trim().trim_start_matches(['=', 'v', 'V']);

    if trimmed.is_empty() {
        return Ok(Partial {
            major: None,
            minor: None,
            patch: None,
            pre: Prerelease::EMPTY,
        });
    }

    let without_build = trimmed.split('+').next().unwrap_or(trimmed);
    let (core, pre) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (without_build, None),
    };

    let mut parts = core.split('.');
    let mut next = || -> Result<Option<u64>, RangeError> {
        match parts.next() {
            None | Some("x") | Some("X") | Some("*") => Ok(None),
            Some(n) => n.parse::<u64>().map(Some).map_err(|_| invalid()),
        }
    };
    let major = next()?;
    let minor = major.and(next()?);
    let patch = minor.and(next()?);
    if parts.next().is_some() {
        return Err(invalid());
    }

    let pre = match (pre, patch) {
        (Some(pre), Some(_)) => Prerelease::new(pre).map_err(|_| invalid())?,
        (Some(_), None) => return Err(invalid()),
        (None, _) => Prerelease::EMPTY,
    };

    Ok(Partial {
        major,
        minor,
        patch,
        pre,
    })
}

fn parse_comparator_set(input: &str) -> Result<ComparatorSet, RangeError> {
    let tokens: Vec<&str> = input.split_whitespace().collect();

    if tokens.len() == 3 && tokens[1] == "-" {
        return hyphen_range(tokens[0], tokens[2]);
    }

    // Rejoin operators separated from their version ("> 1.2").
    let mut simples = Vec::new();
    let mut pending_op = String::new();
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        simples.push(format!("{}{}", pending_op, token));
        pending_op.clear();
    }
    if !pending_op.is_empty() {
        return Err(RangeError::InvalidComparator(pending_op));
    }

    let mut comparators = Vec::new();
    for simple in &simples {
        comparators.extend(desugar(simple)?);
    }
    Ok(ComparatorSet { comparators })
}

fn hyphen_range(from: &str, to: &str) -> Result<ComparatorSet, RangeError> {
    let from = parse_partial(from)?;
    let to = parse_partial(to)?;
    let mut comparators = Vec::new();
    if !from.is_any() {
        comparators.push(Comparator::new(Op::Gte, from.floor()));
    }
    if !to.is_any() {
        comparators.push(match to.ceiling()? {
            Some(ceiling) => Comparator::new(Op::Lt, ceiling),
            None => Comparator::new(Op::Lte, to.floor()),
        });
    }
    Ok(ComparatorSet { comparators })
}

fn desugar(simple: &str) -> Result<Vec<Comparator>, RangeError> {
    const OPERATORS: [&str; 8] = [">=", "<=", "~>", ">", "<", "=", "~", "^"];
    let (op, rest) = OPERATORS
        .iter()
        .find_map(|op| simple.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", simple));
    if rest.starts_with(['<', '>', '~', '^']) {
        return Err(RangeError::InvalidComparator(simple.to_string()));
    }

    let partial = parse_partial(rest)?;
    let nothing = || vec![Comparator::new(Op::Lt, lowest_version())];

    if partial.is_any() {
        return Ok(match op {
            ">" | "<" => nothing(),
            _ => Vec::new(),
        });
    }

    let floor = partial.floor();
    let ceiling = partial.ceiling()?;

    let comparators = match op {
        "" | "=" => match ceiling {
            Some(ceiling) => vec![
                Comparator::new(Op::Gte, floor),
                Comparator::new(Op::Lt, ceiling),
            ],
            None => vec![Comparator::new(Op::Eq, floor)],
        },
        ">" => match (partial.major, partial.minor) {
            (Some(major), None) => vec![Comparator::new(Op::Gte, Version::new(bump(major)?, 0, 0))],
            (Some(major), Some(minor)) if partial.patch.is_none() => {
                vec![Comparator::new(Op::Gte, Version::new(major, bump(minor)?, 0))]
            }
            _ => vec![Comparator::new(Op::Gt, floor)],
        },
        ">=" => vec![Comparator::new(Op::Gte, floor)],
        "<" => match ceiling {
            Some(_) => vec![Comparator::new(
                Op::Lt,
                with_zero_pre(floor.major, floor.minor, floor.patch),
            )],
            None => vec![Comparator::new(Op::Lt, floor)],
        },
        "<=" => match ceiling {
            Some(ceiling) => vec![Comparator::new(Op::Lt, ceiling)],
            None => vec![Comparator::new(Op::Lte, floor)],
        },
        "~" | "~>" => {
            let upper = match partial.minor {
                None => with_zero_pre(bump(floor.major)?, 0, 0),
                Some(minor) => with_zero_pre(floor.major, bump(minor)?, 0),
            };
            vec![
                Comparator::new(Op::Gte, floor),
                Comparator::new(Op::Lt, upper),
            ]
        }
        "^" => {
            let upper = caret_ceiling(&partial, &floor)?;
            vec![
                Comparator::new(Op::Gte, floor),
                Comparator::new(Op::Lt, upper),
            ]
        }
        _ => return Err(RangeError::InvalidComparator(simple.to_string())),
    };
    Ok(comparators)
}

/// Exclusive upper bound of a caret range: the left-most non-zero
/// component may not change.
fn caret_ceiling(partial: &Partial, floor: &Version) -> Result<Version, RangeError> {
    Ok(match (partial.minor, partial.patch) {
        (None, _) => with_zero_pre(bump(floor.major)?, 0, 0),
        (Some(_), None) if floor.major == 0 => with_zero_pre(0, bump(floor.minor)?, 0),
        (Some(_), None) => with_zero_pre(bump(floor.major)?, 0, 0),
        (Some(_), Some(_)) if floor.major > 0 => with_zero_pre(bump(floor.major)?, 0, 0),
        (Some(_), Some(_)) if floor.minor > 0 => with_zero_pre(0, bump(floor.minor)?, 0),
        (Some(_), Some(_)) => with_zero_pre(0, 0, bump(floor.patch)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn intersects(a: &str, b: &str) -> bool {
        ranges_intersect(a, b).unwrap()
    }

    #[test]
    fn test_caret_ranges() {
        let range = VersionRange::parse("^1.2.3").unwrap();
        assert!(range.matches(&v("1.2.3")));
        assert!(range.matches(&v("1.9.0")));
        assert!(!range.matches(&v("2.0.0")));
        assert!(!range.matches(&v("1.2.2")));

        let zero_minor = VersionRange::parse("^0.2.3").unwrap();
        assert!(zero_minor.matches(&v("0.2.9")));
        assert!(!zero_minor.matches(&v("0.3.0")));

        let zero_patch = VersionRange::parse("^0.0.3").unwrap();
        assert!(zero_patch.matches(&v("0.0.3")));
        assert!(!zero_patch.matches(&v("0.0.4")));

        let partial = VersionRange::parse("^0.x").unwrap();
        assert!(partial.matches(&v("0.9.9")));
        assert!(!partial.matches(&v("1.0.0")));
    }

    #[test]
    fn test_tilde_and_x_ranges() {
        let tilde = VersionRange::parse("~1.2.3").unwrap();
        assert!(tilde.matches(&v("1.2.9")));
        assert!(!tilde.matches(&v("1.3.0")));

        let tilde_major = VersionRange::parse("~1").unwrap();
        assert!(tilde_major.matches(&v("1.9.0")));

        let x = VersionRange::parse("1.x").unwrap();
        assert!(x.matches(&v("1.4.0")));
        assert!(!x.matches(&v("2.0.0")));

        let any = VersionRange::parse("*").unwrap();
        assert!(any.matches(&v("42.0.0")));
        assert!(VersionRange::parse("").unwrap().matches(&v("0.0.1")));
    }

    #[test]
    fn test_primitive_partials() {
        assert_eq!(VersionRange::parse(">1.2").unwrap().to_string(), ">=1.3.0");
        assert_eq!(VersionRange::parse("<1.2").unwrap().to_string(), "<1.2.0-0");
        assert_eq!(VersionRange::parse("<=1.2").unwrap().to_string(), "<1.3.0-0");
        assert_eq!(VersionRange::parse(">= 1.2.3").unwrap().to_string(), ">=1.2.3");
        assert_eq!(VersionRange::parse("=v1.2.3").unwrap().to_string(), "1.2.3");
    }

    #[test]
    fn test_hyphen_ranges() {
        let range = VersionRange::parse("1.2.3 - 2.3.4").unwrap();
        assert_eq!(range.to_string(), ">=1.2.3 <=2.3.4");

        let partial = VersionRange::parse("1.2 - 2").unwrap();
        assert_eq!(partial.to_string(), ">=1.2.0 <3.0.0-0");
    }

    #[test]
    fn test_intersection() {
        assert!(!intersects("^3.1.8", "^5.2.1"));
        assert!(intersects("^3.1.8", "^3.2.8"));
        assert!(!intersects("^2.1.8", "^3.0.0"));
        assert!(intersects(">=1.0.0 <2.0.0 || >=3.0.0", "^3.4.0"));
        assert!(!intersects("1.2.3", "1.2.4"));
        assert!(intersects("1.2.3", "1.x"));
        assert!(intersects("<=1.2.3", ">=1.2.3"));
        assert!(!intersects("<1.2.3", ">=1.2.3"));
        assert!(intersects("*", "^9.0.0"));
        assert!(!intersects(">*", "*"));
    }

    #[test]
    fn test_unsatisfiable_sets_never_intersect() {
        assert!(!intersects(">2.0.0 <1.0.0", "*"));
    }

    #[test]
    fn test_component_overflow_is_an_error() {
        let max = u64::MAX;
        assert!(ranges_intersect(&format!("^{}", max), "*").is_err());
        assert!(ranges_intersect(&format!("~{}", max), "*").is_err());
        assert!(ranges_intersect(&format!("^0.{}", max), "*").is_err());
        assert!(ranges_intersect(&format!("~1.{}", max), "*").is_err());
        assert!(ranges_intersect(&format!(">1.{}", max), "*").is_err());
        assert!(ranges_intersect(&format!("1.2.3 - {}", max), "*").is_err());
        assert!(intersects(&format!("{}.0.0", max), "*"));
    }

    #[test]
    fn test_non_semver_ranges_are_errors() {
        assert!(VersionRange::parse("latest").is_err());
        assert!(VersionRange::parse("file:../pkg").is_err());
        assert!(VersionRange::parse("git+https://example.com/x.git").is_err());
        assert!(VersionRange::parse("workspace:*").is_err());
        assert!(VersionRange::parse(">=").is_err());
    }

    proptest! {
        #[test]
        fn prop_intersection_is_symmetric(
            a in 0u64..4, b in 0u64..4, c in 0u64..4,
            d in 0u64..4, e in 0u64..4, f in 0u64..4,
            op1 in prop::sample::select(vec!["^", "~", ">=", "<", "", "<="]),
            op2 in prop::sample::select(vec!["^", "~", ">=", "<", "", ">"]),
        ) {
            let left = format!("{}{}.{}.{}", op1, a, b, c);
            let right = format!("{}{}.{}.{}", op2, d, e, f);
            prop_assert_eq!(intersects(&left, &right), intersects(&right, &left));
        }

        #[test]
        fn prop_range_intersects_itself_when_satisfiable(
            a in 0u64..5, b in 0u64..5, c in 0u64..5,
            op in prop::sample::select(vec!["^", "~", ">=", "", "<="]),
        ) {
            let range = format!("{}{}.{}.{}", op, a, b, c);
            prop_assert!(intersects(&range, &range));
        }
    }
}
