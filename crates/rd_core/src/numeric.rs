//! crates/rd_core/src/numeric.rs
//! Integer-first numerics: tolerant coercion of raw record values and a
//! fixed-point percentage with two decimals.
//!
//! Raw fields arrive as numbers, numeric strings (possibly with thousands
//! separators), empty strings or nothing at all. Coercion never fails: the
//! value degrades to zero and the `was_invalid` flag lets the caller count it.

use core::fmt;
use core::str::FromStr;

/// A raw numeric field as it appeared in the input, before coercion.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RawNumeric {
    #[default]
    Absent,
    Int(i64),
    Float(f64),
    Text(String),
}

/// A coerced value plus whether the source was missing or malformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coerced<T> {
    pub value: T,
    pub was_invalid: bool,
}

impl<T> Coerced<T> {
    #[inline] pub fn ok(value: T) -> Self { Self { value, was_invalid: false } }
    #[inline] pub fn invalid(value: T) -> Self { Self { value, was_invalid: true } }
}

/* -------------------------------------------------------------------------- */
/*                                   Counts                                   */
/* -------------------------------------------------------------------------- */

/// Coerce a vote/elector count. Decimals truncate; negatives, garbage and
/// missing values become 0 and are flagged.
pub fn coerce_count(raw: &RawNumeric) -> Coerced<u64> {
    match raw {
        RawNumeric::Absent => Coerced::invalid(0),
        RawNumeric::Int(i) if *i >= 0 => Coerced::ok(*i as u64),
        RawNumeric::Int(_) => Coerced::invalid(0),
        RawNumeric::Float(f) if f.is_finite() && *f >= 0.0 && *f < u64::MAX as f64 => {
            Coerced::ok(f.trunc() as u64)
        }
        RawNumeric::Float(_) => Coerced::invalid(0),
        RawNumeric::Text(s) => match split_decimal(s) {
            Some((int, _frac)) => match parse_digits(&int) {
                Some(v) => Coerced::ok(v),
                None => Coerced::invalid(0),
            },
            None => Coerced::invalid(0),
        },
    }
}

/// Coerce a percentage field into hundredths (half-up on the third decimal).
pub fn coerce_pct(raw: &RawNumeric) -> Coerced<Pct2> {
    match raw {
        RawNumeric::Absent => Coerced::invalid(Pct2::ZERO),
        RawNumeric::Int(i) if *i >= 0 => match (*i as u64).checked_mul(100).and_then(to_u32) {
            Some(h) => Coerced::ok(Pct2(h)),
            None => Coerced::invalid(Pct2::ZERO),
        },
        RawNumeric::Int(_) => Coerced::invalid(Pct2::ZERO),
        RawNumeric::Float(f) if f.is_finite() && *f >= 0.0 => {
            match parse_hundredths(&format!("{f}")) {
                Some(p) => Coerced::ok(p),
                None => Coerced::invalid(Pct2::ZERO),
            }
        }
        RawNumeric::Float(_) => Coerced::invalid(Pct2::ZERO),
        RawNumeric::Text(s) => match parse_hundredths(s.trim().trim_end_matches('%')) {
            Some(p) => Coerced::ok(p),
            None => Coerced::invalid(Pct2::ZERO),
        },
    }
}

/// Strip whitespace and thousands separators, then split `int[.frac]`.
/// Returns `None` for anything that is not a plain non-negative decimal.
fn split_decimal(s: &str) -> Option<(String, String)> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    let (int, frac) = match cleaned.split_once('.') {
        Some((i, f)) => (i.to_owned(), f.to_owned()),
        None => (cleaned, String::new()),
    };
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    if !int.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((int, frac))
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() {
        return Some(0);
    }
    s.parse::<u64>().ok()
}

fn to_u32(v: u64) -> Option<u32> {
    u32::try_from(v).ok()
}

fn parse_hundredths(s: &str) -> Option<Pct2> {
    let (int, frac) = split_decimal(s)?;
    let whole = parse_digits(&int)?;
    let digit = |i: usize| frac.as_bytes().get(i).map(|b| u64::from(b - b'0')).unwrap_or(0);
    let mut h = whole.checked_mul(100)?.checked_add(digit(0) * 10 + digit(1))?;
    if digit(2) >= 5 {
        h = h.checked_add(1)?;
    }
    to_u32(h).map(Pct2)
}

/* -------------------------------------------------------------------------- */
/*                                    Pct2                                    */
/* -------------------------------------------------------------------------- */

/// Percentage with exactly two decimals, stored as hundredths (`13.33` -> `1333`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pct2(u32);

impl Pct2 {
    pub const ZERO: Pct2 = Pct2(0);
    pub const HUNDRED: Pct2 = Pct2(10_000);

    #[inline] pub const fn from_hundredths(h: u32) -> Self { Pct2(h) }
    #[inline] pub const fn hundredths(self) -> u32 { self.0 }

    /// `num / den * 100`, rounded half-up to two decimals. Zero when `den == 0`.
    pub fn from_ratio(num: u64, den: u64) -> Pct2 {
        if den == 0 {
            return Pct2::ZERO;
        }
        let n = u128::from(num) * 10_000 * 2 + u128::from(den);
        let h = n / (u128::from(den) * 2);
        Pct2(u32::try_from(h).unwrap_or(u32::MAX))
    }
}

/// Margin as a share of valid votes, clamped to `100.00`.
pub fn margin_pct(margin: u64, valid_votes: u64) -> Pct2 {
    Pct2::from_ratio(margin, valid_votes).min(Pct2::HUNDRED)
}

impl fmt::Display for Pct2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Pct2 {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths(s.trim().trim_end_matches('%')).ok_or("invalid percentage")
    }
}

#[cfg(feature = "serde")]
mod pct_serde {
    use super::{coerce_pct, Pct2, RawNumeric};
    use core::fmt;
    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Pct2 {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.collect_str(self)
        }
    }

    struct PctVisitor;

    impl PctVisitor {
        fn strict<E: de::Error>(raw: RawNumeric) -> Result<Pct2, E> {
            let c = coerce_pct(&raw);
            if c.was_invalid {
                Err(E::custom("expected a non-negative percentage"))
            } else {
                Ok(c.value)
            }
        }
    }

    impl<'de> Visitor<'de> for PctVisitor {
        type Value = Pct2;
        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a percentage as number or decimal string")
        }
        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Pct2, E> {
            Self::strict(RawNumeric::Int(i64::try_from(v).map_err(E::custom)?))
        }
        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Pct2, E> {
            Self::strict(RawNumeric::Int(v))
        }
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Pct2, E> {
            Self::strict(RawNumeric::Float(v))
        }
        fn visit_str<E: de::Error>(self, v: &str) -> Result<Pct2, E> {
            Self::strict(RawNumeric::Text(v.to_owned()))
        }
    }

    impl<'de> Deserialize<'de> for Pct2 {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            d.deserialize_any(PctVisitor)
        }
    }
}
