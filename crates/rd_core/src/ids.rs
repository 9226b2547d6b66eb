//! crates/rd_core/src/ids.rs
//! Typed identifiers for atomic units, districts, parties and reservation
//! categories. ASCII-tolerant, trimmed, no I/O.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors returned when validating or parsing ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    Empty,
    NotNumeric,
    TooLong,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::Empty => f.write_str("empty id"),
            IdError::NotNumeric => f.write_str("id is not a non-negative integer"),
            IdError::TooLong => f.write_str("id too long"),
        }
    }
}

impl std::error::Error for IdError {}

const MAX_LABEL_LEN: usize = 128;

macro_rules! numeric_newtype {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(u32);

        impl $name {
            #[inline] pub const fn new(v: u32) -> Self { Self(v) }
            #[inline] pub const fn get(self) -> u32 { self.0 }
        }

        impl From<u32> for $name {
            #[inline] fn from(v: u32) -> Self { Self(v) }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl FromStr for $name {
            type Err = IdError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let t = s.trim();
                if t.is_empty() { return Err(IdError::Empty); }
                if !t.bytes().all(|b| b.is_ascii_digit()) { return Err(IdError::NotNumeric); }
                t.parse::<u32>().map(Self).map_err(|_| IdError::TooLong)
            }
        }
    }
}

macro_rules! label_newtype {
    ($(#[$m:meta])* $name:ident, allow_empty = $allow_empty:expr) => {
        $(#[$m])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
        #[cfg_attr(feature = "serde", derive(Serialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        #[cfg(feature = "serde")]
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s = String::deserialize(d)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl $name {
            #[inline] pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl FromStr for $name {
            type Err = IdError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let t = s.trim();
                if t.is_empty() && !$allow_empty { return Err(IdError::Empty); }
                if t.len() > MAX_LABEL_LEN { return Err(IdError::TooLong); }
                Ok(Self(t.to_owned()))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;
            #[inline]
            fn try_from(value: &str) -> Result<Self, Self::Error> { value.parse() }
        }
    }
}

numeric_newtype!(
    /// Atomic voting unit id (assembly segment number).
    UnitId
);
numeric_newtype!(
    /// District id (parliamentary constituency number).
    DistrictId
);

label_newtype!(
    /// Party label as it appears in the records, trimmed.
    PartyId,
    allow_empty = false
);
label_newtype!(
    /// Reservation category label (e.g. `GEN`, `SC`, `ST`). Empty means unspecified.
    ReservationCategory,
    allow_empty = true
);

impl ReservationCategory {
    #[inline] pub fn is_unspecified(&self) -> bool { self.0.is_empty() }
}
