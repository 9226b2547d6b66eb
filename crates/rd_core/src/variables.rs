//! variables.rs
//! Search parameters for the swap engine, their enum domains, and safe defaults.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::PartyId;
use crate::numeric::Pct2;

// ------------ Macros ------------

/// Define an enum with explicit wire tokens (serde derives are feature-aware).
macro_rules! serde_enum {
    ($(#[$m:meta])* $name:ident => { $($variant:ident = $token:literal),+ $(,)? }) => {
        $(#[$m])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum $name {
            $(
                #[cfg_attr(feature = "serde", serde(rename = $token))]
                $variant,
            )+
        }

        impl $name {
            pub const fn as_token(self) -> &'static str {
                match self { $( $name::$variant => $token, )+ }
            }
        }

        impl core::str::FromStr for $name {
            type Err = CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $token => Ok($name::$variant), )+
                    _ => Err(CoreError::DomainOutOfRange(stringify!($name))),
                }
            }
        }
    };
}

// ------------ Canonical enums (wire tokens explicit) ------------

serde_enum!(
    /// Rule that decides whether a proposed swap is worth committing.
    Objective => {
        NetFlips = "net_flips",
        BothFlip = "both_flip"
    }
);

serde_enum!(
    /// Which unit pairs may be exchanged at all.
    Compatibility => {
        Any              = "any",
        ReservationMatch = "reservation_match"
    }
);

/// Where swap candidates for a unit come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NeighborSourceKind {
    /// Explicit adjacency table from the input.
    Adjacency,
    /// Every unit is a neighbor of every other unit.
    AllUnits,
    /// Units whose numeric ids are within `span` of each other.
    ConsecutiveIds { span: u32 },
}

// ------------ Params ------------

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct SearchParams {
    pub target_party: PartyId,
    #[cfg_attr(feature = "serde", serde(default = "default_objective"))]
    pub objective: Objective,
    /// Reject swaps that make the target lose any district it holds.
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub no_loss: bool,
    #[cfg_attr(feature = "serde", serde(default = "default_compatibility"))]
    pub compatibility: Compatibility,
    #[cfg_attr(feature = "serde", serde(default = "default_neighbor_source"))]
    pub neighbor_source: NeighborSourceKind,
    #[cfg_attr(feature = "serde", serde(default = "default_max_swaps"))]
    pub max_swaps_per_district: u32,
    /// Stop after this many committed swaps in total.
    #[cfg_attr(feature = "serde", serde(default))]
    pub swap_budget: Option<u32>,
    /// Stop after examining this many districts.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_districts_examined: Option<u32>,
    /// Stop after this many winner evaluations.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_evaluations: Option<u64>,
    /// Margin threshold for the vulnerability screen; `None` disables it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub screen_margin_pct: Option<Pct2>,
}

#[cfg(feature = "serde")]
fn default_objective() -> Objective { Objective::NetFlips }
#[cfg(feature = "serde")]
fn default_true() -> bool { true }
#[cfg(feature = "serde")]
fn default_compatibility() -> Compatibility { Compatibility::ReservationMatch }
#[cfg(feature = "serde")]
fn default_neighbor_source() -> NeighborSourceKind { NeighborSourceKind::Adjacency }
#[cfg(feature = "serde")]
fn default_max_swaps() -> u32 { 1 }

impl SearchParams {
    /// Defaults for everything but the target party.
    pub fn new(target_party: PartyId) -> Self {
        Self {
            target_party,
            objective: Objective::NetFlips,
            no_loss: true,
            compatibility: Compatibility::ReservationMatch,
            neighbor_source: NeighborSourceKind::Adjacency,
            max_swaps_per_district: 1,
            swap_budget: None,
            max_districts_examined: None,
            max_evaluations: None,
            screen_margin_pct: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_swaps_per_district == 0 {
            return Err(CoreError::DomainOutOfRange("max_swaps_per_district"));
        }
        if let NeighborSourceKind::ConsecutiveIds { span } = self.neighbor_source {
            if span == 0 {
                return Err(CoreError::DomainOutOfRange("neighbor_source.consecutive_ids.span"));
            }
        }
        if let Some(p) = self.screen_margin_pct {
            if p > Pct2::HUNDRED {
                return Err(CoreError::DomainOutOfRange("screen_margin_pct"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let p = SearchParams::new("BJP".parse().unwrap());
        assert!(p.validate().is_ok());
        assert_eq!(p.objective, Objective::NetFlips);
        assert_eq!(p.compatibility, Compatibility::ReservationMatch);
    }

    #[test]
    fn zero_caps_rejected() {
        let mut p = SearchParams::new("BJP".parse().unwrap());
        p.max_swaps_per_district = 0;
        assert!(p.validate().is_err());
        p.max_swaps_per_district = 1;
        p.neighbor_source = NeighborSourceKind::ConsecutiveIds { span: 0 };
        assert!(p.validate().is_err());
    }

    #[test]
    fn tokens_round_through_from_str() {
        assert_eq!("both_flip".parse::<Objective>(), Ok(Objective::BothFlip));
        assert_eq!(Compatibility::Any.as_token(), "any");
        assert!("sideways".parse::<Compatibility>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn params_json_fills_defaults() {
        let p: SearchParams = serde_json::from_str(
            r#"{"target_party":"INC","neighbor_source":{"consecutive_ids":{"span":2}},"screen_margin_pct":"15"}"#,
        )
        .unwrap();
        assert_eq!(p.neighbor_source, NeighborSourceKind::ConsecutiveIds { span: 2 });
        assert_eq!(p.screen_margin_pct, Some(Pct2::from_hundredths(1500)));
        assert!(p.no_loss);
        assert_eq!(p.max_swaps_per_district, 1);
    }
}
