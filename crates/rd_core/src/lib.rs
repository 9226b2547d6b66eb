//! rd_core: Core types for the redistricting what-if engine.
//!
//! This crate is **I/O-free**. It defines the stable types/APIs used across
//! the engine (`rd_algo`, `rd_io`, `rd_pipeline`, `rd_report`, `rd_cli`).
//!
//! - Typed ids: `UnitId`, `DistrictId`, `PartyId`, `ReservationCategory`
//! - Tolerant numerics: `RawNumeric`, `Coerced<T>`, fixed-point `Pct2`
//! - Entities: `Candidate`, `AtomicUnit`, `UnitRegistry`
//! - `Partition` (district -> units) with transactional swaps
//! - Search parameters (`SearchParams`) and their enum domains
//! - Deterministic ordering helpers
//!
//! Serialization derives are gated behind the `serde` feature.

pub mod errors {
    use core::fmt;

    use crate::ids::{DistrictId, UnitId};

    /// Error set for core-domain validation and partition mutation.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum CoreError {
        /// Unit is not present in the partition.
        UnitNotAssigned(UnitId),
        /// Unit is already assigned to a district.
        DuplicateMember { unit: UnitId, existing: DistrictId },
        /// Both units of a swap belong to the same district.
        SameDistrict { a: UnitId, b: UnitId, district: DistrictId },
        /// A swap names the same unit twice.
        SelfSwap(UnitId),
        /// Owner index and member sets disagree.
        InvariantBroken(&'static str),
        /// Parameter outside its allowed domain.
        DomainOutOfRange(&'static str),
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::UnitNotAssigned(u) => write!(f, "unit {u} is not assigned to any district"),
                CoreError::DuplicateMember { unit, existing } => {
                    write!(f, "unit {unit} already belongs to district {existing}")
                }
                CoreError::SameDistrict { a, b, district } => {
                    write!(f, "units {a} and {b} are both in district {district}")
                }
                CoreError::SelfSwap(u) => write!(f, "cannot swap unit {u} with itself"),
                CoreError::InvariantBroken(k) => write!(f, "partition invariant broken: {k}"),
                CoreError::DomainOutOfRange(k) => write!(f, "domain out of range: {k}"),
            }
        }
    }

    impl std::error::Error for CoreError {}
}

pub mod ids;
pub mod numeric;
pub mod determinism;
pub mod entities;
pub mod partition;
pub mod variables;

pub use errors::CoreError;
pub use ids::{DistrictId, IdError, PartyId, ReservationCategory, UnitId};
pub use numeric::{coerce_count, coerce_pct, margin_pct, Coerced, Pct2, RawNumeric};
pub use entities::{AtomicUnit, Candidate, CandidateRecord, DeclaredWinner, UnitRegistry};
pub use partition::{Partition, SimulatedSwap};
pub use variables::{Compatibility, NeighborSourceKind, Objective, SearchParams};
