// crates/rd_algo/src/lib.rs
#![forbid(unsafe_code)]

//! Pure algorithm layer over `rd_core` types. No file I/O; logging through `tracing`.

// Core ids and entities used across the public surface
pub use rd_core::{
    entities::{AtomicUnit, UnitRegistry},
    ids::{DistrictId, PartyId, UnitId},
    partition::Partition,
};

pub mod winner;
pub mod adjacency;
pub mod swap_search;
pub mod verify;
pub mod screen;

// Convenience re-exports (pipeline imports these from crate root)
pub use winner::{count_wins, outcomes_by_district, winner, winner_of_district, Outcome};
pub use adjacency::{
    AdjacencyIndex, AdjacencyTable, AllUnits, AnyUnit, CompatibilityRule, ConsecutiveIds,
    NeighborSource, SameReservation,
};
pub use swap_search::{
    AcceptanceRule, AllowLoss, BothFlip, CommittedSwap, NetFlips, NoLoss, ObjectiveRule,
    SearchLimits, SearchOutcome, StopReason, SwapEvaluation, SwapProposal, SwapSearchEngine,
};
pub use verify::{
    ConsistencyVerifier, DistrictMismatch, FlippedDistrict, ReplayError, VerificationReport,
};
pub use screen::{vulnerability_screen, ScreenNeighbor, ScreenReport, VulnerableUnit};
