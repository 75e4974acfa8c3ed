//! Mining module: the exclusive mining lease and the block coordinator

pub mod lease;
pub mod miner;

pub use lease::{LeaseGuard, MiningLease};
pub use miner::{
    MinedBlock, MiningCoordinator, MiningOutcome, MiningStats, MiningStatus, RejectedTransaction,
    SkipReason,
};
