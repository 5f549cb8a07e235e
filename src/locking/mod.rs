// Concurrent editing control: sessions, review locks and the cleanup sweep

pub mod manager;
pub mod stats;
mod sweeper;
pub mod types;

pub use manager::LockManager;
pub use stats::{LockManagerStats, LockStatsSnapshot};
pub use types::{
    AcquireOutcome, AcquireRequest, DenialReason, EditingLock, EditingSession,
    ForceReleaseReport, LockDenial, LockType, SessionInvalidReason, SessionMetadata,
    SessionValidation, SweepReport,
};
