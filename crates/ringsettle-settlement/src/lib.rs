//! # ringsettle-settlement
//!
//! **Ring settlement**: resolves matched rings into a deterministic transfer
//! plan under broker and interceptor policy, and simulates the same
//! resolution for verification.
//!
//! ## Flow
//!
//! ```text
//! SettlementBatch + matched amounts
//!   → structural validation (the only way a batch fails)
//!   → registry snapshot
//!   → per ring, per order: resolve leg (registry snapshot, gateway)
//!   → ring settles iff every leg > 0
//!   → TransferPlan + SettlementReport
//!   → commit only: execute items, notify interceptors of executed spends
//! ```

pub mod engine;
pub mod executor;
pub mod idempotency;
pub mod report;
pub mod simulator;

pub use engine::RingSettlementEngine;
pub use executor::{RecordingExecutor, TransferExecutor};
pub use idempotency::IdempotencyGuard;
pub use report::{LegOutcome, LegResolution, RingOutcome, SettlementReport};
pub use simulator::SettlementSimulator;
