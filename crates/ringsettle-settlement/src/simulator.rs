//! Settlement simulation: the engine's resolution without side effects.
//!
//! A simulation queries the same registry state and the same interceptors
//! as a commit, but sends no spend notifications and executes nothing. Given
//! the same external state its report equals the commit's report.

use ringsettle_registry::RegistrySnapshot;
use ringsettle_types::{Result, SettlementBatch, TransferPlan};
use rust_decimal::Decimal;

use crate::engine::RingSettlementEngine;
use crate::report::SettlementReport;

/// Dry-run view of a [`RingSettlementEngine`].
pub struct SettlementSimulator<'a> {
    engine: &'a RingSettlementEngine,
}

impl<'a> SettlementSimulator<'a> {
    #[must_use]
    pub fn new(engine: &'a RingSettlementEngine) -> Self {
        Self { engine }
    }

    /// Simulate against the registry as it is now.
    pub fn simulate(&self, batch: &SettlementBatch, matched: &[Decimal]) -> Result<SettlementReport> {
        let snapshot = self.engine.registry().snapshot();
        self.simulate_on(&snapshot, batch, matched)
    }

    /// Simulate against a given snapshot. Safe to call from many threads
    /// with one shared snapshot.
    pub fn simulate_on(
        &self,
        snapshot: &RegistrySnapshot,
        batch: &SettlementBatch,
        matched: &[Decimal],
    ) -> Result<SettlementReport> {
        self.engine.resolve(snapshot, batch, matched)
    }

    /// Whether a simulation reproduces `expected`, compared by plan digest.
    pub fn verify(
        &self,
        batch: &SettlementBatch,
        matched: &[Decimal],
        expected: &TransferPlan,
    ) -> Result<bool> {
        let report = self.simulate(batch, matched)?;
        let matches = report.plan.digest() == expected.digest();
        if !matches {
            tracing::warn!(
                batch = batch.id.0,
                expected = %expected.digest_hex(),
                actual = %report.plan.digest_hex(),
                "Simulated plan differs from expected"
            );
        }
        Ok(matches)
    }
}
