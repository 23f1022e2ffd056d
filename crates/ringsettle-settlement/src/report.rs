//! Settlement reports: the plan plus how every leg and ring was resolved.

use ringsettle_types::{Address, BatchId, InterceptorRef, TransferPlan};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which policy applied to one order's leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegResolution {
    /// No broker; settled directly.
    Direct,
    /// Broker set but not registered by the owner.
    BrokerUnregistered { broker: Address },
    /// Registered broker without interceptor.
    BrokerDirect { broker: Address },
    /// Registered broker capped by an interceptor.
    Intercepted {
        broker: Address,
        interceptor: InterceptorRef,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegOutcome {
    pub ring_index: usize,
    pub order_index: usize,
    pub resolution: LegResolution,
    /// Amount the matcher asked for.
    pub matched: Decimal,
    /// Amount policy allows.
    pub effective: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RingOutcome {
    Settled { ring_index: usize, transfers: usize },
    /// A leg resolved to zero, so the ring moved nothing.
    Dropped { ring_index: usize, blocking_order: usize },
}

/// Result of one settlement run (committed or simulated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub batch_id: BatchId,
    pub plan: TransferPlan,
    pub legs: Vec<LegOutcome>,
    pub rings: Vec<RingOutcome>,
}

impl SettlementReport {
    /// `false` means the run moved nothing at all.
    #[must_use]
    pub fn has_transfers(&self) -> bool {
        !self.plan.is_empty()
    }

    #[must_use]
    pub fn settled_rings(&self) -> usize {
        self.rings
            .iter()
            .filter(|r| matches!(r, RingOutcome::Settled { .. }))
            .count()
    }

    #[must_use]
    pub fn dropped_rings(&self) -> usize {
        self.rings.len() - self.settled_rings()
    }

    /// Effective amount resolved for `order_index`, if it was part of a ring.
    #[must_use]
    pub fn effective_amount(&self, order_index: usize) -> Option<Decimal> {
        self.legs
            .iter()
            .find(|leg| leg.order_index == order_index)
            .map(|leg| leg.effective)
    }

    #[must_use]
    pub fn leg(&self, order_index: usize) -> Option<&LegOutcome> {
        self.legs.iter().find(|leg| leg.order_index == order_index)
    }
}
