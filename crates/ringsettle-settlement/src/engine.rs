//! Ring settlement engine.
//!
//! Turns a [`SettlementBatch`] plus per-order matched amounts into a
//! [`TransferPlan`], applying broker and interceptor policy per leg:
//!
//! | Broker | Registry state | Effective amount |
//! |--------|----------------|------------------|
//! | none | not consulted | matched |
//! | set | unregistered | 0 |
//! | set | registered, no interceptor | matched |
//! | set | registered, interceptor | `min(matched, allowance)` |
//!
//! A ring settles only if every leg resolves to a positive amount; otherwise
//! the ring is dropped and moves nothing. Broker or interceptor state never
//! fails a batch; only structurally invalid input does.
//!
//! Resolution only queries allowances. Interceptors hear about a spend from
//! [`RingSettlementEngine::commit`], after the transfer carrying it executed.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use ringsettle_gateway::{InterceptorDirectory, SpendInterceptorGateway};
use ringsettle_registry::{BrokerRegistry, RegistrySnapshot};
use ringsettle_types::{
    InterceptorRef, Order, Result, RingsettleError, SettlementBatch, SettlementConfig,
    TransferItem, TransferPlan,
};
use rust_decimal::Decimal;

use crate::executor::TransferExecutor;
use crate::idempotency::IdempotencyGuard;
use crate::report::{LegOutcome, LegResolution, RingOutcome, SettlementReport};

/// Resolves settlement batches into transfer plans and commits them once.
pub struct RingSettlementEngine {
    registry: Arc<BrokerRegistry>,
    gateway: SpendInterceptorGateway,
    config: SettlementConfig,
    committed: IdempotencyGuard,
}

impl RingSettlementEngine {
    /// Build an engine whose gateway takes its call timeout and in-flight
    /// cap from `config`.
    ///
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(
        registry: Arc<BrokerRegistry>,
        directory: Arc<InterceptorDirectory>,
        config: SettlementConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            gateway: SpendInterceptorGateway::from_config(directory, &config),
            committed: IdempotencyGuard::new(config.idempotency_cache_size),
            config,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &BrokerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn gateway(&self) -> &SpendInterceptorGateway {
        &self.gateway
    }

    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    #[must_use]
    pub fn is_committed(&self, batch: &SettlementBatch) -> bool {
        self.committed.is_settled(batch.id)
    }

    /// Resolve a batch against `snapshot` without executing anything or
    /// notifying any interceptor.
    ///
    /// An interceptor that times out, panics, or is saturated is not
    /// queried again for the rest of the run; its remaining legs get zero.
    ///
    /// # Errors
    /// Structural input errors only.
    pub fn resolve(
        &self,
        snapshot: &RegistrySnapshot,
        batch: &SettlementBatch,
        matched: &[Decimal],
    ) -> Result<SettlementReport> {
        batch.validate(
            matched,
            self.config.max_rings_per_batch,
            self.config.max_orders_per_batch,
        )?;

        let mut plan = TransferPlan::new();
        let mut legs = Vec::new();
        let mut rings = Vec::with_capacity(batch.rings.len());
        let mut unresponsive = HashSet::new();

        for (ring_index, ring) in batch.rings.iter().enumerate() {
            let first_leg = legs.len();
            let mut blocking_order = None;

            for &order_index in ring.order_indices() {
                let order = &batch.orders[order_index];
                let (resolution, effective) =
                    self.resolve_leg(snapshot, order, matched[order_index], &mut unresponsive);
                tracing::debug!(
                    batch = batch.id.0,
                    ring = ring_index,
                    order = order_index,
                    resolution = ?resolution,
                    matched = %matched[order_index],
                    effective = %effective,
                    "Leg resolved"
                );
                if effective.is_zero() && blocking_order.is_none() {
                    blocking_order = Some(order_index);
                }
                legs.push(LegOutcome {
                    ring_index,
                    order_index,
                    resolution,
                    matched: matched[order_index],
                    effective,
                });
            }

            if let Some(blocking_order) = blocking_order {
                tracing::warn!(
                    batch = batch.id.0,
                    ring = ring_index,
                    blocking_order,
                    "Ring dropped: a leg resolved to zero"
                );
                rings.push(RingOutcome::Dropped {
                    ring_index,
                    blocking_order,
                });
                continue;
            }

            let ring_legs = &legs[first_leg..];
            for (position, leg) in ring_legs.iter().enumerate() {
                let order = &batch.orders[leg.order_index];
                let counterparty = &batch.orders[ring.counterparty_of(position)];
                plan.push(TransferItem {
                    from: order.owner,
                    to: counterparty.owner,
                    token: order.token_sell,
                    amount: leg.effective,
                    order_index: leg.order_index,
                    ring_index,
                });
            }
            rings.push(RingOutcome::Settled {
                ring_index,
                transfers: ring_legs.len(),
            });
        }

        let report = SettlementReport {
            batch_id: batch.id,
            plan,
            legs,
            rings,
        };
        tracing::info!(
            batch = batch.id.0,
            rings = report.rings.len(),
            settled = report.settled_rings(),
            dropped = report.dropped_rings(),
            transfers = report.plan.len(),
            unresponsive_interceptors = unresponsive.len(),
            plan_digest = %report.plan.digest_hex(),
            "Batch resolved"
        );
        Ok(report)
    }

    /// Resolve against a fresh snapshot and execute every item in plan
    /// order. Each intercepted leg's interceptor is told about the spend
    /// right after its transfer executes.
    ///
    /// The batch ID is recorded once resolution succeeds; a batch whose
    /// execution failed part-way is not retried. Transfers never reached
    /// are never reported as spent.
    ///
    /// # Errors
    /// `BatchAlreadySettled`, structural input errors, or `TransferFailed`.
    pub fn commit(
        &mut self,
        batch: &SettlementBatch,
        matched: &[Decimal],
        executor: &mut dyn TransferExecutor,
    ) -> Result<SettlementReport> {
        self.committed.check(batch.id)?;

        let snapshot = self.registry.snapshot();
        let report = self.resolve(&snapshot, batch, matched)?;
        self.committed.mark_settled(batch.id)?;

        let intercepted: HashMap<usize, InterceptorRef> = report
            .legs
            .iter()
            .filter_map(|leg| match leg.resolution {
                LegResolution::Intercepted { interceptor, .. } => {
                    Some((leg.order_index, interceptor))
                }
                _ => None,
            })
            .collect();

        for item in &report.plan {
            executor.execute(item).map_err(|e| {
                tracing::error!(
                    batch = batch.id.0,
                    order = item.order_index,
                    error = %e,
                    "Transfer execution failed"
                );
                RingsettleError::TransferFailed {
                    reason: format!("order {} in {}: {e}", item.order_index, batch.id),
                }
            })?;
            if let Some(interceptor) = intercepted.get(&item.order_index) {
                self.gateway
                    .record_spend(interceptor, item.from, item.token, item.amount);
            }
        }

        tracing::info!(
            batch = batch.id.0,
            transfers = report.plan.len(),
            "Batch committed"
        );
        Ok(report)
    }

    fn resolve_leg(
        &self,
        snapshot: &RegistrySnapshot,
        order: &Order,
        matched: Decimal,
        unresponsive: &mut HashSet<InterceptorRef>,
    ) -> (LegResolution, Decimal) {
        let Some(broker) = order.broker else {
            return (LegResolution::Direct, matched);
        };

        if !snapshot.is_registered(&order.owner, &broker) {
            return (LegResolution::BrokerUnregistered { broker }, Decimal::ZERO);
        }

        let Some(interceptor) = snapshot.interceptor_for(&order.owner, &broker) else {
            return (LegResolution::BrokerDirect { broker }, matched);
        };
        let resolution = LegResolution::Intercepted {
            broker,
            interceptor,
        };

        if unresponsive.contains(&interceptor) {
            tracing::debug!(
                interceptor = %interceptor.address(),
                owner = %order.owner,
                "Skipping unresponsive interceptor"
            );
            return (resolution, Decimal::ZERO);
        }

        let (granted, failure) =
            self.gateway
                .grant(&interceptor, order.owner, order.token_sell, matched);
        if failure.is_some_and(|f| f.is_unresponsive()) {
            unresponsive.insert(interceptor);
        }
        (resolution, granted)
    }
}
