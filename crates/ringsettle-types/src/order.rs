//! Batch input model: orders, rings, and the settlement batch.
//!
//! A batch is produced by the external matcher and consumed once per
//! settlement call. Nothing here is mutated after construction.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, BatchId, RingsettleError, Result, TokenId, constants};

/// An order as it appears in a settlement batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Account whose tokens are sold.
    pub owner: Address,
    /// Token the owner gives up.
    pub token_sell: TokenId,
    /// Token the owner receives.
    pub token_buy: TokenId,
    /// Maximum amount of `token_sell` the order may spend.
    pub amount_sell: Decimal,
    /// Amount of `token_buy` the order asks for.
    pub amount_buy: Decimal,
    /// Delegate acting for the owner, if any.
    pub broker: Option<Address>,
}

impl Order {
    #[must_use]
    pub fn new(
        owner: Address,
        token_sell: TokenId,
        token_buy: TokenId,
        amount_sell: Decimal,
        amount_buy: Decimal,
    ) -> Self {
        Self {
            owner,
            token_sell,
            token_buy,
            amount_sell,
            amount_buy,
            broker: None,
        }
    }

    /// Builder-style broker assignment.
    #[must_use]
    pub fn with_broker(mut self, broker: Address) -> Self {
        self.broker = Some(broker);
        self
    }

    fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: &str| RingsettleError::InvalidOrder {
            index,
            reason: reason.to_string(),
        };
        if self.owner.is_zero() {
            return Err(invalid("missing owner"));
        }
        if self.token_sell.is_zero() || self.token_buy.is_zero() {
            return Err(invalid("missing token"));
        }
        if self.token_sell == self.token_buy {
            return Err(invalid("sell and buy token are the same"));
        }
        if self.amount_sell.is_sign_negative() || self.amount_buy.is_sign_negative() {
            return Err(invalid("amounts must not be negative"));
        }
        Ok(())
    }
}

/// A closed cycle of orders, as positions into [`SettlementBatch::orders`].
///
/// For consecutive positions `i` and `i + 1` (wrapping), the order at `i`
/// buys the token the order at `i + 1` sells. The order at position `i`
/// therefore pays the owner of the order at `i - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ring(pub Vec<usize>);

impl Ring {
    #[must_use]
    pub fn new(orders: Vec<usize>) -> Self {
        Self(orders)
    }

    #[must_use]
    pub fn order_indices(&self) -> &[usize] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Batch index of the order that receives what the order at `position` sells.
    #[must_use]
    pub fn counterparty_of(&self, position: usize) -> usize {
        let n = self.0.len();
        self.0[(position + n - 1) % n]
    }
}

/// Rings plus the orders they reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub id: BatchId,
    pub rings: Vec<Ring>,
    pub orders: Vec<Order>,
}

impl SettlementBatch {
    #[must_use]
    pub fn new(id: BatchId, rings: Vec<Ring>, orders: Vec<Order>) -> Self {
        Self { id, rings, orders }
    }

    /// Structural validation of the batch and its matched amounts.
    ///
    /// Nothing about brokers or interceptors is checked here; those never
    /// make a batch invalid.
    ///
    /// # Errors
    /// Returns the first structural (3xx) error found.
    pub fn validate(&self, matched: &[Decimal], max_rings: usize, max_orders: usize) -> Result<()> {
        if self.rings.len() > max_rings {
            return Err(RingsettleError::BatchTooLarge {
                reason: format!("{} rings, limit {max_rings}", self.rings.len()),
            });
        }
        if self.orders.len() > max_orders {
            return Err(RingsettleError::BatchTooLarge {
                reason: format!("{} orders, limit {max_orders}", self.orders.len()),
            });
        }
        if matched.len() != self.orders.len() {
            return Err(RingsettleError::MatchedAmountsMismatch {
                orders: self.orders.len(),
                amounts: matched.len(),
            });
        }

        for (index, (order, amount)) in self.orders.iter().zip(matched).enumerate() {
            order.validate(index)?;
            if amount.is_sign_negative() || *amount > order.amount_sell {
                return Err(RingsettleError::InvalidMatchedAmount {
                    index,
                    amount: *amount,
                });
            }
        }

        // Matched amounts are per order, so an order settles in one ring only.
        let mut seen = HashSet::with_capacity(self.orders.len());
        for (ring_index, ring) in self.rings.iter().enumerate() {
            self.validate_ring(ring_index, ring, &mut seen)?;
        }
        Ok(())
    }

    fn validate_ring(&self, ring_index: usize, ring: &Ring, seen: &mut HashSet<usize>) -> Result<()> {
        if ring.len() < constants::MIN_RING_SIZE {
            return Err(RingsettleError::InvalidRing {
                ring: ring_index,
                reason: format!("{} orders, need at least {}", ring.len(), constants::MIN_RING_SIZE),
            });
        }

        for &index in ring.order_indices() {
            if index >= self.orders.len() {
                return Err(RingsettleError::OrderIndexOutOfRange {
                    ring: ring_index,
                    index,
                    len: self.orders.len(),
                });
            }
            if !seen.insert(index) {
                return Err(RingsettleError::InvalidRing {
                    ring: ring_index,
                    reason: format!("order {index} is already used in this batch"),
                });
            }
        }

        let indices = ring.order_indices();
        for (pos, &index) in indices.iter().enumerate() {
            let next = indices[(pos + 1) % indices.len()];
            if self.orders[index].token_buy != self.orders[next].token_sell {
                return Err(RingsettleError::InvalidRing {
                    ring: ring_index,
                    reason: format!("order {index} buys a token order {next} does not sell"),
                });
            }
        }
        Ok(())
    }
}
