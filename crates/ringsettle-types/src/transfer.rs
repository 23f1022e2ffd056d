//! Transfer plan: the ordered token movements a settlement produces.
//!
//! Plans are compared across runs (simulation vs. commit) by their
//! [`TransferPlan::digest`], a SHA-256 over every item in order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, TokenId, constants};

/// A single token movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub from: Address,
    pub to: Address,
    pub token: TokenId,
    pub amount: Decimal,
    /// Batch index of the order this leg settles.
    pub order_index: usize,
    /// Index of the ring the leg belongs to.
    pub ring_index: usize,
}

/// Ordered transfer items, in ring order then position-in-ring order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPlan {
    items: Vec<TransferItem>,
}

impl TransferPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: TransferItem) {
        self.items.push(item);
    }

    #[must_use]
    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all amounts moved in `token`.
    #[must_use]
    pub fn total_for(&self, token: &TokenId) -> Decimal {
        self.items
            .iter()
            .filter(|item| item.token == *token)
            .map(|item| item.amount)
            .sum()
    }

    /// Deterministic hash over all items, in order.
    ///
    /// Amounts are hashed in normalized form so `1.0` and `1` agree.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::PLAN_DIGEST_DOMAIN);
        hasher.update((self.items.len() as u64).to_le_bytes());
        for item in &self.items {
            hasher.update(item.from.as_bytes());
            hasher.update(item.to.as_bytes());
            hasher.update(item.token.as_bytes());
            hasher.update(item.amount.normalize().to_string().as_bytes());
            hasher.update((item.order_index as u64).to_le_bytes());
            hasher.update((item.ring_index as u64).to_le_bytes());
        }
        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        digest
    }

    /// Hex form of [`Self::digest`], for logs and reports.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

impl IntoIterator for TransferPlan {
    type Item = TransferItem;
    type IntoIter = std::vec::IntoIter<TransferItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a TransferPlan {
    type Item = &'a TransferItem;
    type IntoIter = std::slice::Iter<'a, TransferItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
