//! Error types for RingSettle.
//!
//! All errors use the `RS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Registry authorization errors
//! - 3xx: Structural batch input errors
//! - 6xx: Settlement errors
//! - 9xx: General / internal errors
//!
//! Interceptor call failures are deliberately absent: they are recovered at
//! the gateway and never become a `RingsettleError`.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Address, BatchId};

/// Central error enum for all RingSettle operations.
#[derive(Debug, Error)]
pub enum RingsettleError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// The caller's credential does not belong to the claimed owner.
    #[error("RS_ERR_100: Caller {caller} is not authorized to act for owner {owner}")]
    Unauthorized { owner: Address, caller: Address },

    /// The credential's signature did not verify over the request payload.
    #[error("RS_ERR_101: Invalid signature for owner {owner}")]
    InvalidSignature { owner: Address },

    /// The credential's public key is not a valid ed25519 point.
    #[error("RS_ERR_102: Invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// Nonce not strictly greater than the last accepted one (replay).
    #[error("RS_ERR_103: Nonce replay for owner {owner}: got {nonce}, last accepted {last}")]
    NonceReplay { owner: Address, nonce: u64, last: u64 },

    // =================================================================
    // Structural Input Errors (3xx)
    // =================================================================
    /// A ring is malformed (too short, repeated order, unclosed token cycle).
    #[error("RS_ERR_300: Invalid ring {ring}: {reason}")]
    InvalidRing { ring: usize, reason: String },

    /// A ring references an order index outside the batch.
    #[error("RS_ERR_301: Ring {ring} references order {index}, batch has {len} orders")]
    OrderIndexOutOfRange { ring: usize, index: usize, len: usize },

    /// An order is missing a required field or carries an invalid value.
    #[error("RS_ERR_302: Invalid order {index}: {reason}")]
    InvalidOrder { index: usize, reason: String },

    /// The matched amounts do not line up one-to-one with the orders.
    #[error("RS_ERR_303: Matched amounts mismatch: {orders} orders, {amounts} amounts")]
    MatchedAmountsMismatch { orders: usize, amounts: usize },

    /// A matched amount is negative or exceeds the order's sell amount.
    #[error("RS_ERR_304: Invalid matched amount {amount} for order {index}")]
    InvalidMatchedAmount { index: usize, amount: Decimal },

    /// The batch exceeds the configured size limits.
    #[error("RS_ERR_305: Batch too large: {reason}")]
    BatchTooLarge { reason: String },

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// A batch has already been committed (idempotency guard).
    #[error("RS_ERR_600: Batch already settled: {0}")]
    BatchAlreadySettled(BatchId),

    /// The transfer executor rejected an item.
    #[error("RS_ERR_601: Transfer failed: {reason}")]
    TransferFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("RS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("RS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("RS_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl RingsettleError {
    /// Whether this error is a structural batch input error (3xx), the only
    /// class allowed to abort a whole settlement.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidRing { .. }
                | Self::OrderIndexOutOfRange { .. }
                | Self::InvalidOrder { .. }
                | Self::MatchedAmountsMismatch { .. }
                | Self::InvalidMatchedAmount { .. }
                | Self::BatchTooLarge { .. }
        )
    }

    /// Whether this error came from a rejected registry mutation (1xx).
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::InvalidSignature { .. }
                | Self::InvalidPublicKey { .. }
                | Self::NonceReplay { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RingsettleError>;

impl From<serde_json::Error> for RingsettleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
